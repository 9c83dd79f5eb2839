/*
* Licensed to Elasticsearch B.V. under one or more contributor
* license agreements. See the NOTICE file distributed with
* this work for additional information regarding copyright
* ownership. Elasticsearch B.V. licenses this file to you under
* the Apache License, Version 2.0 (the "License"); you may
* not use this file except in compliance with the License.
* You may obtain a copy of the License at
*
*  http://www.apache.org/licenses/LICENSE-2.0
*
* Unless required by applicable law or agreed to in writing,
* software distributed under the License is distributed on an
* "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
* KIND, either express or implied.  See the License for the
* specific language governing permissions and limitations
* under the License.
*/

//! The VA-File: every object is scanned through its full approximation, candidates are refined
//! against the point cloud.

use super::approximation::{check_partitions, VectorApproximation};
use super::da_file::{build_grid, DaFile};
use super::lp_distance::VaLpDistance;
use super::ROUNDING_SLACK;
use crate::errors::*;
use crate::query_tools::KnnHeap;
use core_pages::IndexStatistics;
use log::debug;
use pointcloud::*;
use std::sync::Arc;

/// The grid and the approximations, shared by both VA-File flavours.
#[derive(Debug)]
pub(crate) struct VaCore<D: PointCloud> {
    pub(crate) point_cloud: Arc<D>,
    pub(crate) grid: Vec<DaFile>,
    pub(crate) approximations: Vec<VectorApproximation>,
    pub(crate) partitions: usize,
    pub(crate) page_size: usize,
    pub(crate) statistics: IndexStatistics,
}

impl<D: PointCloud> VaCore<D> {
    pub(crate) fn new(point_cloud: Arc<D>, partitions: usize, page_size: usize) -> SimIndexResult<Self> {
        check_partitions(partitions)?;
        let grid = build_grid(point_cloud.as_ref(), partitions)?;
        let mut approximations = Vec::with_capacity(point_cloud.len());
        for i in point_cloud.reference_indexes() {
            approximations.push(VectorApproximation::new(
                Some(i),
                point_cloud.point(i)?,
                &grid,
            ));
        }
        debug!(
            "Approximated {} objects of {} dimensions with {} partitions",
            approximations.len(),
            grid.len(),
            partitions
        );
        Ok(VaCore {
            point_cloud,
            grid,
            approximations,
            partitions,
            page_size: page_size.max(1),
            statistics: IndexStatistics::default(),
        })
    }

    /// The exponent and active dimensions of the cloud's metric.
    pub(crate) fn lp(&self) -> SimIndexResult<(f32, Vec<usize>)> {
        let metric = self.point_cloud.metric();
        match metric.lp_parameters() {
            Some(params) => Ok((params.p, params.active_dimensions(self.grid.len()))),
            None => Err(SimIndexError::UnsupportedDistance(format!("{:?}", metric))),
        }
    }

    pub(crate) fn check_k(&self, k: usize) -> SimIndexResult<()> {
        SimIndexError::check_k(k)?;
        if k > self.approximations.len() {
            return Err(SimIndexError::NotEnoughObjects {
                requested: k,
                available: self.approximations.len(),
            });
        }
        Ok(())
    }

    /// Counts one scan over `bytes`, rounded up to whole pages.
    pub(crate) fn count_scan(&self, bytes: usize) {
        let pages = (bytes + self.page_size - 1) / self.page_size;
        self.statistics.count_issued_query();
        self.statistics
            .count_scanned_bytes((pages * self.page_size) as u64);
    }

    #[inline]
    pub(crate) fn refine(&self, index: PointIndex, point: &[f32]) -> SimIndexResult<f32> {
        self.statistics.count_refinements(1);
        self.statistics.count_distances(1);
        Ok(self.point_cloud.distance_to_point(index, point)?)
    }

    /// The object behind an approximation.
    #[inline]
    pub(crate) fn object(&self, va: &VectorApproximation) -> PointIndex {
        va.index.unwrap_or_default()
    }
}

/// A query against a VA-File, for one metric. Turning the filter off refines every object.
#[derive(Debug)]
pub struct VaQuery<'a, I> {
    pub(crate) index: &'a I,
    pub(crate) p: f32,
    pub(crate) dimensions: Vec<usize>,
    pub(crate) filter: bool,
}

impl<'a, I> VaQuery<'a, I> {
    /// Enables or disables the approximation filter. Results do not change.
    pub fn with_filter(mut self, filter: bool) -> Self {
        self.filter = filter;
        self
    }

    /// The Lp exponent the query runs with
    pub fn p(&self) -> f32 {
        self.p
    }

    /// The dimensions the distance looks at
    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }
}

/// Vector approximation file over the whole vector.
#[derive(Debug)]
pub struct VaFile<D: PointCloud> {
    pub(crate) core: VaCore<D>,
}

impl<D: PointCloud> VaFile<D> {
    /// Builds the grid and approximates every object of the cloud. `partitions` cells per
    /// dimension, a power of two.
    pub fn new(point_cloud: Arc<D>, partitions: usize, page_size: usize) -> SimIndexResult<Self> {
        Ok(VaFile {
            core: VaCore::new(point_cloud, partitions, page_size)?,
        })
    }

    /// Number of indexed objects
    pub fn len(&self) -> usize {
        self.core.approximations.len()
    }

    /// If nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.core.approximations.is_empty()
    }

    /// Cells per dimension
    pub fn partitions(&self) -> usize {
        self.core.partitions
    }

    /// The per dimension grids
    pub fn grid(&self) -> &[DaFile] {
        &self.core.grid
    }

    /// The underlying point cloud
    pub fn point_cloud(&self) -> &Arc<D> {
        &self.core.point_cloud
    }

    /// The counters of this index
    pub fn statistics(&self) -> &IndexStatistics {
        &self.core.statistics
    }

    /// A kNN query, `UnsupportedDistance` unless the metric is an Lp norm.
    pub fn knn_query(&self) -> SimIndexResult<VaQuery<'_, Self>> {
        let (p, dimensions) = self.core.lp()?;
        Ok(VaQuery {
            index: self,
            p,
            dimensions,
            filter: true,
        })
    }

    /// A range query, `UnsupportedDistance` unless the metric is an Lp norm.
    pub fn range_query(&self) -> SimIndexResult<VaQuery<'_, Self>> {
        self.knn_query()
    }

    fn scanned_bytes(&self) -> usize {
        let per_object = VectorApproximation::byte_on_disk(self.core.grid.len(), self.core.partitions);
        let per_page = (self.core.page_size / per_object.max(1)).max(1);
        let pages = (self.len() + per_page - 1) / per_page;
        pages * self.core.page_size
    }
}

impl<'a, D: PointCloud> VaQuery<'a, VaFile<D>> {
    /// The `k` nearest objects, closest first.
    pub fn knn(&self, point: &[f32], k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        let core = &self.index.core;
        core.check_k(k)?;
        core.count_scan(self.index.scanned_bytes());
        let dist = VaLpDistance::new(self.p, &core.grid, point);

        let mut candidates: Vec<(f32, PointIndex)> = Vec::new();
        if self.filter {
            let mut upper = KnnHeap::new(k);
            for va in &core.approximations {
                let lower = dist.min_dist_p(va, &self.dimensions);
                if lower > upper.max_dist() * ROUNDING_SLACK {
                    continue;
                }
                upper.push(core.object(va), dist.max_dist_p(va, &self.dimensions));
                candidates.push((lower, core.object(va)));
            }
            let threshold = upper.max_dist() * ROUNDING_SLACK;
            candidates.retain(|(lower, _)| *lower <= threshold);
        } else {
            candidates.extend(core.approximations.iter().map(|va| (0.0, core.object(va))));
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut result = KnnHeap::new(k);
        for (lower, i) in candidates {
            if result.is_full() && lower > result.max_dist().powf(self.p) * ROUNDING_SLACK {
                break;
            }
            let d = core.refine(i, point)?;
            result.push(i, d);
        }
        Ok(result.unpack())
    }

    /// Every object within `radius`, closest first.
    pub fn range(&self, point: &[f32], radius: f32) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        let core = &self.index.core;
        core.count_scan(self.index.scanned_bytes());
        let dist = VaLpDistance::new(self.p, &core.grid, point);
        let threshold = radius.powf(self.p) * ROUNDING_SLACK;
        let mut result = Vec::new();
        for va in &core.approximations {
            if self.filter && dist.min_dist_p(va, &self.dimensions) > threshold {
                continue;
            }
            let i = core.object(va);
            let d = core.refine(i, point)?;
            if d <= radius {
                result.push((d, i));
            }
        }
        result.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mtree::tests::{brute_knn, random_cloud};

    #[test]
    fn knn_matches_scan() {
        let cloud = random_cloud(400, 6, 21);
        let va = VaFile::new(Arc::clone(&cloud), 8, 4096).unwrap();
        let query = va.knn_query().unwrap();
        let queries = random_cloud(10, 6, 22);
        for q in 0..10 {
            let point = queries.point(q).unwrap();
            let found = query.knn(point, 5).unwrap();
            let expected = brute_knn(&cloud, point, 5);
            for (f, e) in found.iter().zip(&expected) {
                assert_approx_eq!(f.0, e.0);
            }
        }
    }

    #[test]
    fn filter_saves_refinements() {
        let cloud = random_cloud(1000, 4, 3);
        let va = VaFile::new(Arc::clone(&cloud), 16, 4096).unwrap();
        let point = [0.5, 0.5, 0.5, 0.5];
        let filtered = va.knn_query().unwrap().knn(&point, 3).unwrap();
        let refined = va.statistics().snapshot().refinements;
        let unfiltered = va.knn_query().unwrap().with_filter(false).knn(&point, 3).unwrap();
        assert_eq!(filtered, unfiltered);
        assert!(refined < 1000);
        assert_eq!(va.statistics().snapshot().refinements, refined + 1000);
        assert_eq!(va.statistics().snapshot().issued_queries, 2);
    }

    #[test]
    fn range_with_and_without_filter() {
        let cloud = random_cloud(500, 3, 8);
        let va = VaFile::new(cloud, 4, 1024).unwrap();
        let point = [0.2, 0.4, 0.6];
        let a = va.range_query().unwrap().range(&point, 0.25).unwrap();
        let b = va.range_query().unwrap().with_filter(false).range(&point, 0.25).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn rejects_what_it_cannot_answer() {
        let cloud = random_cloud(10, 2, 0);
        assert!(matches!(
            VaFile::new(Arc::clone(&cloud), 6, 4096),
            Err(SimIndexError::InvalidPartitions { partitions: 6 })
        ));
        let va = VaFile::new(cloud, 4, 4096).unwrap();
        let err = va.knn_query().unwrap().knn(&[0.0, 0.0], 11).unwrap_err();
        assert!(err.is_usage_error());

        let canberra = Arc::new(DataRam::with_metric(vec![1.0, 2.0, 3.0, 4.0], 2, Canberra::default()).unwrap());
        let va = VaFile::new(canberra, 4, 4096).unwrap();
        assert!(va.knn_query().unwrap_err().is_unsupported());
    }
}
