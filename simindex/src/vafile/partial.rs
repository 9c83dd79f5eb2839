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

//! The partial VA-File keeps one approximation file per dimension and reads only as many of them as
//! a query needs.
//!
//! Range queries scan the most selective dimensions first and drop an object as soon as its partial
//! lower bound leaves the radius. kNN queries first filter on about two thirds of the dimensions,
//! those with the largest worst case contribution, then add one dimension at a time for as long as
//! refining the remaining candidates would cost more than reading the rest of the dimensions.

use super::approximation::VectorApproximation;
use super::da_file::DaFile;
use super::lp_distance::VaLpDistance;
use super::va_file::{VaCore, VaQuery};
use super::ROUNDING_SLACK;
use crate::errors::*;
use crate::query_tools::KnnHeap;
use core_pages::IndexStatistics;
use log::trace;
use pointcloud::*;
use std::sync::Arc;

/// Bytes needed to refine one candidate per dimension, a full precision coordinate.
const REFINE_COORDINATE_SIZE: usize = 8;
/// Bytes for the object id of a refined candidate.
const REFINE_ID_SIZE: usize = 4;

/// Vector approximation file split by dimension.
#[derive(Debug)]
pub struct PartialVaFile<D: PointCloud> {
    pub(crate) core: VaCore<D>,
}

#[derive(Debug, Clone, Copy)]
struct PartialCandidate {
    position: usize,
    lower: f32,
    upper: f32,
}

impl<D: PointCloud> PartialVaFile<D> {
    /// Builds one grid per dimension and approximates every object of the cloud.
    pub fn new(point_cloud: Arc<D>, partitions: usize, page_size: usize) -> SimIndexResult<Self> {
        Ok(PartialVaFile {
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

    /// A kNN query, `UnsupportedDistance` unless the metric is an Lp norm or its subspace version.
    pub fn knn_query(&self) -> SimIndexResult<VaQuery<'_, Self>> {
        let (p, dimensions) = self.core.lp()?;
        Ok(VaQuery {
            index: self,
            p,
            dimensions,
            filter: true,
        })
    }

    /// A range query, `UnsupportedDistance` unless the metric is an Lp norm or its subspace version.
    pub fn range_query(&self) -> SimIndexResult<VaQuery<'_, Self>> {
        self.knn_query()
    }

    /// Number of cells the interval `[q - radius, q + radius]` touches in every dimension.
    fn selectivity(&self, point: &[f32], radius: f32, dimensions: &[usize]) -> Vec<usize> {
        dimensions
            .iter()
            .map(|d| {
                let da = &self.core.grid[*d];
                let (low, _) = da.cell(point[*d] - radius);
                let (high, _) = da.cell(point[*d] + radius);
                (high - low) as usize + 1
            })
            .collect()
    }

    fn refine_cost(candidates: usize, dims: usize) -> usize {
        candidates * (dims * REFINE_COORDINATE_SIZE + REFINE_ID_SIZE)
    }
}

impl<'a, D: PointCloud> VaQuery<'a, PartialVaFile<D>> {
    /// Every object within `radius`, closest first.
    pub fn range(&self, point: &[f32], radius: f32) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        let index = self.index;
        let core = &index.core;
        let per_object = VectorApproximation::byte_on_disk(self.dimensions.len(), core.partitions);
        core.count_scan(core.approximations.len() * per_object);
        let dist = VaLpDistance::new(self.p, &core.grid, point);
        let threshold = radius.powf(self.p) * ROUNDING_SLACK;

        let selectivity = index.selectivity(point, radius, &self.dimensions);
        let mut order: Vec<(usize, usize)> = selectivity
            .into_iter()
            .zip(self.dimensions.iter().cloned())
            .collect();
        order.sort_by_key(|(s, _)| *s);
        let order: Vec<usize> = order.into_iter().map(|(_, d)| d).collect();

        let mut result = Vec::new();
        for va in &core.approximations {
            if self.filter {
                let mut lower = 0.0;
                let mut pruned = false;
                for d in &order {
                    lower += dist.partial_min(*d, va.cell(*d));
                    if lower > threshold {
                        pruned = true;
                        break;
                    }
                }
                if pruned {
                    continue;
                }
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

    /// The `k` nearest objects, closest first.
    pub fn knn(&self, point: &[f32], k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        let core = &self.index.core;
        core.check_k(k)?;
        let n = core.approximations.len();
        let n_dims = self.dimensions.len();

        if !self.filter {
            core.count_scan(0);
            let mut result = KnnHeap::new(k);
            for va in &core.approximations {
                let i = core.object(va);
                result.push(i, core.refine(i, point)?);
            }
            return Ok(result.unpack());
        }

        let dist = VaLpDistance::new(self.p, &core.grid, point);
        let mut dims = self.dimensions.clone();
        dims.sort_by(|a, b| {
            dist.partial_max_max(*b)
                .total_cmp(&dist.partial_max_max(*a))
                .then(a.cmp(b))
        });
        let reduced = (2 * n_dims / 3).max(1).min(n_dims);

        // first filter over the reduced dimensions, the rest counts with its worst case
        let rest: f32 = dims[reduced..].iter().map(|d| dist.partial_max_max(*d)).sum();
        let mut upper_heap = KnnHeap::new(k);
        let mut candidates = Vec::new();
        for (position, va) in core.approximations.iter().enumerate() {
            let mut lower = 0.0;
            let mut upper = rest;
            for d in &dims[..reduced] {
                lower += dist.partial_min(*d, va.cell(*d));
                upper += dist.partial_max(*d, va.cell(*d));
            }
            if lower <= upper_heap.max_dist() * ROUNDING_SLACK {
                upper_heap.push(position, upper);
                candidates.push(PartialCandidate {
                    position,
                    lower,
                    upper,
                });
            }
        }
        let threshold = upper_heap.max_dist() * ROUNDING_SLACK;
        candidates.retain(|c| c.lower <= threshold);
        trace!(
            "Filter over {} of {} dimensions kept {} of {}",
            reduced,
            n_dims,
            candidates.len(),
            n
        );

        let mut added = reduced;
        let da_cost = dims.first().map(|d| core.grid[*d].io_costs(n)).unwrap_or(0);
        let mut first_step = true;
        while added < n_dims
            && (first_step
                || PartialVaFile::<D>::refine_cost(candidates.len(), n_dims)
                    >= da_cost * (n_dims - added))
        {
            first_step = false;
            let d = dims[added];
            let mut upper_heap = KnnHeap::new(k);
            let mut kept = Vec::with_capacity(candidates.len());
            for mut c in candidates {
                let cell = core.approximations[c.position].cell(d);
                c.lower += dist.partial_min(d, cell);
                c.upper += dist.partial_max(d, cell) - dist.partial_max_max(d);
                if c.lower <= upper_heap.max_dist() * ROUNDING_SLACK {
                    upper_heap.push(c.position, c.upper);
                    kept.push(c);
                }
            }
            let threshold = upper_heap.max_dist() * ROUNDING_SLACK;
            kept.retain(|c| c.lower <= threshold);
            candidates = kept;
            added += 1;
            trace!("Filter over {} dimensions kept {}", added, candidates.len());
        }
        core.count_scan(n * VectorApproximation::byte_on_disk(added, core.partitions));

        candidates.sort_by(|a, b| a.lower.total_cmp(&b.lower));
        let mut result = KnnHeap::new(k);
        for c in candidates {
            if result.is_full() && c.lower > result.max_dist().powf(self.p) * ROUNDING_SLACK {
                break;
            }
            let i = core.object(&core.approximations[c.position]);
            result.push(i, core.refine(i, point)?);
        }
        Ok(result.unpack())
    }
}
