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

//! The two traits every index in this workspace is written against: the [`Metric`]
//! that measures objects and boxes, and the [`PointCloud`] that hands out objects by index.

use crate::pc_errors::*;
use crate::PointIndex;
use rayon::prelude::*;
use std::fmt::Debug;
use std::sync::Mutex;

/// The exponent and optional axis restriction of an Lp norm. Approximation based
/// indexes can only deal with metrics that expose one of these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LpParameters<'a> {
    /// The exponent, finite and at least 1
    pub p: f32,
    /// The axes the norm is restricted to, all axes if `None`
    pub dimensions: Option<&'a [usize]>,
}

impl<'a> LpParameters<'a> {
    /// The axes this norm runs over, for data of dimension `dim`.
    pub fn active_dimensions(&self, dim: usize) -> Vec<usize> {
        match self.dimensions {
            Some(dims) => dims.iter().cloned().filter(|d| *d < dim).collect(),
            None => (0..dim).collect(),
        }
    }
}

/// The distance oracle. It needs to be symmetric and satisfy the triangle inequality for the metric trees,
/// and `min_dist_to_rect` must never exceed the distance to any point inside the rectangle.
///
/// Every metric has a "rank" space, a monotone transform of the distance that is cheaper
/// to compute (the squared distance for L2). Traversals that only compare distances can stay in that space
/// and convert back with [`Metric::rank_to_dist`] once per result.
pub trait Metric: 'static + Send + Sync + Debug + Clone {
    /// Dense calculation
    fn dist(&self, x: &[f32], y: &[f32]) -> f32;

    /// A lower bound on the distance from `point` to anything inside the axis aligned
    /// rectangle `[lower, upper]`. Zero is always a valid answer.
    fn min_dist_to_rect(&self, _lower: &[f32], _upper: &[f32], _point: &[f32]) -> f32 {
        0.0
    }

    /// The distance in rank space.
    #[inline]
    fn dist_rank(&self, x: &[f32], y: &[f32]) -> f32 {
        self.dist_to_rank(self.dist(x, y))
    }

    /// The rectangle lower bound in rank space.
    #[inline]
    fn min_dist_rank_to_rect(&self, lower: &[f32], upper: &[f32], point: &[f32]) -> f32 {
        self.dist_to_rank(self.min_dist_to_rect(lower, upper, point))
    }

    /// Moves a distance into rank space
    #[inline]
    fn dist_to_rank(&self, dist: f32) -> f32 {
        dist
    }

    /// Moves a rank back into a distance
    #[inline]
    fn rank_to_dist(&self, rank: f32) -> f32 {
        rank
    }

    /// If this is an Lp norm, its parameters.
    fn lp_parameters(&self) -> Option<LpParameters<'_>> {
        None
    }
}

/// The object storage. Indexes only ever hold `PointIndex` values and ask the cloud for the coordinates.
pub trait PointCloud: Debug + Send + Sync + 'static {
    /// Underlying metric this point cloud uses
    type Metric: Metric;

    /// The metric instance
    fn metric(&self) -> &Self::Metric;
    /// The number of samples this cloud covers
    fn len(&self) -> usize;
    /// If this is empty
    fn is_empty(&self) -> bool;
    /// The dimension of the underlying data
    fn dim(&self) -> usize;
    /// Name for error reporting
    fn name(&self) -> &str;
    /// Indexes used for access
    fn reference_indexes(&self) -> Vec<PointIndex>;
    /// Gets a point from this dataset
    fn point(&self, pn: PointIndex) -> PointCloudResult<&[f32]>;

    /// Distance between two stored points.
    fn distance(&self, i: PointIndex, j: PointIndex) -> PointCloudResult<f32> {
        Ok(self.metric().dist(self.point(i)?, self.point(j)?))
    }

    /// The distance from a stored point to an outside one.
    fn distance_to_point(&self, i: PointIndex, point: &[f32]) -> PointCloudResult<f32> {
        Ok(self.metric().dist(self.point(i)?, point))
    }

    /// The main distance function. This parallelizes once there are enough indexes to make it worthwhile.
    fn distances_to_point(
        &self,
        point: &[f32],
        indexes: &[PointIndex],
    ) -> PointCloudResult<Vec<f32>> {
        let chunk = chunk(self.dim());
        let len = indexes.len();
        let metric = self.metric();
        if len > chunk * 3 {
            let mut dists: Vec<f32> = vec![0.0; len];
            let dist_iter = dists.par_chunks_mut(chunk);
            let indexes_iter = indexes.par_chunks(chunk);
            let error: Mutex<Result<(), PointCloudError>> = Mutex::new(Ok(()));
            dist_iter
                .zip(indexes_iter)
                .for_each(|(chunk_dists, chunk_indexes)| {
                    for (d, i) in chunk_dists.iter_mut().zip(chunk_indexes) {
                        match self.point(*i) {
                            Ok(y) => *d = metric.dist(point, y),
                            Err(e) => {
                                if let Ok(mut guard) = error.lock() {
                                    *guard = Err(e);
                                }
                            }
                        }
                    }
                });
            match error.into_inner() {
                Ok(res) => res?,
                Err(poisoned) => poisoned.into_inner()?,
            }
            Ok(dists)
        } else {
            indexes
                .iter()
                .map(|i| Ok(metric.dist(point, self.point(*i)?)))
                .collect()
        }
    }

    /// Distances from a stored point to a list of stored points.
    fn distances_to_point_index(
        &self,
        i: PointIndex,
        indexes: &[PointIndex],
    ) -> PointCloudResult<Vec<f32>> {
        self.distances_to_point(self.point(i)?, indexes)
    }

    /// The tightest axis aligned box around the given points, as `(lower, upper)`.
    fn bounding_box(&self, indexes: &[PointIndex]) -> PointCloudResult<(Vec<f32>, Vec<f32>)> {
        let mut lower = vec![f32::INFINITY; self.dim()];
        let mut upper = vec![f32::NEG_INFINITY; self.dim()];
        for i in indexes {
            let x = self.point(*i)?;
            for ((l, u), v) in lower.iter_mut().zip(upper.iter_mut()).zip(x) {
                *l = l.min(*v);
                *u = u.max(*v);
            }
        }
        Ok((lower, upper))
    }
}

fn chunk(dim: usize) -> usize {
    match dim {
        0..=1000 => 500,
        1001..=10000 => 100,
        _ => 10,
    }
}
