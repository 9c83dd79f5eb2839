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

//! The Lp family: L1, L2, L-infinity, a general exponent, and the axis restricted version.

use super::rect_gap;
use crate::base_traits::{LpParameters, Metric};
use crate::pc_errors::{PointCloudError, PointCloudResult};
use smallvec::SmallVec;

/// Squared L2 over the full slices.
#[inline]
pub fn sq_l2_dense_f32(x: &[f32], y: &[f32]) -> f32 {
    x.iter()
        .zip(y)
        .map(|(xi, yi)| (xi - yi) * (xi - yi))
        .fold(0.0, |acc, y| acc + y)
}

/// Squared L2 norm
#[inline]
pub fn sq_l2_norm_f32(x: &[f32]) -> f32 {
    x.iter().map(|xi| xi * xi).fold(0.0, |acc, xi| acc + xi)
}

/// L2 norm, the square root of the sum of squares
#[derive(Debug, Clone, Default)]
pub struct L2 {}

impl Metric for L2 {
    #[inline]
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        sq_l2_dense_f32(x, y).sqrt()
    }
    fn min_dist_to_rect(&self, lower: &[f32], upper: &[f32], point: &[f32]) -> f32 {
        self.min_dist_rank_to_rect(lower, upper, point).sqrt()
    }
    #[inline]
    fn dist_rank(&self, x: &[f32], y: &[f32]) -> f32 {
        sq_l2_dense_f32(x, y)
    }
    fn min_dist_rank_to_rect(&self, lower: &[f32], upper: &[f32], point: &[f32]) -> f32 {
        lower
            .iter()
            .zip(upper)
            .zip(point)
            .map(|((l, u), x)| {
                let g = rect_gap(*l, *u, *x);
                g * g
            })
            .fold(0.0, |acc, g| acc + g)
    }
    #[inline]
    fn dist_to_rank(&self, dist: f32) -> f32 {
        dist * dist
    }
    #[inline]
    fn rank_to_dist(&self, rank: f32) -> f32 {
        rank.sqrt()
    }
    fn lp_parameters(&self) -> Option<LpParameters<'_>> {
        Some(LpParameters {
            p: 2.0,
            dimensions: None,
        })
    }
}

/// L1 norm, the sum of absolute differences
#[derive(Debug, Clone, Default)]
pub struct L1 {}

impl Metric for L1 {
    #[inline]
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        x.iter()
            .zip(y)
            .map(|(xi, yi)| (xi - yi).abs())
            .fold(0.0, |acc, y| acc + y)
    }
    fn min_dist_to_rect(&self, lower: &[f32], upper: &[f32], point: &[f32]) -> f32 {
        lower
            .iter()
            .zip(upper)
            .zip(point)
            .map(|((l, u), x)| rect_gap(*l, *u, *x))
            .fold(0.0, |acc, g| acc + g)
    }
    fn lp_parameters(&self) -> Option<LpParameters<'_>> {
        Some(LpParameters {
            p: 1.0,
            dimensions: None,
        })
    }
}

/// The maximum absolute difference. Not additive over axes, so it does not report Lp parameters.
#[derive(Debug, Clone, Default)]
pub struct Linfty {}

impl Metric for Linfty {
    #[inline]
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        x.iter()
            .zip(y)
            .map(|(xi, yi)| (xi - yi).abs())
            .fold(0.0, f32::max)
    }
    fn min_dist_to_rect(&self, lower: &[f32], upper: &[f32], point: &[f32]) -> f32 {
        lower
            .iter()
            .zip(upper)
            .zip(point)
            .map(|((l, u), x)| rect_gap(*l, *u, *x))
            .fold(0.0, f32::max)
    }
}

#[inline]
fn lp_sum<I: Iterator<Item = f32>>(diffs: I, p: f32) -> f32 {
    diffs.map(|d| d.abs().powf(p)).fold(0.0, |acc, d| acc + d)
}

/// A general Lp norm, `p >= 1`.
#[derive(Debug, Clone)]
pub struct LpNorm {
    p: f32,
}

/// Exponents below 1 do not give metrics.
fn check_exponent(p: f32) -> PointCloudResult<()> {
    if p >= 1.0 && p.is_finite() {
        Ok(())
    } else {
        Err(PointCloudError::ExponentError { p })
    }
}

impl LpNorm {
    /// An Lp norm, `ExponentError` unless `p` is finite and at least 1.
    pub fn new(p: f32) -> PointCloudResult<LpNorm> {
        check_exponent(p)?;
        Ok(LpNorm { p })
    }
    /// The exponent
    pub fn p(&self) -> f32 {
        self.p
    }
}

impl Metric for LpNorm {
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        self.rank_to_dist(self.dist_rank(x, y))
    }
    fn min_dist_to_rect(&self, lower: &[f32], upper: &[f32], point: &[f32]) -> f32 {
        self.rank_to_dist(self.min_dist_rank_to_rect(lower, upper, point))
    }
    fn dist_rank(&self, x: &[f32], y: &[f32]) -> f32 {
        lp_sum(x.iter().zip(y).map(|(xi, yi)| xi - yi), self.p)
    }
    fn min_dist_rank_to_rect(&self, lower: &[f32], upper: &[f32], point: &[f32]) -> f32 {
        lp_sum(
            lower
                .iter()
                .zip(upper)
                .zip(point)
                .map(|((l, u), x)| rect_gap(*l, *u, *x)),
            self.p,
        )
    }
    fn dist_to_rank(&self, dist: f32) -> f32 {
        dist.powf(self.p)
    }
    fn rank_to_dist(&self, rank: f32) -> f32 {
        rank.powf(1.0 / self.p)
    }
    fn lp_parameters(&self) -> Option<LpParameters<'_>> {
        Some(LpParameters {
            p: self.p,
            dimensions: None,
        })
    }
}

/// An Lp norm that only looks at a fixed set of axes.
#[derive(Debug, Clone)]
pub struct SubspaceLpNorm {
    p: f32,
    dimensions: SmallVec<[usize; 8]>,
}

impl SubspaceLpNorm {
    /// The dimensions are deduplicated and sorted.
    pub fn new(p: f32, dimensions: &[usize]) -> PointCloudResult<SubspaceLpNorm> {
        check_exponent(p)?;
        let mut dimensions: SmallVec<[usize; 8]> = dimensions.iter().cloned().collect();
        dimensions.sort_unstable();
        dimensions.dedup();
        Ok(SubspaceLpNorm { p, dimensions })
    }

    /// The axes this norm looks at
    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }
}

impl Metric for SubspaceLpNorm {
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        self.rank_to_dist(self.dist_rank(x, y))
    }
    fn min_dist_to_rect(&self, lower: &[f32], upper: &[f32], point: &[f32]) -> f32 {
        self.rank_to_dist(self.min_dist_rank_to_rect(lower, upper, point))
    }
    fn dist_rank(&self, x: &[f32], y: &[f32]) -> f32 {
        lp_sum(
            self.dimensions
                .iter()
                .filter(|d| **d < x.len() && **d < y.len())
                .map(|d| x[*d] - y[*d]),
            self.p,
        )
    }
    fn min_dist_rank_to_rect(&self, lower: &[f32], upper: &[f32], point: &[f32]) -> f32 {
        lp_sum(
            self.dimensions
                .iter()
                .filter(|d| **d < point.len())
                .map(|d| rect_gap(lower[*d], upper[*d], point[*d])),
            self.p,
        )
    }
    fn dist_to_rank(&self, dist: f32) -> f32 {
        dist.powf(self.p)
    }
    fn rank_to_dist(&self, rank: f32) -> f32 {
        rank.powf(1.0 / self.p)
    }
    fn lp_parameters(&self) -> Option<LpParameters<'_>> {
        Some(LpParameters {
            p: self.p,
            dimensions: Some(&self.dimensions),
        })
    }
}
