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

//! Lower and upper bounds of an Lp distance from the cells of an approximation.
//!
//! Everything is kept as the `p`-th power of the distance, partial sums over dimensions add up.

use super::approximation::VectorApproximation;
use super::da_file::DaFile;

/// Per query lookup tables.
#[derive(Debug, Clone)]
pub struct VaLpDistance {
    p: f32,
    lower: Vec<Vec<f32>>,
    upper: Vec<Vec<f32>>,
    max_max: Vec<f32>,
}

impl VaLpDistance {
    /// Tables for `query` over every dimension of the grid.
    pub fn new(p: f32, grid: &[DaFile], query: &[f32]) -> VaLpDistance {
        let mut lower = Vec::with_capacity(grid.len());
        let mut upper = Vec::with_capacity(grid.len());
        let mut max_max = Vec::with_capacity(grid.len());
        for (da, q) in grid.iter().zip(query) {
            let splits = da.splits();
            let (l, u): (Vec<f32>, Vec<f32>) = splits
                .windows(2)
                .map(|w| {
                    let gap = if *q < w[0] {
                        w[0] - q
                    } else if *q > w[1] {
                        q - w[1]
                    } else {
                        0.0
                    };
                    let far = (q - w[0]).abs().max((q - w[1]).abs());
                    (gap.powf(p), far.powf(p))
                })
                .unzip();
            lower.push(l);
            upper.push(u);
            let first = splits[0];
            let last = splits[splits.len() - 1];
            max_max.push((q - first).abs().max((q - last).abs()).powf(p));
        }
        VaLpDistance {
            p,
            lower,
            upper,
            max_max,
        }
    }

    /// The exponent
    pub fn p(&self) -> f32 {
        self.p
    }

    /// Smallest possible contribution of `dimension` for an object in `cell`
    #[inline]
    pub fn partial_min(&self, dimension: usize, cell: usize) -> f32 {
        self.lower[dimension][cell]
    }

    /// Largest possible contribution of `dimension` for an object in `cell`
    #[inline]
    pub fn partial_max(&self, dimension: usize, cell: usize) -> f32 {
        self.upper[dimension][cell]
    }

    /// Largest possible contribution of `dimension` for any object in the grid
    #[inline]
    pub fn partial_max_max(&self, dimension: usize) -> f32 {
        self.max_max[dimension]
    }

    /// Lower bound on the distance to the power `p` over `dimensions`.
    pub fn min_dist_p(&self, va: &VectorApproximation, dimensions: &[usize]) -> f32 {
        dimensions
            .iter()
            .map(|d| self.partial_min(*d, va.cell(*d)))
            .sum()
    }

    /// Upper bound on the distance to the power `p` over `dimensions`.
    pub fn max_dist_p(&self, va: &VectorApproximation, dimensions: &[usize]) -> f32 {
        dimensions
            .iter()
            .map(|d| self.partial_max(*d, va.cell(*d)))
            .sum()
    }

    /// Lower bound on the distance
    pub fn min_dist(&self, va: &VectorApproximation, dimensions: &[usize]) -> f32 {
        self.min_dist_p(va, dimensions).powf(1.0 / self.p)
    }

    /// Upper bound on the distance
    pub fn max_dist(&self, va: &VectorApproximation, dimensions: &[usize]) -> f32 {
        self.max_dist_p(va, dimensions).powf(1.0 / self.p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<DaFile> {
        vec![
            DaFile::new(0, (0..8).map(|i| i as f32).collect(), 4),
            DaFile::new(1, (0..8).map(|i| i as f32).collect(), 4),
        ]
    }

    #[test]
    fn own_cell_has_no_lower_bound() {
        let dist = VaLpDistance::new(2.0, &grid(), &[3.0, 3.0]);
        assert_approx_eq!(dist.partial_min(0, 1), 0.0);
        assert_approx_eq!(dist.partial_max(0, 1), 1.0);
        assert_approx_eq!(dist.partial_min(0, 3), 9.0);
        assert_approx_eq!(dist.partial_max(0, 3), 16.0);
        assert_approx_eq!(dist.partial_max_max(0), 16.0);
    }

    #[test]
    fn bounds_enclose_true_distance() {
        let grid = grid();
        let query = [0.5, 6.5];
        let dist = VaLpDistance::new(2.0, &grid, &query);
        for x in [[1.0, 1.0], [7.0, 0.0], [4.5, 6.0]] {
            let va = VectorApproximation::new(Some(0), &x, &grid);
            let truth = ((x[0] - query[0]).powi(2) + (x[1] - query[1]).powi(2)).sqrt();
            assert!(dist.min_dist(&va, &[0, 1]) <= truth + 1e-6);
            assert!(dist.max_dist(&va, &[0, 1]) >= truth - 1e-6);
        }
    }
}
