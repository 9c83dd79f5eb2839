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

//! One dimension's quantization grid.

use crate::errors::*;
use core_pages::DISTANCE_SIZE;
use pointcloud::*;

/// Quantile split positions of one dimension. Cell `b` spans `[splits[b], splits[b + 1]]`.
#[derive(Debug, Clone)]
pub struct DaFile {
    dimension: usize,
    splits: Vec<f32>,
}

impl DaFile {
    /// Splits the sorted values of one dimension into `partitions` cells holding about the same
    /// number of values.
    pub fn new(dimension: usize, mut values: Vec<f32>, partitions: usize) -> DaFile {
        values.sort_by(|a, b| a.total_cmp(b));
        let n = values.len();
        let mut splits = Vec::with_capacity(partitions + 1);
        if n == 0 {
            splits.resize(partitions + 1, 0.0);
        } else {
            for b in 0..partitions {
                splits.push(values[b * n / partitions]);
            }
            splits.push(values[n - 1]);
        }
        DaFile { dimension, splits }
    }

    /// The dimension this grid covers
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The `partitions + 1` split positions
    pub fn splits(&self) -> &[f32] {
        &self.splits
    }

    /// Number of cells
    pub fn partitions(&self) -> usize {
        self.splits.len() - 1
    }

    /// The cell of a value and whether the value lies inside the grid. Values outside are put in
    /// the nearest border cell.
    pub fn cell(&self, value: f32) -> (u32, bool) {
        let last = self.partitions() - 1;
        if value < self.splits[0] {
            return (0, false);
        }
        if value > self.splits[last + 1] {
            return (last as u32, false);
        }
        // largest b with splits[b] <= value
        let b = self.splits.partition_point(|s| *s <= value) - 1;
        (b.min(last) as u32, true)
    }

    /// Bytes read when scanning this dimension's approximations of `len` objects, plus its splits.
    pub fn io_costs(&self, len: usize) -> usize {
        let bits = self.partitions().trailing_zeros() as usize;
        (len * bits + 7) / 8 + self.splits.len() * DISTANCE_SIZE
    }
}

/// One grid per dimension of the cloud.
pub(crate) fn build_grid<D: PointCloud>(
    point_cloud: &D,
    partitions: usize,
) -> SimIndexResult<Vec<DaFile>> {
    let dim = point_cloud.dim();
    let mut columns: Vec<Vec<f32>> = vec![Vec::with_capacity(point_cloud.len()); dim];
    for i in point_cloud.reference_indexes() {
        let point = point_cloud.point(i)?;
        for (column, x) in columns.iter_mut().zip(point) {
            column.push(*x);
        }
    }
    Ok(columns
        .into_iter()
        .enumerate()
        .map(|(d, values)| DaFile::new(d, values, partitions))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_splits() {
        let values: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let da = DaFile::new(0, values, 4);
        assert_eq!(da.splits(), &[0.0, 2.0, 4.0, 6.0, 7.0]);
        assert_eq!(da.cell(0.0), (0, true));
        assert_eq!(da.cell(1.9), (0, true));
        assert_eq!(da.cell(2.0), (1, true));
        assert_eq!(da.cell(7.0), (3, true));
        assert_eq!(da.cell(-1.0), (0, false));
        assert_eq!(da.cell(9.0), (3, false));
    }

    #[test]
    fn repeated_values() {
        let da = DaFile::new(0, vec![1.0; 10], 2);
        assert_eq!(da.splits(), &[1.0, 1.0, 1.0]);
        assert_eq!(da.cell(1.0), (1, true));
    }

    #[test]
    fn io_costs_count_bits() {
        let da = DaFile::new(0, (0..16).map(|i| i as f32).collect(), 16);
        // 4 bits for each of 10 objects, and 17 splits
        assert_eq!(da.io_costs(10), 5 + 17 * 4);
    }
}
