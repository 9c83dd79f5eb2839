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

//! Per object cell vectors.

use super::da_file::DaFile;
use crate::errors::*;
use log::warn;
use pointcloud::PointIndex;
use smallvec::SmallVec;

/// The cell of an object in every dimension's grid. Query approximations have no index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorApproximation {
    /// The stored object, `None` for a query
    pub index: Option<PointIndex>,
    /// One cell per dimension
    pub cells: SmallVec<[u32; 16]>,
}

impl VectorApproximation {
    /// Quantizes a point. Stored objects outside the grid are logged.
    pub fn new(index: Option<PointIndex>, point: &[f32], grid: &[DaFile]) -> VectorApproximation {
        let mut outside = false;
        let cells = grid
            .iter()
            .zip(point)
            .map(|(da, x)| {
                let (cell, inside) = da.cell(*x);
                outside |= !inside;
                cell
            })
            .collect();
        if outside {
            if let Some(i) = index {
                warn!("Object {} lies outside of the VA-File grid", i);
            }
        }
        VectorApproximation { index, cells }
    }

    /// The cell in one dimension
    #[inline]
    pub fn cell(&self, dimension: usize) -> usize {
        self.cells[dimension] as usize
    }

    /// Bytes one approximation over `dims` dimensions takes.
    pub fn byte_on_disk(dims: usize, partitions: usize) -> usize {
        let bits = partitions.trailing_zeros() as usize;
        (dims * bits + 7) / 8
    }
}

/// Partition counts have to be a power of two, at least 2.
pub(crate) fn check_partitions(partitions: usize) -> SimIndexResult<()> {
    if partitions < 2 || !partitions.is_power_of_two() {
        Err(SimIndexError::InvalidPartitions { partitions })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_on_disk() {
        assert_eq!(VectorApproximation::byte_on_disk(8, 16), 4);
        assert_eq!(VectorApproximation::byte_on_disk(3, 2), 1);
        assert_eq!(VectorApproximation::byte_on_disk(9, 256), 9);
    }

    #[test]
    fn partition_counts() {
        assert!(check_partitions(16).is_ok());
        assert!(check_partitions(2).is_ok());
        assert!(check_partitions(1).is_err());
        let err = check_partitions(12).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(!err.is_usage_error());
    }

    #[test]
    fn approximates_per_dimension() {
        let grid = vec![
            DaFile::new(0, vec![0.0, 1.0, 2.0, 3.0], 2),
            DaFile::new(1, vec![10.0, 20.0, 30.0, 40.0], 2),
        ];
        let va = VectorApproximation::new(Some(0), &[2.5, 15.0], &grid);
        assert_eq!(va.cell(0), 1);
        assert_eq!(va.cell(1), 0);
    }
}
