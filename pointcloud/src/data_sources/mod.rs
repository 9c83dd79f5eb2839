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

//! Ram allocated data.

use crate::base_traits::*;
use crate::metrics::*;
use crate::pc_errors::{PointCloudError, PointCloudResult};
use log::debug;

/// The data stored in ram as one flat row major buffer.
#[derive(Debug, Clone)]
pub struct DataRam<M = L2> {
    name: String,
    data: Vec<f32>,
    dim: usize,
    metric: M,
}

impl<M: Metric + Default> DataRam<M> {
    /// Consumes your buffer and dimension and gives a dimensioned cloud with the default metric.
    pub fn new(data: Vec<f32>, dim: usize) -> PointCloudResult<DataRam<M>> {
        DataRam::with_metric(data, dim, M::default())
    }
}

impl<M: Metric> DataRam<M> {
    /// Consumes your buffer and dimension, measuring with the given metric.
    pub fn with_metric(data: Vec<f32>, dim: usize, metric: M) -> PointCloudResult<DataRam<M>> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(PointCloudError::ShapeError {
                len: data.len(),
                dim,
            });
        }
        if let Some(params) = metric.lp_parameters() {
            if let Some(dimension) = params.dimensions.and_then(|d| d.iter().find(|d| **d >= dim))
            {
                return Err(PointCloudError::SubspaceError {
                    dimension: *dimension,
                    dim,
                });
            }
        }
        debug!("Built a ram cloud of {} points in dimension {}", data.len() / dim, dim);
        Ok(DataRam {
            name: "RAM".to_string(),
            data,
            dim,
            metric,
        })
    }

    /// Builds a cloud out of a list of rows, they all need the same length.
    pub fn from_rows(rows: &[Vec<f32>], metric: M) -> PointCloudResult<DataRam<M>> {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(dim * rows.len());
        for row in rows {
            if row.len() != dim {
                return Err(PointCloudError::ShapeError {
                    len: row.len(),
                    dim,
                });
            }
            data.extend_from_slice(row);
        }
        DataRam::with_metric(data, dim, metric)
    }

    /// Renames the cloud, used in error messages.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Merges two ram sets together.
    pub fn merge(&mut self, other: DataRam<M>) -> PointCloudResult<()> {
        if self.dim != other.dim {
            return Err(PointCloudError::ShapeError {
                len: other.data.len(),
                dim: self.dim,
            });
        }
        self.data.extend(other.data);
        Ok(())
    }
}

impl<M: Metric> PointCloud for DataRam<M> {
    type Metric = M;

    #[inline]
    fn metric(&self) -> &M {
        &self.metric
    }
    #[inline]
    fn dim(&self) -> usize {
        self.dim
    }
    #[inline]
    fn len(&self) -> usize {
        self.data.len() / self.dim
    }
    #[inline]
    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    #[inline]
    fn name(&self) -> &str {
        &self.name
    }
    #[inline]
    fn reference_indexes(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }
    #[inline]
    fn point(&self, i: usize) -> PointCloudResult<&[f32]> {
        match self.data.get(self.dim * i..(self.dim * i + self.dim)) {
            None => Err(PointCloudError::data_access(i, self.name.clone())),
            Some(x) => Ok(x),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn build_ram_random_test(count: usize, data_dim: usize) -> DataRam {
        DataRam::new(
            (0..count * data_dim)
                .map(|_i| rand::random::<f32>())
                .collect(),
            data_dim,
        )
        .unwrap()
    }

    #[test]
    fn point_correct() {
        let pc = DataRam::<L2>::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 2).unwrap();
        assert_eq!(pc.len(), 3);
        assert_eq!(pc.point(1).unwrap(), &[2.0, 3.0]);
        assert!(pc.point(3).is_err());
    }

    #[test]
    fn ragged_buffer_rejected() {
        assert!(DataRam::<L2>::new(vec![0.0; 7], 2).is_err());
        assert!(DataRam::<L2>::new(vec![0.0; 4], 0).is_err());
        assert!(DataRam::with_metric(vec![0.0; 4], 2, SubspaceLpNorm::new(2.0, &[0, 5]).unwrap()).is_err());
    }

    #[test]
    fn distances_to_point_matches_single() {
        let pc = build_ram_random_test(2000, 5);
        let point = [0.5; 5];
        let indexes = pc.reference_indexes();
        let dists = pc.distances_to_point(&point, &indexes).unwrap();
        for (i, d) in indexes.iter().zip(dists) {
            assert_approx_eq!(pc.distance_to_point(*i, &point).unwrap(), d);
        }
    }

    #[test]
    fn bounding_box_contains_points() {
        let pc = build_ram_random_test(50, 3);
        let (lower, upper) = pc.bounding_box(&pc.reference_indexes()).unwrap();
        for i in 0..pc.len() {
            let x = pc.point(i).unwrap();
            for d in 0..3 {
                assert!(lower[d] <= x[d] && x[d] <= upper[d]);
            }
        }
    }
}
