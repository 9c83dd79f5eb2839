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

//! The shapes a kNN distance bound can take on an M-tree entry.
//!
//! A bound on an entry is an upper bound on the k-NN distance of every object below it. The plain M-tree
//! carries none (`()`), the MkMax tree one distance for `k_max` (`f32`) and the MkTab tree one per `k` ([`KnnDistances`]).
//! Undefined values are `NaN` and always admit, see [`crate::query_tools::bound_admits`].

use crate::query_tools::nan_max;
use core_pages::DISTANCE_SIZE;
use pointcloud::PointIndex;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// The operations the trees need from a bound.
pub trait KnnBound: Clone + Debug + Send + Sync + 'static {
    /// Bytes the bound takes in a serialized entry.
    fn byte_size(k_max: usize) -> usize;
    /// A bound that is not known yet.
    fn undefined(k_max: usize) -> Self;
    /// The neutral element of [`KnnBound::aggregate`], the bound of an empty subtree.
    fn empty(k_max: usize) -> Self;
    /// Folds another bound in, element-wise [`nan_max`].
    fn aggregate(&mut self, other: &Self);
    /// The bound for `k`, `1 <= k <= k_max`.
    fn at(&self, k: usize) -> f32;
    /// The exact bound of an object from its sorted kNN list, the object itself included.
    fn from_knn_list(list: &[(f32, PointIndex)], k_max: usize) -> Self;
    /// Equality where two undefined values agree.
    fn same_as(&self, other: &Self) -> bool;
}

#[inline]
fn same_f32(a: f32, b: f32) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

impl KnnBound for () {
    fn byte_size(_k_max: usize) -> usize {
        0
    }
    fn undefined(_k_max: usize) -> Self {}
    fn empty(_k_max: usize) -> Self {}
    fn aggregate(&mut self, _other: &Self) {}
    fn at(&self, _k: usize) -> f32 {
        f32::NAN
    }
    fn from_knn_list(_list: &[(f32, PointIndex)], _k_max: usize) -> Self {}
    fn same_as(&self, _other: &Self) -> bool {
        true
    }
}

impl KnnBound for f32 {
    fn byte_size(_k_max: usize) -> usize {
        DISTANCE_SIZE
    }
    fn undefined(_k_max: usize) -> Self {
        f32::NAN
    }
    fn empty(_k_max: usize) -> Self {
        f32::NEG_INFINITY
    }
    fn aggregate(&mut self, other: &Self) {
        *self = nan_max(*self, *other);
    }
    fn at(&self, _k: usize) -> f32 {
        *self
    }
    fn from_knn_list(list: &[(f32, PointIndex)], k_max: usize) -> Self {
        match k_max.checked_sub(1).and_then(|i| list.get(i)) {
            Some((d, _)) => *d,
            None => f32::NAN,
        }
    }
    fn same_as(&self, other: &Self) -> bool {
        same_f32(*self, *other)
    }
}

/// One kNN distance per `k`, index `k - 1` holds the bound for `k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnDistances(pub Vec<f32>);

impl KnnBound for KnnDistances {
    fn byte_size(k_max: usize) -> usize {
        k_max * DISTANCE_SIZE
    }
    fn undefined(k_max: usize) -> Self {
        KnnDistances(vec![f32::NAN; k_max])
    }
    fn empty(k_max: usize) -> Self {
        KnnDistances(vec![f32::NEG_INFINITY; k_max])
    }
    fn aggregate(&mut self, other: &Self) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a = nan_max(*a, *b);
        }
    }
    fn at(&self, k: usize) -> f32 {
        k.checked_sub(1)
            .and_then(|i| self.0.get(i))
            .cloned()
            .unwrap_or(f32::NAN)
    }
    fn from_knn_list(list: &[(f32, PointIndex)], k_max: usize) -> Self {
        KnnDistances(
            (0..k_max)
                .map(|i| list.get(i).map(|(d, _)| *d).unwrap_or(f32::NAN))
                .collect(),
        )
    }
    fn same_as(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| same_f32(*a, *b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_from_list() {
        let list = [(0.0, 3), (0.5, 1), (0.7, 9)];
        assert_eq!(<f32 as KnnBound>::from_knn_list(&list, 2), 0.5);
        assert!(<f32 as KnnBound>::from_knn_list(&list, 4).is_nan());
    }

    #[test]
    fn table_from_list() {
        let list = [(0.0, 3), (0.5, 1)];
        let table = KnnDistances::from_knn_list(&list, 3);
        assert_eq!(table.at(1), 0.0);
        assert_eq!(table.at(2), 0.5);
        assert!(table.at(3).is_nan());
    }

    #[test]
    fn aggregation_is_elementwise_and_keeps_nan() {
        let mut a = KnnDistances::empty(3);
        a.aggregate(&KnnDistances(vec![0.1, 0.4, 0.9]));
        a.aggregate(&KnnDistances(vec![0.2, 0.3, f32::NAN]));
        assert_eq!(a.at(1), 0.2);
        assert_eq!(a.at(2), 0.4);
        assert!(a.at(3).is_nan());
        assert!(a.same_as(&KnnDistances(vec![0.2, 0.4, f32::NAN])));
    }

    #[test]
    fn scalar_aggregation() {
        let mut a = <f32 as KnnBound>::empty(5);
        a.aggregate(&0.3);
        a.aggregate(&0.1);
        assert_eq!(a, 0.3);
        a.aggregate(&f32::NAN);
        assert!(a.is_nan());
    }
}
