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

//! Tools and data structures shared by every traversal.

pub(crate) mod query_items;
pub use query_items::{QueryCandidate, QuerySingleton};

pub(crate) mod knn_heap;
pub use knn_heap::KnnHeap;

/// The maximum of two bounds where an undefined (`NaN`) bound wins. An aggregate over a subtree
/// that contains an undefined bound is itself undefined.
#[inline]
pub fn nan_max(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a > b {
        a
    } else {
        b
    }
}

/// The pruning test against a kNN distance bound. An undefined bound always admits, so
/// subtrees whose bound is not known are expanded instead of pruned.
#[inline]
pub fn bound_admits(dist: f32, bound: f32) -> bool {
    bound.is_nan() || dist <= bound
}

/// `max(0, d - r)`, the smallest distance anything within `r` of a routing object can have to the query.
#[inline]
pub fn min_dist(dist_to_routing: f32, covering_radius: f32) -> f32 {
    if covering_radius > dist_to_routing {
        0.0
    } else {
        dist_to_routing - covering_radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_max_propagates() {
        assert_eq!(nan_max(1.0, 2.0), 2.0);
        assert!(nan_max(f32::NAN, 2.0).is_nan());
        assert!(nan_max(2.0, f32::NAN).is_nan());
        assert_eq!(nan_max(0.0, f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn undefined_bounds_always_admit() {
        assert!(bound_admits(100.0, f32::NAN));
        assert!(bound_admits(1.0, 1.0));
        assert!(!bound_admits(1.5, 1.0));
    }

    #[test]
    fn min_dist_is_clamped() {
        assert_eq!(min_dist(1.0, 3.0), 0.0);
        assert_eq!(min_dist(3.0, 1.0), 2.0);
        assert_eq!(min_dist(0.1 + 0.2, 0.3 + 1e-9), 0.0);
    }
}
