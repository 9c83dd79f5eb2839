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

//! The items that go onto the query heaps.

use core_pages::PageId;
use pointcloud::PointIndex;
use std::cmp::Ordering;

/// A found object. Ordered by distance then index, so the max-heap pops the worst neighbor first
/// and ties are broken the same way everywhere.
#[derive(Debug, Clone, Copy)]
pub struct QuerySingleton {
    /// Distance (or rank) to the query
    pub dist: f32,
    /// The object
    pub index: PointIndex,
}

impl QuerySingleton {
    /// An object at `dist` from the query
    pub fn new(index: PointIndex, dist: f32) -> QuerySingleton {
        QuerySingleton { dist, index }
    }
}

impl PartialEq for QuerySingleton {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QuerySingleton {}

impl Ord for QuerySingleton {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .partial_cmp(&other.dist)
            .unwrap_or(Ordering::Less)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for QuerySingleton {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A node that still has to be expanded. Ordered in reverse by `min_dist` so a `BinaryHeap`
/// pops the closest node first. An undefined `min_dist` pops before everything else.
#[derive(Debug, Clone, Copy)]
pub struct QueryCandidate {
    /// Lower bound of the distance from the query to anything in the node
    pub min_dist: f32,
    /// The node
    pub page: PageId,
    /// Distance from the query to the node's routing object, NaN if the node has none
    pub dist_to_routing: f32,
}

impl QueryCandidate {
    /// A page to visit, queued by its smallest possible distance
    pub fn new(page: PageId, min_dist: f32, dist_to_routing: f32) -> QueryCandidate {
        QueryCandidate {
            min_dist,
            page,
            dist_to_routing,
        }
    }
}

impl PartialEq for QueryCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueryCandidate {}

impl Ord for QueryCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.min_dist.is_nan(), other.min_dist.is_nan()) {
            (true, true) => other.page.cmp(&self.page),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => other
                .min_dist
                .partial_cmp(&self.min_dist)
                .unwrap_or(Ordering::Equal)
                .then(other.page.cmp(&self.page)),
        }
    }
}

impl PartialOrd for QueryCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn candidates_pop_closest_first() {
        let mut heap = BinaryHeap::new();
        heap.push(QueryCandidate::new(PageId::from(0), 0.5, 1.0));
        heap.push(QueryCandidate::new(PageId::from(1), 0.1, 1.0));
        heap.push(QueryCandidate::new(PageId::from(2), f32::NAN, 1.0));
        heap.push(QueryCandidate::new(PageId::from(3), 0.3, 1.0));
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|c| c.page.raw())).collect();
        assert_eq!(order, vec![2, 1, 3, 0]);
    }

    #[test]
    fn singletons_pop_furthest_first() {
        let mut heap = BinaryHeap::new();
        heap.push(QuerySingleton::new(4, 0.2));
        heap.push(QuerySingleton::new(2, 0.9));
        heap.push(QuerySingleton::new(1, 0.9));
        assert_eq!(heap.pop().unwrap().index, 2);
        assert_eq!(heap.pop().unwrap().index, 1);
    }
}
