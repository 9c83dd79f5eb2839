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

//! The bounded max-heap that collects the k best objects of a query.

use super::query_items::QuerySingleton;
use pointcloud::PointIndex;
use std::collections::BinaryHeap;

/// Holds at most `k` objects, the worst on top. Once full, [`KnnHeap::max_dist`] is the pruning
/// threshold of the query, before that it is infinite.
#[derive(Debug, Clone)]
pub struct KnnHeap {
    dist_heap: BinaryHeap<QuerySingleton>,
    k: usize,
}

impl KnnHeap {
    /// Creates a new KNN heap. A heap with `k == 0` accepts nothing and is always full.
    pub fn new(k: usize) -> KnnHeap {
        KnnHeap {
            dist_heap: BinaryHeap::with_capacity(k + 1),
            k,
        }
    }

    /// Offers an object to the heap. Returns true if it was kept.
    pub fn push(&mut self, index: PointIndex, dist: f32) -> bool {
        if self.k == 0 {
            return false;
        }
        let candidate = QuerySingleton::new(index, dist);
        if self.dist_heap.len() < self.k {
            self.dist_heap.push(candidate);
            return true;
        }
        match self.dist_heap.peek() {
            Some(worst) if candidate < *worst => {
                self.dist_heap.pop();
                self.dist_heap.push(candidate);
                true
            }
            _ => false,
        }
    }

    /// The current maximum distance to the query point. If the heap isn't full it returns infinity.
    pub fn max_dist(&self) -> f32 {
        if self.is_full() {
            self.dist_heap.peek().map(|x| x.dist).unwrap_or(f32::INFINITY)
        } else {
            f32::INFINITY
        }
    }

    /// If `k` objects are held
    pub fn is_full(&self) -> bool {
        self.dist_heap.len() >= self.k
    }

    /// The current number of objects on the heap
    pub fn len(&self) -> usize {
        self.dist_heap.len()
    }

    /// If nothing was accepted yet
    pub fn is_empty(&self) -> bool {
        self.dist_heap.is_empty()
    }

    /// The size this heap is bounded to
    pub fn k(&self) -> usize {
        self.k
    }

    /// If the object is one of the held neighbors
    pub fn contains(&self, index: PointIndex) -> bool {
        self.dist_heap.iter().any(|s| s.index == index)
    }

    /// The held objects, closest first, without consuming the heap.
    pub fn to_sorted_vec(&self) -> Vec<(f32, PointIndex)> {
        let mut result: Vec<QuerySingleton> = self.dist_heap.iter().cloned().collect();
        result.sort();
        result.iter().map(|s| (s.dist, s.index)).collect()
    }

    /// Unpacks the distance heap, closest first. This consumes the heap.
    pub fn unpack(self) -> Vec<(f32, PointIndex)> {
        self.dist_heap
            .into_sorted_vec()
            .iter()
            .map(|s| (s.dist, s.index))
            .collect()
    }
}
