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

//! The MkMax tree: an M-tree whose entries carry one kNN distance bound for a fixed `k_max`.
//!
//! Single inserts keep every bound exact through [`MkMaxTree::insert`], which walks the tree before
//! the physical insert and recomputes the bound of every object the new one displaces from its
//! `k_max` neighbours. Reverse kNN queries for `k < k_max` use the `k_max` bounds for candidates
//! and refine them with one shared kNN traversal.

use super::tree::MTree;
use crate::errors::*;
use crate::query_tools::*;
use super::node::MTreeNode;
use super::bounds::KnnBound;
use core_pages::*;
use log::debug;
use pointcloud::*;
use std::sync::Arc;

/// M-tree with a scalar `k_max`-NN bound on every entry.
#[derive(Debug)]
pub struct MkMaxTree<D: PointCloud> {
    pub(crate) tree: MTree<D, f32>,
}

impl<D: PointCloud> MkMaxTree<D> {
    /// An empty tree answering reverse kNN queries up to `k_max`.
    pub fn new(point_cloud: Arc<D>, page_size: usize, k_max: usize) -> SimIndexResult<Self> {
        SimIndexError::check_k(k_max)?;
        Ok(MkMaxTree {
            tree: MTree::new(point_cloud, page_size, k_max)?,
        })
    }

    /// The underlying M-tree, for kNN and range queries.
    pub fn tree(&self) -> &MTree<D, f32> {
        &self.tree
    }

    /// Above 1 bulk loads print a progress bar.
    pub fn set_verbosity(&mut self, verbosity: u32) {
        self.tree.set_verbosity(verbosity);
    }

    /// Largest supported `k`
    pub fn k_max(&self) -> usize {
        self.tree.k_max
    }

    /// Number of indexed objects
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// If nothing was inserted
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The counters of this tree
    pub fn statistics(&self) -> &IndexStatistics {
        self.tree.statistics()
    }

    /// Inserts one object and updates the bounds of every object it becomes a `k_max` neighbour of.
    pub fn insert(&mut self, q: PointIndex) -> SimIndexResult<()> {
        let bound = self.pre_insert(q)?;
        self.tree.insert_entry(q, bound)
    }

    /// Inserts many objects at once. Bounds are computed after all of them are in the tree.
    pub fn insert_all(&mut self, ids: &[PointIndex]) -> SimIndexResult<()> {
        self.tree.bulk_load(ids)
    }

    /// Walks the tree ahead of inserting `q`. Returns the bound `q` should be inserted with.
    fn pre_insert(&mut self, q: PointIndex) -> SimIndexResult<f32> {
        let k_max = self.tree.k_max;
        // q is its own first neighbour
        let mut knns_q = KnnHeap::new(k_max - 1);
        if let Some(root) = self.tree.root {
            self.tree.root_bound = self.pre_insert_node(root, q, &mut knns_q)?;
        }
        let mut list = vec![(0.0, q)];
        list.extend(knns_q.unpack());
        Ok(f32::from_knn_list(&list, k_max))
    }

    /// Returns the new aggregate bound of the node.
    fn pre_insert_node(
        &mut self,
        page: PageId,
        q: PointIndex,
        knns_q: &mut KnnHeap,
    ) -> SimIndexResult<f32> {
        let k_max = self.tree.k_max;
        let is_leaf = self.tree.store.read(page)?.is_leaf();
        if is_leaf {
            let entries: Vec<(PointIndex, f32)> = match self.tree.store.read(page)? {
                MTreeNode::Leaf(entries) => entries.iter().map(|e| (e.object, e.bound)).collect(),
                MTreeNode::Directory(_) => Vec::new(),
            };
            let mut updates = Vec::new();
            for (i, (p, bound)) in entries.iter().enumerate() {
                let d = self.tree.distance(*p, q)?;
                knns_q.push(*p, d);
                if bound_admits(d, *bound) {
                    let point = self.tree.point_cloud.point(*p)?;
                    let mut list = self.tree.knn_heap(point, k_max)?;
                    list.push(q, d);
                    updates.push((i, f32::from_knn_list(&list.unpack(), k_max)));
                }
            }
            if let MTreeNode::Leaf(entries) = self.tree.store.read_mut(page)? {
                for (i, bound) in updates {
                    entries[i].bound = bound;
                }
            }
        } else {
            for (md, i) in self.tree.sorted_entries(page, q)? {
                let (child, bound) = match self.tree.store.read(page)? {
                    MTreeNode::Directory(entries) => (entries[i].child, entries[i].bound),
                    MTreeNode::Leaf(_) => continue,
                };
                if bound_admits(md, bound) || md <= threshold(knns_q) {
                    let new_bound = self.pre_insert_node(child, q, knns_q)?;
                    if let MTreeNode::Directory(entries) = self.tree.store.read_mut(page)? {
                        entries[i].bound = new_bound;
                    }
                }
            }
        }
        Ok(self.tree.store.read(page)?.bound(k_max))
    }

    /// All objects that have `q` among their `k` nearest neighbours, closest first.
    pub fn reverse_knn(&self, q: PointIndex, k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        SimIndexError::check_k(k)?;
        let k_max = self.tree.k_max;
        if k > k_max {
            return Err(SimIndexError::KAboveKMax { k, k_max });
        }
        let stats = self.tree.statistics();
        stats.count_reverse_knn_query();
        let candidates = self.tree.reverse_knn_candidates(q, k_max)?;
        if k == k_max {
            stats.count_reverse_knn_outcome(candidates.len() as u64, candidates.len() as u64);
            return Ok(candidates);
        }
        let ids: Vec<PointIndex> = candidates.iter().map(|(_, i)| *i).collect();
        let lists = self.tree.batch_nn(&ids, k)?;
        let result: Vec<(f32, PointIndex)> = candidates
            .iter()
            .filter(|(d, c)| {
                lists
                    .get(c)
                    .map_or(false, |list| list.contains(q) || *d <= list.max_dist())
            })
            .cloned()
            .collect();
        debug!(
            "Reverse {}-NN of {}: {} candidates, {} results",
            k,
            q,
            candidates.len(),
            result.len()
        );
        stats.count_reverse_knn_outcome(candidates.len() as u64, result.len() as u64);
        Ok(result)
    }

    /// Checks the tree structure and that every stored bound is exact.
    pub fn integrity_check(&self) -> SimIndexResult<()> {
        self.tree.check_structure()?;
        self.tree.check_bounds()
    }
}

/// The distance a subtree has to beat to contribute to the new object's neighbours.
fn threshold(knns_q: &KnnHeap) -> f32 {
    if knns_q.k() == 0 {
        f32::NEG_INFINITY
    } else {
        knns_q.max_dist()
    }
}
