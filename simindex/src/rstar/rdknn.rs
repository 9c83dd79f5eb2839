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

//! An R*-tree that answers reverse kNN queries. Every object carries its `k_max`-NN distance
//! and every page the largest of those below it, so a reverse kNN query skips any box that is
//! further from the query than the largest kNN distance inside it.

use super::node::RStarNode;
use super::tree::RStarTree;
use crate::errors::*;
use crate::query_tools::*;
use core_pages::*;
use hashbrown::HashMap;
use log::debug;
use pointcloud::*;
use std::sync::Arc;

/// R*-tree with `k_max`-NN distance bounds on objects and pages.
#[derive(Debug)]
pub struct RdKnnTree<D: PointCloud> {
    pub(crate) tree: RStarTree<D>,
    k_max: usize,
    knn_distances: HashMap<PointIndex, f32>,
    page_bounds: HashMap<PageId, f32>,
}

/// The k-th distance of a kNN list, undefined while there are fewer than `k` neighbours.
fn kth_distance(list: &[(f32, PointIndex)], k: usize) -> f32 {
    if list.len() < k {
        f32::NAN
    } else {
        list[k - 1].0
    }
}

impl<D: PointCloud> RdKnnTree<D> {
    /// An empty tree answering reverse kNN queries up to `k_max`.
    pub fn new(point_cloud: Arc<D>, page_size: usize, k_max: usize) -> SimIndexResult<Self> {
        SimIndexError::check_k(k_max)?;
        Ok(RdKnnTree {
            tree: RStarTree::new(point_cloud, page_size)?,
            k_max,
            knn_distances: HashMap::new(),
            page_bounds: HashMap::new(),
        })
    }

    /// The underlying R*-tree, for kNN and range queries.
    pub fn tree(&self) -> &RStarTree<D> {
        &self.tree
    }

    /// Largest supported `k`
    pub fn k_max(&self) -> usize {
        self.k_max
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

    /// The stored `k_max`-NN distance of an object, `NaN` when it has fewer than `k_max` neighbours.
    pub fn knn_distance(&self, object: PointIndex) -> Option<f32> {
        self.knn_distances.get(&object).cloned()
    }

    /// Inserts one object. Every stored object the new one may become a `k_max` neighbour of gets
    /// its kNN distance recomputed, then the page bounds are aggregated again.
    pub fn insert(&mut self, q: PointIndex) -> SimIndexResult<()> {
        let affected = self.candidates(q, self.k_max)?;
        self.tree.insert(q)?;
        let mut ids: Vec<PointIndex> = affected.into_iter().map(|(_, p)| p).collect();
        ids.push(q);
        self.update_knn_distances(&ids)?;
        self.adjust_page_bounds()
    }

    /// Inserts many objects, the kNN distances are computed once all of them are in the tree.
    pub fn insert_all(&mut self, ids: &[PointIndex]) -> SimIndexResult<()> {
        self.tree.insert_all(ids)?;
        self.update_knn_distances(ids)?;
        self.adjust_page_bounds()?;
        debug!(
            "Bulk loaded {} objects, {} in the tree, height {}",
            ids.len(),
            self.len(),
            self.tree.height()
        );
        Ok(())
    }

    fn update_knn_distances(&mut self, ids: &[PointIndex]) -> SimIndexResult<()> {
        let lists = self.tree.knn_for_indexes(ids, self.k_max)?;
        for (i, list) in ids.iter().zip(lists) {
            self.knn_distances.insert(*i, kth_distance(&list, self.k_max));
        }
        Ok(())
    }

    /// Recomputes the bound of every page bottom up. Splits move objects between pages, so the
    /// bounds are rebuilt from the object distances rather than patched.
    fn adjust_page_bounds(&mut self) -> SimIndexResult<()> {
        let mut bounds = HashMap::with_capacity(self.tree.node_count());
        if let Some(root) = self.tree.root {
            self.aggregate(root, &mut bounds)?;
        }
        self.page_bounds = bounds;
        Ok(())
    }

    fn aggregate(&self, page: PageId, bounds: &mut HashMap<PageId, f32>) -> SimIndexResult<f32> {
        let bound = match self.tree.store.read(page)? {
            RStarNode::Leaf(objects) => objects.iter().fold(0.0, |b, o| {
                nan_max(b, self.knn_distances.get(o).cloned().unwrap_or(f32::NAN))
            }),
            RStarNode::Directory(entries) => {
                let mut bound = 0.0;
                for e in entries {
                    bound = nan_max(bound, self.aggregate(e.child, bounds)?);
                }
                bound
            }
        };
        bounds.insert(page, bound);
        Ok(bound)
    }

    #[inline]
    fn page_bound(&self, page: PageId) -> f32 {
        self.page_bounds.get(&page).cloned().unwrap_or(f32::NAN)
    }

    /// Every object whose stored `k_max`-NN distance admits `q`, closest first.
    fn candidates(&self, q: PointIndex, k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        let cloud = self.tree.point_cloud();
        let point = cloud.point(q)?;
        let metric = cloud.metric();
        let mut result = Vec::new();
        let mut stack: Vec<PageId> = self.tree.root.into_iter().collect();
        while let Some(page) = stack.pop() {
            match self.tree.store.read(page)? {
                RStarNode::Leaf(objects) => {
                    for o in objects {
                        let d = metric.rank_to_dist(self.tree.rank_to(*o, point)?);
                        let bound = self.knn_distances.get(o).cloned().unwrap_or(f32::NAN);
                        if bound_admits(d, bound) {
                            result.push((d, *o));
                        }
                    }
                }
                RStarNode::Directory(entries) => {
                    for e in entries {
                        let md = metric.rank_to_dist(self.tree.min_rank_to(&e.mbr, point));
                        if bound_admits(md, self.page_bound(e.child)) {
                            stack.push(e.child);
                        }
                    }
                }
            }
        }
        result.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        debug!("{} reverse {}-NN candidates for {}", result.len(), k, q);
        Ok(result)
    }

    /// All objects that have `q` among their `k` nearest neighbours, closest first. Ties with the
    /// k-th distance count as neighbours.
    pub fn reverse_knn(&self, q: PointIndex, k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        SimIndexError::check_k(k)?;
        if k > self.k_max {
            return Err(SimIndexError::KAboveKMax {
                k,
                k_max: self.k_max,
            });
        }
        let stats = self.tree.statistics();
        stats.count_reverse_knn_query();
        let candidates = self.candidates(q, k)?;
        if k == self.k_max {
            stats.count_reverse_knn_outcome(candidates.len() as u64, candidates.len() as u64);
            return Ok(candidates);
        }
        let ids: Vec<PointIndex> = candidates.iter().map(|(_, i)| *i).collect();
        let lists = self.tree.knn_for_indexes(&ids, k)?;
        let result: Vec<(f32, PointIndex)> = candidates
            .iter()
            .zip(lists)
            .filter(|((d, _), list)| bound_admits(*d, kth_distance(list, k)))
            .map(|(c, _)| *c)
            .collect();
        stats.count_reverse_knn_outcome(candidates.len() as u64, result.len() as u64);
        Ok(result)
    }

    /// Checks the tree structure, that every stored kNN distance is exact and that every page
    /// bound is the largest kNN distance below it.
    pub fn integrity_check(&self) -> SimIndexResult<()> {
        self.tree.check_structure()?;
        let root = match self.tree.root {
            Some(root) => root,
            None => return Ok(()),
        };
        let ids: Vec<PointIndex> = self.knn_distances.keys().cloned().collect();
        let lists = self.tree.knn_for_indexes(&ids, self.k_max)?;
        for (i, list) in ids.iter().zip(lists) {
            let stored = self.knn_distances.get(i).cloned().unwrap_or(f32::NAN);
            let exact = kth_distance(&list, self.k_max);
            if !(stored == exact || (stored.is_nan() && exact.is_nan())) {
                return Err(SimIndexError::IntegrityViolation {
                    page: root,
                    detail: format!("object {} stores {} instead of {}", i, stored, exact),
                });
            }
        }
        let mut bounds = HashMap::new();
        self.aggregate(root, &mut bounds)?;
        for (page, bound) in bounds {
            let stored = self.page_bound(page);
            if !(stored == bound || (stored.is_nan() && bound.is_nan())) {
                return Err(SimIndexError::IntegrityViolation {
                    page,
                    detail: format!("page bound {} instead of {}", stored, bound),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtree::tests::{brute_knn, random_cloud};

    fn incremental(count: usize, k_max: usize) -> RdKnnTree<DataRam> {
        let mut tree = RdKnnTree::new(random_cloud(count, 2, 8), 128, k_max).unwrap();
        for i in 0..count {
            tree.insert(i).unwrap();
        }
        tree
    }

    fn brute_reverse_knn(cloud: &DataRam, q: PointIndex, k: usize) -> Vec<PointIndex> {
        (0..cloud.len())
            .filter(|p| {
                let list = brute_knn(cloud, cloud.point(*p).unwrap(), k);
                cloud.distance(*p, q).unwrap() <= list[list.len() - 1].0
            })
            .collect()
    }

    fn sorted_ids(list: &[(f32, PointIndex)]) -> Vec<PointIndex> {
        let mut ids: Vec<PointIndex> = list.iter().map(|(_, i)| *i).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn incremental_distances_stay_exact() {
        let tree = incremental(220, 4);
        assert!(tree.tree().height() > 1);
        tree.integrity_check().unwrap();
    }

    #[test]
    fn bulk_distances_are_exact() {
        let mut tree = RdKnnTree::new(random_cloud(300, 3, 2), 128, 5).unwrap();
        let ids: Vec<PointIndex> = (0..300).collect();
        tree.insert_all(&ids).unwrap();
        tree.integrity_check().unwrap();
        assert_eq!(tree.len(), 300);
    }

    #[test]
    fn too_few_objects_leave_distances_undefined() {
        let tree = incremental(3, 5);
        tree.integrity_check().unwrap();
        assert!(tree.knn_distance(0).unwrap().is_nan());
        assert_eq!(tree.reverse_knn(1, 5).unwrap().len(), 3);
    }

    #[test]
    fn reverse_knn_matches_scan() {
        let tree = incremental(200, 6);
        let cloud = Arc::clone(tree.tree().point_cloud());
        for q in (0..200).step_by(13) {
            for k in [1, 3, 6] {
                let found = sorted_ids(&tree.reverse_knn(q, k).unwrap());
                assert_eq!(found, brute_reverse_knn(&cloud, q, k), "query {} k {}", q, k);
            }
        }
    }

    #[test]
    fn reverse_knn_rejects_bad_k() {
        let tree = incremental(20, 3);
        assert!(matches!(tree.reverse_knn(0, 0), Err(SimIndexError::InvalidK { .. })));
        assert!(matches!(
            tree.reverse_knn(0, 4),
            Err(SimIndexError::KAboveKMax { k: 4, k_max: 3 })
        ));
    }

    #[test]
    fn pruning_saves_candidates() {
        let tree = incremental(400, 3);
        let before = tree.statistics().snapshot();
        tree.reverse_knn(10, 3).unwrap();
        let delta = tree.statistics().snapshot().since(&before);
        assert_eq!(delta.reverse_knn_queries, 1);
        assert!(delta.reverse_knn_candidates < 400);
        assert_eq!(delta.reverse_knn_candidates, delta.reverse_knn_results);
    }
}
