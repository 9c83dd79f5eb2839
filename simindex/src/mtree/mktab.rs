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

//! The MkTab tree: every entry carries a table of kNN distance bounds, one for each `k <= k_max`.
//!
//! Reverse kNN queries are answered exactly from the table for the requested `k`. Keeping a table
//! right under single inserts is not supported, the tree is built with one bulk load.

use super::bounds::KnnDistances;
use super::tree::MTree;
use crate::errors::*;
use core_pages::*;
use pointcloud::*;
use std::sync::Arc;

/// M-tree with a per `k` table of kNN bounds on every entry.
#[derive(Debug)]
pub struct MkTabTree<D: PointCloud> {
    pub(crate) tree: MTree<D, KnnDistances>,
}

impl<D: PointCloud> MkTabTree<D> {
    /// An empty tree answering reverse kNN queries up to `k_max`.
    pub fn new(point_cloud: Arc<D>, page_size: usize, k_max: usize) -> SimIndexResult<Self> {
        SimIndexError::check_k(k_max)?;
        Ok(MkTabTree {
            tree: MTree::new(point_cloud, page_size, k_max)?,
        })
    }

    /// The underlying M-tree, for kNN and range queries.
    pub fn tree(&self) -> &MTree<D, KnnDistances> {
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

    /// If nothing was loaded
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The counters of this tree
    pub fn statistics(&self) -> &IndexStatistics {
        self.tree.statistics()
    }

    /// Always fails, the bound tables can only be built by [`MkTabTree::insert_all`].
    pub fn insert(&mut self, _q: PointIndex) -> SimIndexResult<()> {
        Err(SimIndexError::UnsupportedOperation(
            "single inserts into an MkTab tree",
        ))
    }

    /// Loads every object at once. Only legal on an empty tree.
    pub fn insert_all(&mut self, ids: &[PointIndex]) -> SimIndexResult<()> {
        if !self.tree.is_empty() {
            return Err(SimIndexError::UnsupportedOperation(
                "a second bulk load into an MkTab tree",
            ));
        }
        self.tree.bulk_load(ids)
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
        let result = self.tree.reverse_knn_candidates(q, k)?;
        stats.count_reverse_knn_outcome(result.len() as u64, result.len() as u64);
        Ok(result)
    }

    /// Checks the tree structure and that every stored table is exact.
    pub fn integrity_check(&self) -> SimIndexResult<()> {
        self.tree.check_structure()?;
        self.tree.check_bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tree::tests::*;
    use super::*;

    fn loaded(count: usize, k_max: usize) -> MkTabTree<DataRam> {
        let mut tree = MkTabTree::new(random_cloud(count, 2, 11), 256, k_max).unwrap();
        let ids: Vec<PointIndex> = (0..count).collect();
        tree.insert_all(&ids).unwrap();
        tree
    }

    #[test]
    fn tables_are_exact() {
        let tree = loaded(200, 4);
        tree.integrity_check().unwrap();
    }

    #[test]
    fn reverse_knn_matches_scan_for_every_k() {
        let tree = loaded(150, 5);
        let cloud = Arc::clone(tree.tree().point_cloud());
        for q in (0..150).step_by(23) {
            for k in 1..=5 {
                let found: Vec<PointIndex> = {
                    let mut f: Vec<PointIndex> =
                        tree.reverse_knn(q, k).unwrap().iter().map(|(_, i)| *i).collect();
                    f.sort_unstable();
                    f
                };
                let expected: Vec<PointIndex> = (0..150)
                    .filter(|p| {
                        let list = brute_knn(&cloud, cloud.point(*p).unwrap(), k);
                        cloud.distance(*p, q).unwrap() <= list[k - 1].0
                    })
                    .collect();
                assert_eq!(found, expected, "query {} k {}", q, k);
            }
        }
    }

    #[test]
    fn single_insert_is_unsupported() {
        let mut tree = MkTabTree::new(random_cloud(10, 2, 0), 256, 3).unwrap();
        let err = tree.insert(0).unwrap_err();
        assert!(err.is_unsupported());
        tree.insert_all(&[0, 1, 2]).unwrap();
        assert!(tree.insert_all(&[3]).unwrap_err().is_unsupported());
        assert_eq!(tree.len(), 3);
    }
}
