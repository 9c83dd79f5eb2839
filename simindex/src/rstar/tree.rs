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

//! A paged R*-tree over a vector point cloud.
//!
//! Queries run in the metric's rank space (squared distances for L2) and convert every result
//! back to a distance once.

use super::mbr::HyperBoundingBox;
use super::node::{RStarNode, SpatialEntry};
use super::split::topological_split;
use crate::errors::*;
use crate::query_tools::*;
use core_pages::*;
use hashbrown::HashMap;
use log::{debug, trace};
use pointcloud::*;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Bytes per stored coordinate
const COORDINATE_SIZE: usize = 4;

/// R*-tree over the objects of a point cloud.
#[derive(Debug)]
pub struct RStarTree<D: PointCloud> {
    pub(crate) point_cloud: Arc<D>,
    pub(crate) store: PageStore<RStarNode>,
    pub(crate) root: Option<PageId>,
    leaf_capacity: usize,
    dir_capacity: usize,
    len: usize,
    height: usize,
}

impl<D: PointCloud> RStarTree<D> {
    /// An empty tree, capacities follow from the page size and the dimension of the cloud.
    pub fn new(point_cloud: Arc<D>, page_size: usize) -> SimIndexResult<Self> {
        let layout = PageLayout::new(page_size);
        let dim = point_cloud.dim();
        let leaf_capacity = layout.capacity("R*-tree leaf", ID_SIZE + dim * COORDINATE_SIZE)?;
        let dir_capacity =
            layout.capacity("R*-tree directory", ID_SIZE + 2 * dim * COORDINATE_SIZE)?;
        debug!(
            "R*-tree with page size {}: leaf capacity {}, directory capacity {}",
            page_size, leaf_capacity, dir_capacity
        );
        Ok(RStarTree {
            point_cloud,
            store: PageStore::new(page_size),
            root: None,
            leaf_capacity,
            dir_capacity,
            len: 0,
            height: 0,
        })
    }

    /// The underlying point cloud
    pub fn point_cloud(&self) -> &Arc<D> {
        &self.point_cloud
    }

    /// Number of indexed objects
    pub fn len(&self) -> usize {
        self.len
    }

    /// If nothing was inserted
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels, 0 for an empty tree
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of allocated nodes
    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    /// Maximum number of entries in a leaf
    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    /// Maximum number of entries in a directory node
    pub fn dir_capacity(&self) -> usize {
        self.dir_capacity
    }

    /// The counters of this tree
    pub fn statistics(&self) -> &IndexStatistics {
        self.store.statistics()
    }

    /// Reads a node through the page store.
    pub fn node(&self, page: PageId) -> SimIndexResult<&RStarNode> {
        Ok(self.store.read(page)?)
    }

    #[inline]
    pub(crate) fn rank_to(&self, object: PointIndex, point: &[f32]) -> SimIndexResult<f32> {
        self.store.statistics().count_distances(1);
        let metric = self.point_cloud.metric();
        Ok(metric.dist_rank(self.point_cloud.point(object)?, point))
    }

    #[inline]
    pub(crate) fn min_rank_to(&self, mbr: &HyperBoundingBox, point: &[f32]) -> f32 {
        self.point_cloud
            .metric()
            .min_dist_rank_to_rect(&mbr.min, &mbr.max, point)
    }

    fn capacity_of(&self, node: &RStarNode) -> usize {
        if node.is_leaf() {
            self.leaf_capacity
        } else {
            self.dir_capacity
        }
    }

    fn node_mbr(&self, node: &RStarNode) -> SimIndexResult<HyperBoundingBox> {
        let mut mbr: Option<HyperBoundingBox> = None;
        match node {
            RStarNode::Leaf(objects) => {
                for o in objects {
                    let point = self.point_cloud.point(*o)?;
                    match mbr.as_mut() {
                        Some(m) => m.extend_point(point),
                        None => mbr = Some(HyperBoundingBox::from_point(point)),
                    }
                }
            }
            RStarNode::Directory(entries) => {
                for e in entries {
                    match mbr.as_mut() {
                        Some(m) => m.extend(&e.mbr),
                        None => mbr = Some(e.mbr.clone()),
                    }
                }
            }
        }
        mbr.ok_or_else(|| SimIndexError::IntegrityViolation {
            page: PageId::from(0usize),
            detail: "bounding box of an empty node".to_string(),
        })
    }

    /// Inserts one object.
    pub fn insert(&mut self, object: PointIndex) -> SimIndexResult<()> {
        let cloud = Arc::clone(&self.point_cloud);
        let point = cloud.point(object)?;
        let point_box = HyperBoundingBox::from_point(point);
        let root = match self.root {
            Some(root) => root,
            None => {
                let root = self.store.allocate(RStarNode::Leaf(Vec::new()));
                self.root = Some(root);
                self.height = 1;
                root
            }
        };

        let mut path: Vec<(PageId, usize)> = Vec::with_capacity(self.height);
        let mut current = root;
        let mut depth = 1;
        loop {
            let choice = match self.store.read(current)? {
                RStarNode::Leaf(_) => break,
                RStarNode::Directory(entries) => {
                    choose_subtree(entries, &point_box, depth + 1 == self.height)
                }
            };
            let child = match self.store.read(current)? {
                RStarNode::Directory(entries) => entries[choice].child,
                RStarNode::Leaf(_) => break,
            };
            path.push((current, choice));
            current = child;
            depth += 1;
        }
        if let RStarNode::Leaf(objects) = self.store.read_mut(current)? {
            objects.push(object);
        }
        self.len += 1;
        self.adjust_tree(path, current)
    }

    /// Inserts objects one after the other.
    pub fn insert_all(&mut self, ids: &[PointIndex]) -> SimIndexResult<()> {
        ids.iter().try_for_each(|i| self.insert(*i))
    }

    fn adjust_tree(&mut self, mut path: Vec<(PageId, usize)>, mut page: PageId) -> SimIndexResult<()> {
        loop {
            let overflow = {
                let node = self.store.read(page)?;
                node.len() > self.capacity_of(node)
            };
            let split = if overflow {
                Some(self.split_node(page)?)
            } else {
                None
            };
            match path.pop() {
                None => {
                    if let Some((first, second)) = split {
                        let new_root = RStarNode::Directory(vec![first, second]);
                        self.root = Some(self.store.allocate(new_root));
                        self.height += 1;
                        debug!("Root split, the R*-tree now has height {}", self.height);
                    }
                    return Ok(());
                }
                Some((parent, index)) => {
                    let updated = match split {
                        Some((first, second)) => vec![first, second],
                        None => {
                            let mbr = self.node_mbr(self.store.read(page)?)?;
                            vec![SpatialEntry { mbr, child: page }]
                        }
                    };
                    if let RStarNode::Directory(entries) = self.store.read_mut(parent)? {
                        let mut updated = updated.into_iter();
                        if let Some(first) = updated.next() {
                            entries[index] = first;
                        }
                        entries.extend(updated);
                    }
                    page = parent;
                }
            }
        }
    }

    /// Splits the node at `page`, the first half stays there. Returns the entries for both halves.
    fn split_node(&mut self, page: PageId) -> SimIndexResult<(SpatialEntry, SpatialEntry)> {
        let node = self.store.write(page, RStarNode::Leaf(Vec::new()))?;
        let min_fill = PageLayout::min_fill(self.capacity_of(&node));
        let (first, second) = match node {
            RStarNode::Leaf(objects) => {
                let mut boxed = Vec::with_capacity(objects.len());
                for o in objects {
                    boxed.push((HyperBoundingBox::from_point(self.point_cloud.point(o)?), o));
                }
                let (a, b) = topological_split(boxed, min_fill);
                (
                    RStarNode::Leaf(a.into_iter().map(|(_, o)| o).collect()),
                    RStarNode::Leaf(b.into_iter().map(|(_, o)| o).collect()),
                )
            }
            RStarNode::Directory(entries) => {
                let boxed = entries.into_iter().map(|e| (e.mbr.clone(), e)).collect();
                let (a, b) = topological_split(boxed, min_fill);
                (
                    RStarNode::Directory(a.into_iter().map(|(_, e)| e).collect()),
                    RStarNode::Directory(b.into_iter().map(|(_, e)| e).collect()),
                )
            }
        };
        trace!(
            "Split {} into {} and {} entries",
            page,
            first.len(),
            second.len()
        );
        let first_mbr = self.node_mbr(&first)?;
        let second_mbr = self.node_mbr(&second)?;
        self.store.write(page, first)?;
        let second_page = self.store.allocate(second);
        Ok((
            SpatialEntry {
                mbr: first_mbr,
                child: page,
            },
            SpatialEntry {
                mbr: second_mbr,
                child: second_page,
            },
        ))
    }

    /// Best first kNN, closest first. Directory entries whose box contains the query are expanded
    /// right away.
    pub fn knn(&self, point: &[f32], k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        SimIndexError::check_k(k)?;
        self.store.statistics().count_knn_query();
        let mut heap = KnnHeap::new(k);
        let root = match self.root {
            Some(root) => root,
            None => return Ok(Vec::new()),
        };
        let mut queue: BinaryHeap<QueryCandidate> = BinaryHeap::new();
        let mut expand_now = vec![root];
        loop {
            while let Some(page) = expand_now.pop() {
                match self.store.read(page)? {
                    RStarNode::Leaf(objects) => {
                        for o in objects {
                            let rank = self.rank_to(*o, point)?;
                            heap.push(*o, rank);
                        }
                    }
                    RStarNode::Directory(entries) => {
                        for e in entries {
                            let md = self.min_rank_to(&e.mbr, point);
                            if md == 0.0 {
                                expand_now.push(e.child);
                            } else if md <= heap.max_dist() {
                                queue.push(QueryCandidate::new(e.child, md, md));
                            }
                        }
                    }
                }
            }
            match queue.pop() {
                Some(candidate) if candidate.min_dist <= heap.max_dist() => {
                    expand_now.push(candidate.page)
                }
                _ => break,
            }
        }
        let metric = self.point_cloud.metric();
        Ok(heap
            .unpack()
            .into_iter()
            .map(|(rank, i)| (metric.rank_to_dist(rank), i))
            .collect())
    }

    /// Every indexed object within `radius` of `point`, closest first.
    pub fn range(&self, point: &[f32], radius: f32) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        self.store.statistics().count_range_query();
        let metric = self.point_cloud.metric();
        let radius_rank = metric.dist_to_rank(radius);
        let mut result = Vec::new();
        let mut stack: Vec<PageId> = self.root.into_iter().collect();
        while let Some(page) = stack.pop() {
            match self.store.read(page)? {
                RStarNode::Leaf(objects) => {
                    for o in objects {
                        let rank = self.rank_to(*o, point)?;
                        if rank <= radius_rank {
                            result.push((metric.rank_to_dist(rank), *o));
                        }
                    }
                }
                RStarNode::Directory(entries) => {
                    for e in entries {
                        if self.min_rank_to(&e.mbr, point) <= radius_rank {
                            stack.push(e.child);
                        }
                    }
                }
            }
        }
        result.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(result)
    }

    /// The `k` nearest neighbours of every stored object in `ids` from one shared traversal,
    /// one list per id, closest first.
    pub fn knn_for_indexes(
        &self,
        ids: &[PointIndex],
        k: usize,
    ) -> SimIndexResult<Vec<Vec<(f32, PointIndex)>>> {
        SimIndexError::check_k(k)?;
        let mut lists: HashMap<PointIndex, KnnHeap> =
            ids.iter().map(|i| (*i, KnnHeap::new(k))).collect();
        let mut queries: Vec<PointIndex> = lists.keys().cloned().collect();
        queries.sort_unstable();
        let mut points = Vec::with_capacity(queries.len());
        for q in &queries {
            points.push(self.point_cloud.point(*q)?);
        }
        if let Some(root) = self.root {
            self.batch_nn_node(root, &queries, &points, &mut lists)?;
        }
        let metric = self.point_cloud.metric();
        Ok(ids
            .iter()
            .map(|i| {
                lists
                    .get(i)
                    .map(|l| {
                        l.to_sorted_vec()
                            .into_iter()
                            .map(|(rank, j)| (metric.rank_to_dist(rank), j))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect())
    }

    fn batch_nn_node(
        &self,
        page: PageId,
        ids: &[PointIndex],
        points: &[&[f32]],
        lists: &mut HashMap<PointIndex, KnnHeap>,
    ) -> SimIndexResult<()> {
        match self.store.read(page)? {
            RStarNode::Leaf(objects) => {
                for o in objects {
                    for (q, point) in ids.iter().zip(points) {
                        let rank = self.rank_to(*o, point)?;
                        if let Some(list) = lists.get_mut(q) {
                            list.push(*o, rank);
                        }
                    }
                }
            }
            RStarNode::Directory(entries) => {
                let mut sorted: Vec<(f32, PageId, Vec<f32>)> = entries
                    .iter()
                    .map(|e| {
                        let per_query: Vec<f32> =
                            points.iter().map(|p| self.min_rank_to(&e.mbr, p)).collect();
                        let smallest = per_query.iter().cloned().fold(f32::INFINITY, f32::min);
                        (smallest, e.child, per_query)
                    })
                    .collect();
                sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
                for (_, child, per_query) in sorted {
                    let active = ids.iter().zip(&per_query).any(|(q, md)| {
                        lists.get(q).map_or(false, |l| *md <= l.max_dist())
                    });
                    if active {
                        self.batch_nn_node(child, ids, points, lists)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks that every box contains its subtree, the fill of every node below the root and
    /// that all leaves are on the same level.
    pub fn check_structure(&self) -> SimIndexResult<()> {
        let root = match self.root {
            Some(root) => root,
            None => return Ok(()),
        };
        let mut leaf_depth = None;
        let count = self.check_node(root, None, 1, &mut leaf_depth)?;
        if count != self.len || leaf_depth != Some(self.height) {
            return Err(SimIndexError::IntegrityViolation {
                page: root,
                detail: format!(
                    "{} objects at leaf depth {:?}, expected {} at {}",
                    count, leaf_depth, self.len, self.height
                ),
            });
        }
        Ok(())
    }

    fn check_node(
        &self,
        page: PageId,
        mbr: Option<&HyperBoundingBox>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) -> SimIndexResult<usize> {
        let node = self.store.read(page)?;
        let violation = |detail: String| SimIndexError::IntegrityViolation { page, detail };
        if mbr.is_some() {
            let capacity = self.capacity_of(node);
            if node.len() > capacity || node.len() < PageLayout::min_fill(capacity) {
                return Err(violation(format!(
                    "{} entries with capacity {}",
                    node.len(),
                    capacity
                )));
            }
        }
        if let Some(mbr) = mbr {
            if !mbr.contains(&self.node_mbr(node)?) {
                return Err(violation("bounding box does not contain the node".to_string()));
            }
        }
        match node {
            RStarNode::Leaf(objects) => {
                match *leaf_depth {
                    Some(ld) if ld != depth => {
                        return Err(violation(format!("leaf at depth {} and {}", depth, ld)))
                    }
                    Some(_) => {}
                    None => *leaf_depth = Some(depth),
                }
                Ok(objects.len())
            }
            RStarNode::Directory(entries) => {
                let mut count = 0;
                for e in entries {
                    count += self.check_node(e.child, Some(&e.mbr), depth + 1, leaf_depth)?;
                }
                Ok(count)
            }
        }
    }
}

/// The entry to descend into. Boxes that already contain the object win, the smallest of them.
/// Otherwise the least overlap enlargement when the children are leaves, the least area
/// enlargement above that, ties broken by area.
fn choose_subtree(entries: &[SpatialEntry], object: &HyperBoundingBox, children_are_leaves: bool) -> usize {
    let containing = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.mbr.contains(object))
        .min_by(|(_, a), (_, b)| a.mbr.area().total_cmp(&b.mbr.area()));
    if let Some((i, _)) = containing {
        return i;
    }
    let mut best = 0;
    let mut best_key = (f32::INFINITY, f32::INFINITY, f32::INFINITY);
    for (i, e) in entries.iter().enumerate() {
        let enlarged = e.mbr.union(object);
        let area_enlargement = enlarged.area() - e.mbr.area();
        let overlap_enlargement = if children_are_leaves {
            entries
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| enlarged.overlap(&other.mbr) - e.mbr.overlap(&other.mbr))
                .sum()
        } else {
            0.0
        };
        let key = (overlap_enlargement, area_enlargement, e.mbr.area());
        if key < best_key {
            best = i;
            best_key = key;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtree::tests::{brute_knn, random_cloud};

    fn build(count: usize, dim: usize) -> RStarTree<DataRam> {
        let mut tree = RStarTree::new(random_cloud(count, dim, 5), 256).unwrap();
        let ids: Vec<PointIndex> = (0..count).collect();
        tree.insert_all(&ids).unwrap();
        tree
    }

    #[test]
    fn structure_after_inserts() {
        let tree = build(600, 3);
        println!("height {} nodes {}", tree.height(), tree.node_count());
        assert!(tree.height() > 2);
        tree.check_structure().unwrap();
    }

    #[test]
    fn knn_matches_scan() {
        let tree = build(500, 4);
        let queries = random_cloud(25, 4, 99);
        for q in 0..25 {
            let point = queries.point(q).unwrap();
            let found = tree.knn(point, 10).unwrap();
            let expected = brute_knn(tree.point_cloud(), point, 10);
            assert_eq!(found.len(), 10);
            for (f, e) in found.iter().zip(&expected) {
                assert_approx_eq!(f.0, e.0);
            }
        }
    }

    #[test]
    fn range_matches_scan() {
        let tree = build(500, 2);
        let point = [0.3, 0.6];
        let mut found: Vec<PointIndex> = tree
            .range(&point, 0.15)
            .unwrap()
            .iter()
            .map(|(_, i)| *i)
            .collect();
        found.sort_unstable();
        let expected: Vec<PointIndex> = (0..500)
            .filter(|i| tree.point_cloud().distance_to_point(*i, &point).unwrap() <= 0.15)
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn range_keeps_objects_on_the_radius() {
        let rows = vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![3.0, 4.0], vec![6.0, 8.0]];
        let cloud = Arc::new(DataRam::from_rows(&rows, L2::default()).unwrap());
        let mut tree = RStarTree::new(cloud, 256).unwrap();
        tree.insert_all(&[0, 1, 2, 3]).unwrap();
        let found = tree.range(&[0.0, 0.0], 5.0).unwrap();
        assert_eq!(found, vec![(0.0, 0), (5.0, 1), (5.0, 2)]);

        let cube = random_cloud(300, 3, 21);
        let metric = LpNorm::new(3.0).unwrap();
        let data: Vec<f32> = (0..300)
            .flat_map(|i| cube.point(i).unwrap().to_vec())
            .collect();
        let l3 = Arc::new(DataRam::with_metric(data, 3, metric).unwrap());
        let mut tree = RStarTree::new(Arc::clone(&l3), 256).unwrap();
        tree.insert_all(&l3.reference_indexes()).unwrap();
        let point = [0.5, 0.5, 0.5];
        let mut ids: Vec<PointIndex> =
            tree.range(&point, 0.3).unwrap().iter().map(|(_, i)| *i).collect();
        ids.sort_unstable();
        let expected: Vec<PointIndex> = (0..300)
            .filter(|i| l3.distance_to_point(*i, &point).unwrap() <= 0.3)
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn bulk_knn_matches_single() {
        let tree = build(300, 3);
        let ids = vec![4, 17, 17, 250];
        let lists = tree.knn_for_indexes(&ids, 6).unwrap();
        assert_eq!(lists.len(), 4);
        for (i, list) in ids.iter().zip(&lists) {
            let single = tree.knn(tree.point_cloud().point(*i).unwrap(), 6).unwrap();
            assert_eq!(list[0], (0.0, *i));
            for (s, b) in single.iter().zip(list) {
                assert_approx_eq!(s.0, b.0);
            }
        }
    }
}
