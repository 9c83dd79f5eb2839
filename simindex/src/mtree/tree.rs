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

//! The M-tree core shared by the plain tree and the kNN bound variants.
//!
//! The tree owns a [`PageStore`] of [`MTreeNode`]s and only ever refers to nodes by [`PageId`].
//! Insertion descends along the entry that covers the new object most closely (or needs the
//! smallest enlargement), splits overflowing nodes on the way back up and recomputes covering radii,
//! parent distances and kNN bounds along the path. The bound variants ([`super::MkMaxTree`],
//! [`super::MkTabTree`]) keep their bounds correct on top of this.

use super::bounds::KnnBound;
use super::node::*;
use super::split::{mlb_dist_split, Assignments};
use crate::errors::*;
use crate::query_tools::*;
use core_pages::*;
use hashbrown::HashMap;
use log::{debug, trace};
use pbr::ProgressBar;
use pointcloud::*;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// The node kinds, for capacity errors.
const LEAF_KIND: &str = "M-tree leaf";
const DIRECTORY_KIND: &str = "M-tree directory";

/// A paged M-tree over the objects of a point cloud, carrying bounds of shape `B` on every entry.
#[derive(Debug)]
pub struct MTree<D: PointCloud, B: KnnBound = ()> {
    pub(crate) point_cloud: Arc<D>,
    pub(crate) store: PageStore<MTreeNode<B>>,
    pub(crate) root: Option<PageId>,
    pub(crate) root_bound: B,
    pub(crate) k_max: usize,
    pub(crate) leaf_capacity: usize,
    pub(crate) dir_capacity: usize,
    pub(crate) len: usize,
    pub(crate) height: usize,
    pub(crate) verbosity: u32,
}

/// The root of a tree has no routing object, only a page and a bound.
#[derive(Debug, Clone, Copy)]
pub struct RootEntry<'a, B> {
    /// The page of the root node
    pub page: PageId,
    /// Aggregate bound of the whole tree
    pub bound: &'a B,
}

impl<D: PointCloud, B: KnnBound> MTree<D, B> {
    /// An empty tree. The capacities follow from the page size and the entry layout, `k_max` is
    /// the largest k the bounds are kept for.
    pub fn new(point_cloud: Arc<D>, page_size: usize, k_max: usize) -> SimIndexResult<Self> {
        let layout = PageLayout::new(page_size);
        let bound_size = B::byte_size(k_max);
        let leaf_capacity = layout.capacity(LEAF_KIND, ID_SIZE + DISTANCE_SIZE + bound_size)?;
        let dir_capacity =
            layout.capacity(DIRECTORY_KIND, 2 * ID_SIZE + 2 * DISTANCE_SIZE + bound_size)?;
        debug!(
            "M-tree with page size {}: leaf capacity {}, directory capacity {}",
            page_size, leaf_capacity, dir_capacity
        );
        Ok(MTree {
            point_cloud,
            store: PageStore::new(page_size),
            root: None,
            root_bound: B::empty(k_max),
            k_max,
            leaf_capacity,
            dir_capacity,
            len: 0,
            height: 0,
            verbosity: 0,
        })
    }

    /// Above 1 bulk loads print a progress bar.
    pub fn set_verbosity(&mut self, verbosity: u32) {
        self.verbosity = verbosity;
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

    /// The k the bounds are maintained for
    pub fn k_max(&self) -> usize {
        self.k_max
    }

    /// The root page and its bound, `None` before the first insert.
    pub fn root(&self) -> Option<RootEntry<'_, B>> {
        self.root.map(|page| RootEntry {
            page,
            bound: &self.root_bound,
        })
    }

    /// Reads a node through the page store.
    pub fn node(&self, page: PageId) -> SimIndexResult<&MTreeNode<B>> {
        Ok(self.store.read(page)?)
    }

    /// The counters of this tree
    pub fn statistics(&self) -> &IndexStatistics {
        self.store.statistics()
    }

    #[inline]
    pub(crate) fn distance(&self, i: PointIndex, j: PointIndex) -> SimIndexResult<f32> {
        self.store.statistics().count_distances(1);
        Ok(self.point_cloud.distance(i, j)?)
    }

    #[inline]
    pub(crate) fn distance_to_point(&self, i: PointIndex, point: &[f32]) -> SimIndexResult<f32> {
        self.store.statistics().count_distances(1);
        Ok(self.point_cloud.distance_to_point(i, point)?)
    }

    fn capacity_of(&self, node: &MTreeNode<B>) -> usize {
        if node.is_leaf() {
            self.leaf_capacity
        } else {
            self.dir_capacity
        }
    }

    /// Every indexed object, in leaf order.
    pub fn objects(&self) -> SimIndexResult<Vec<PointIndex>> {
        let mut objects = Vec::with_capacity(self.len);
        let mut stack: Vec<PageId> = self.root.into_iter().collect();
        while let Some(page) = stack.pop() {
            match self.store.read(page)? {
                MTreeNode::Leaf(entries) => objects.extend(entries.iter().map(|e| e.object)),
                MTreeNode::Directory(entries) => stack.extend(entries.iter().map(|e| e.child)),
            }
        }
        Ok(objects)
    }

    /// Physically inserts an object with the given bound. Bound maintenance for the other objects
    /// is up to the caller.
    pub(crate) fn insert_entry(&mut self, object: PointIndex, bound: B) -> SimIndexResult<()> {
        let root = match self.root {
            Some(root) => root,
            None => {
                let root = self.store.allocate(MTreeNode::Leaf(Vec::new()));
                self.root = Some(root);
                self.height = 1;
                root
            }
        };
        let cloud = Arc::clone(&self.point_cloud);
        let point = cloud.point(object)?;

        // choose the path, remembering the entry taken in every directory
        let mut path: Vec<(PageId, usize)> = Vec::with_capacity(self.height);
        let mut current = root;
        let mut parent_distance = f32::NAN;
        loop {
            let (choice, dist, enlarge) = match self.store.read(current)? {
                MTreeNode::Leaf(_) => break,
                MTreeNode::Directory(entries) => {
                    let mut best_inside: Option<(usize, f32)> = None;
                    let mut best_enlargement: Option<(usize, f32, f32)> = None;
                    for (i, e) in entries.iter().enumerate() {
                        let d = self.distance_to_point(e.routing_object, point)?;
                        if d <= e.covering_radius {
                            if best_inside.map_or(true, |(_, bd)| d < bd) {
                                best_inside = Some((i, d));
                            }
                        } else {
                            let enlargement = d - e.covering_radius;
                            if best_enlargement.map_or(true, |(_, be, _)| enlargement < be) {
                                best_enlargement = Some((i, enlargement, d));
                            }
                        }
                    }
                    match (best_inside, best_enlargement) {
                        (Some((i, d)), _) => (i, d, false),
                        (None, Some((i, _, d))) => (i, d, true),
                        (None, None) => {
                            return Err(SimIndexError::IntegrityViolation {
                                page: current,
                                detail: "empty directory node".to_string(),
                            })
                        }
                    }
                }
            };
            let next = match self.store.read_mut(current)? {
                MTreeNode::Directory(entries) => {
                    if enlarge {
                        entries[choice].covering_radius = dist;
                    }
                    entries[choice].child
                }
                MTreeNode::Leaf(_) => break,
            };
            path.push((current, choice));
            parent_distance = dist;
            current = next;
        }

        if let MTreeNode::Leaf(entries) = self.store.read_mut(current)? {
            entries.push(LeafEntry {
                object,
                parent_distance,
                bound,
            });
        }
        self.len += 1;
        self.adjust_tree(path, current)
    }

    /// Inserts many objects with undefined bounds, then computes the exact bounds of every stored
    /// object with one shared kNN traversal.
    pub(crate) fn bulk_load(&mut self, ids: &[PointIndex]) -> SimIndexResult<()> {
        let mut pb = ProgressBar::new(ids.len() as u64);
        if self.verbosity > 1 {
            pb.format("╢▌▌░╟");
        }
        for i in ids {
            self.insert_entry(*i, B::undefined(self.k_max))?;
            if self.verbosity > 1 {
                pb.inc();
            }
        }
        if self.verbosity > 1 {
            pb.finish_print("Computing kNN distances");
        }
        let objects = self.objects()?;
        let lists = self.batch_nn(&objects, self.k_max)?;
        self.knn_distance_adjustment(&lists)?;
        debug!(
            "Bulk loaded {} objects, {} stored in {} nodes of height {}",
            ids.len(),
            self.len,
            self.store.len(),
            self.height
        );
        Ok(())
    }

    /// Walks back up the insertion path, splitting overflowing nodes and refreshing the entry
    /// that represents each node in its parent.
    fn adjust_tree(&mut self, mut path: Vec<(PageId, usize)>, mut page: PageId) -> SimIndexResult<()> {
        loop {
            let overflow = {
                let node = self.store.read(page)?;
                node.len() > self.capacity_of(node)
            };
            match path.pop() {
                None => {
                    if overflow {
                        self.split_root(page)?;
                    } else {
                        self.root_bound = self.store.read(page)?.bound(self.k_max);
                    }
                    return Ok(());
                }
                Some((parent, index)) => {
                    // routing object of the parent itself, to measure the parent distance of new entries
                    let grand_routing = match path.last() {
                        Some((grand, grand_index)) => match self.store.read(*grand)? {
                            MTreeNode::Directory(entries) => Some(entries[*grand_index].routing_object),
                            MTreeNode::Leaf(_) => None,
                        },
                        None => None,
                    };
                    if overflow {
                        let (first, second) = self.split_node(page)?;
                        let first_pd = match grand_routing {
                            Some(r) => self.distance(first.routing_object, r)?,
                            None => f32::NAN,
                        };
                        let second_pd = match grand_routing {
                            Some(r) => self.distance(second.routing_object, r)?,
                            None => f32::NAN,
                        };
                        if let MTreeNode::Directory(entries) = self.store.read_mut(parent)? {
                            entries[index] = RoutingEntry {
                                parent_distance: first_pd,
                                ..first
                            };
                            entries.push(RoutingEntry {
                                parent_distance: second_pd,
                                ..second
                            });
                        }
                    } else {
                        let (radius, bound) = {
                            let node = self.store.read(page)?;
                            (node.covering_radius(), node.bound(self.k_max))
                        };
                        if let MTreeNode::Directory(entries) = self.store.read_mut(parent)? {
                            entries[index].covering_radius = radius;
                            entries[index].bound = bound;
                        }
                    }
                    page = parent;
                }
            }
        }
    }

    /// Splits the node at `page` in two. The first half stays on `page`, the second goes to a new
    /// page. Returns the entries that should represent them, parent distances unset.
    fn split_node(&mut self, page: PageId) -> SimIndexResult<(RoutingEntry<B>, RoutingEntry<B>)> {
        let node = self.store.write(page, MTreeNode::Leaf(Vec::new()))?;
        let cloud = Arc::clone(&self.point_cloud);
        let stats = self.store.statistics();
        let mut dist = |a: PointIndex, b: PointIndex| -> SimIndexResult<f32> {
            stats.count_distances(1);
            Ok(cloud.distance(a, b)?)
        };
        let ((first_routing, first_radius, first), (second_routing, second_radius, second)) =
            match node {
                MTreeNode::Leaf(entries) => {
                    halves(mlb_dist_split(entries, &mut dist)?, MTreeNode::Leaf)
                }
                MTreeNode::Directory(entries) => {
                    halves(mlb_dist_split(entries, &mut dist)?, MTreeNode::Directory)
                }
            };
        trace!(
            "Split {} into {} and {} entries",
            page,
            first.len(),
            second.len()
        );
        let first_bound = first.bound(self.k_max);
        let second_bound = second.bound(self.k_max);
        self.store.write(page, first)?;
        let second_page = self.store.allocate(second);
        Ok((
            RoutingEntry {
                routing_object: first_routing,
                parent_distance: f32::NAN,
                covering_radius: first_radius,
                child: page,
                bound: first_bound,
            },
            RoutingEntry {
                routing_object: second_routing,
                parent_distance: f32::NAN,
                covering_radius: second_radius,
                child: second_page,
                bound: second_bound,
            },
        ))
    }

    /// Splits the root and grows the tree by one level.
    fn split_root(&mut self, page: PageId) -> SimIndexResult<()> {
        let (first, second) = self.split_node(page)?;
        let new_root = MTreeNode::Directory(vec![first, second]);
        self.root_bound = new_root.bound(self.k_max);
        self.root = Some(self.store.allocate(new_root));
        self.height += 1;
        debug!("Root split, the tree now has height {}", self.height);
        Ok(())
    }

    /// Best first kNN around an arbitrary point. Returns the heap so callers can merge into it.
    pub(crate) fn knn_heap(&self, point: &[f32], k: usize) -> SimIndexResult<KnnHeap> {
        let mut heap = KnnHeap::new(k);
        let root = match self.root {
            Some(root) => root,
            None => return Ok(heap),
        };
        let mut queue: BinaryHeap<QueryCandidate> = BinaryHeap::new();
        queue.push(QueryCandidate::new(root, 0.0, f32::NAN));
        while let Some(candidate) = queue.pop() {
            if candidate.min_dist > heap.max_dist() {
                break;
            }
            let dq = candidate.dist_to_routing;
            match self.store.read(candidate.page)? {
                MTreeNode::Leaf(entries) => {
                    for e in entries {
                        if (dq - e.parent_distance).abs() > heap.max_dist() {
                            continue;
                        }
                        let d = self.distance_to_point(e.object, point)?;
                        heap.push(e.object, d);
                    }
                }
                MTreeNode::Directory(entries) => {
                    for e in entries {
                        if (dq - e.parent_distance).abs() - e.covering_radius > heap.max_dist() {
                            continue;
                        }
                        let d = self.distance_to_point(e.routing_object, point)?;
                        let md = min_dist(d, e.covering_radius);
                        if md <= heap.max_dist() {
                            queue.push(QueryCandidate::new(e.child, md, d));
                        }
                    }
                }
            }
        }
        Ok(heap)
    }

    /// The `k` nearest indexed objects to `point`, closest first.
    pub fn knn(&self, point: &[f32], k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        SimIndexError::check_k(k)?;
        self.store.statistics().count_knn_query();
        Ok(self.knn_heap(point, k)?.unpack())
    }

    /// The `k` nearest neighbors of a stored object, the object itself included.
    pub fn knn_by_index(&self, index: PointIndex, k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        let point = self.point_cloud.point(index)?;
        self.knn(point, k)
    }

    /// Every indexed object within `radius` of `point`, closest first.
    pub fn range(&self, point: &[f32], radius: f32) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        self.store.statistics().count_range_query();
        let mut result = Vec::new();
        let mut stack: Vec<(PageId, f32)> = self.root.map(|r| (r, f32::NAN)).into_iter().collect();
        while let Some((page, dq)) = stack.pop() {
            match self.store.read(page)? {
                MTreeNode::Leaf(entries) => {
                    for e in entries {
                        if (dq - e.parent_distance).abs() > radius {
                            continue;
                        }
                        let d = self.distance_to_point(e.object, point)?;
                        if d <= radius {
                            result.push((d, e.object));
                        }
                    }
                }
                MTreeNode::Directory(entries) => {
                    for e in entries {
                        if (dq - e.parent_distance).abs() - e.covering_radius > radius {
                            continue;
                        }
                        let d = self.distance_to_point(e.routing_object, point)?;
                        if min_dist(d, e.covering_radius) <= radius {
                            stack.push((e.child, d));
                        }
                    }
                }
            }
        }
        result.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(result)
    }

    /// The entries of a directory node ordered by their smallest possible distance to a stored object,
    /// as `(min_dist, entry index)`.
    pub(crate) fn sorted_entries(
        &self,
        page: PageId,
        q: PointIndex,
    ) -> SimIndexResult<Vec<(f32, usize)>> {
        let mut sorted = Vec::new();
        if let MTreeNode::Directory(entries) = self.store.read(page)? {
            for (i, e) in entries.iter().enumerate() {
                let d = self.distance(e.routing_object, q)?;
                sorted.push((min_dist(d, e.covering_radius), i));
            }
        }
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(sorted)
    }

    /// One shared traversal computing the `k` nearest neighbors of every stored object in `ids`.
    /// Children are visited by the smallest `min_dist` to any of the objects and skipped once
    /// no object's current k-th distance can be beaten there.
    pub fn batch_nn(
        &self,
        ids: &[PointIndex],
        k: usize,
    ) -> SimIndexResult<HashMap<PointIndex, KnnHeap>> {
        SimIndexError::check_k(k)?;
        let mut lists: HashMap<PointIndex, KnnHeap> =
            ids.iter().map(|i| (*i, KnnHeap::new(k))).collect();
        let mut queries: Vec<PointIndex> = lists.keys().cloned().collect();
        queries.sort_unstable();
        if let Some(root) = self.root {
            self.batch_nn_node(root, &queries, &mut lists)?;
        }
        Ok(lists)
    }

    fn batch_nn_node(
        &self,
        page: PageId,
        ids: &[PointIndex],
        lists: &mut HashMap<PointIndex, KnnHeap>,
    ) -> SimIndexResult<()> {
        match self.store.read(page)? {
            MTreeNode::Leaf(entries) => {
                for e in entries {
                    for q in ids {
                        let d = self.distance(e.object, *q)?;
                        if let Some(list) = lists.get_mut(q) {
                            list.push(e.object, d);
                        }
                    }
                }
            }
            MTreeNode::Directory(entries) => {
                let mut sorted = Vec::with_capacity(entries.len());
                for e in entries {
                    let mut smallest = f32::INFINITY;
                    for q in ids {
                        let d = self.distance(e.routing_object, *q)?;
                        smallest = smallest.min(min_dist(d, e.covering_radius));
                    }
                    sorted.push((smallest, e.child));
                }
                sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
                for (smallest, child) in sorted {
                    let active = ids
                        .iter()
                        .any(|q| lists.get(q).map_or(false, |l| smallest <= l.max_dist()));
                    if active {
                        self.batch_nn_node(child, ids, lists)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Rewrites every bound from exact kNN lists (the object itself included) and aggregates them
    /// bottom up. Objects without a list get an undefined bound.
    pub(crate) fn knn_distance_adjustment(
        &mut self,
        lists: &HashMap<PointIndex, KnnHeap>,
    ) -> SimIndexResult<()> {
        if let Some(root) = self.root {
            self.root_bound = self.adjust_node_bounds(root, lists)?;
        }
        Ok(())
    }

    fn adjust_node_bounds(
        &mut self,
        page: PageId,
        lists: &HashMap<PointIndex, KnnHeap>,
    ) -> SimIndexResult<B> {
        let k_max = self.k_max;
        let children: Vec<(usize, PageId)> = match self.store.read_mut(page)? {
            MTreeNode::Leaf(entries) => {
                for e in entries.iter_mut() {
                    e.bound = match lists.get(&e.object) {
                        Some(list) => B::from_knn_list(&list.to_sorted_vec(), k_max),
                        None => B::undefined(k_max),
                    };
                }
                Vec::new()
            }
            MTreeNode::Directory(entries) => {
                entries.iter().enumerate().map(|(i, e)| (i, e.child)).collect()
            }
        };
        for (i, child) in children {
            let bound = self.adjust_node_bounds(child, lists)?;
            if let MTreeNode::Directory(entries) = self.store.read_mut(page)? {
                entries[i].bound = bound;
            }
        }
        Ok(self.store.read(page)?.bound(k_max))
    }

    /// Reverse kNN candidates: branch and bound on the bounds for `k`. A child is entered if its
    /// `min_dist` is within the bound of the node it sits in, an object is kept if the query is
    /// within its own bound.
    pub(crate) fn reverse_knn_candidates(
        &self,
        q: PointIndex,
        k: usize,
    ) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        let mut result = Vec::new();
        let mut stack: Vec<(PageId, f32)> =
            self.root.map(|r| (r, f32::INFINITY)).into_iter().collect();
        while let Some((page, node_bound)) = stack.pop() {
            match self.store.read(page)? {
                MTreeNode::Leaf(entries) => {
                    for e in entries {
                        let d = self.distance(e.object, q)?;
                        if bound_admits(d, e.bound.at(k)) {
                            result.push((d, e.object));
                        }
                    }
                }
                MTreeNode::Directory(entries) => {
                    for e in entries {
                        let d = self.distance(e.routing_object, q)?;
                        if bound_admits(min_dist(d, e.covering_radius), node_bound) {
                            stack.push((e.child, e.bound.at(k)));
                        }
                    }
                }
            }
        }
        result.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(result)
    }

    /// Checks the structure: covering radii contain every descendant, stored parent distances are
    /// right, nodes are filled between half and full capacity below the root and every leaf is on
    /// the same level.
    pub fn check_structure(&self) -> SimIndexResult<()> {
        let root = match self.root {
            Some(root) => root,
            None => return Ok(()),
        };
        let mut leaf_depth = None;
        self.check_node(root, None, 1, &mut leaf_depth)?;
        if leaf_depth != Some(self.height) {
            return Err(SimIndexError::IntegrityViolation {
                page: root,
                detail: format!("leaves at depth {:?}, height is {}", leaf_depth, self.height),
            });
        }
        Ok(())
    }

    /// Returns the objects below `page`.
    fn check_node(
        &self,
        page: PageId,
        routing: Option<(PointIndex, f32)>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) -> SimIndexResult<Vec<PointIndex>> {
        let node = self.store.read(page)?;
        let violation = |detail: String| SimIndexError::IntegrityViolation { page, detail };
        if routing.is_some() {
            let capacity = self.capacity_of(node);
            if node.len() > capacity || node.len() < PageLayout::min_fill(capacity) {
                return Err(violation(format!(
                    "{} entries with capacity {}",
                    node.len(),
                    capacity
                )));
            }
        }
        if let Some((routing_object, _)) = routing {
            for (o, e_pd) in node.routing_objects().iter().zip(parent_distances(node)) {
                let d = self.point_cloud.distance(routing_object, *o)?;
                if !close(d, e_pd) {
                    return Err(violation(format!(
                        "parent distance of {} is {} but should be {}",
                        o, e_pd, d
                    )));
                }
            }
        }
        let objects = match node {
            MTreeNode::Leaf(entries) => {
                match *leaf_depth {
                    Some(ld) if ld != depth => {
                        return Err(violation(format!("leaf at depth {} and {}", depth, ld)))
                    }
                    Some(_) => {}
                    None => *leaf_depth = Some(depth),
                }
                entries.iter().map(|e| e.object).collect()
            }
            MTreeNode::Directory(entries) => {
                let mut objects = Vec::new();
                for e in entries {
                    let below = self.check_node(
                        e.child,
                        Some((e.routing_object, e.covering_radius)),
                        depth + 1,
                        leaf_depth,
                    )?;
                    objects.extend(below);
                }
                objects
            }
        };
        if let Some((routing_object, radius)) = routing {
            for o in objects.iter() {
                let d = self.point_cloud.distance(routing_object, *o)?;
                if d > radius && !close(d, radius) {
                    return Err(violation(format!(
                        "object {} is {} from the routing object, radius {}",
                        o, d, radius
                    )));
                }
            }
        }
        Ok(objects)
    }

    /// Checks that every bound equals the aggregate of the node below it, and that every object's
    /// bound equals its exact `k_max` nearest neighbor distance.
    pub(crate) fn check_bounds(&self) -> SimIndexResult<()> {
        let root = match self.root {
            Some(root) => root,
            None => return Ok(()),
        };
        let actual = self.check_node_bounds(root)?;
        if !actual.same_as(&self.root_bound) {
            return Err(SimIndexError::IntegrityViolation {
                page: root,
                detail: format!(
                    "root bound is {:?} but the root aggregates to {:?}",
                    self.root_bound, actual
                ),
            });
        }
        Ok(())
    }

    fn check_node_bounds(&self, page: PageId) -> SimIndexResult<B> {
        let node = self.store.read(page)?;
        match node {
            MTreeNode::Leaf(entries) => {
                for e in entries {
                    let point = self.point_cloud.point(e.object)?;
                    let exact = B::from_knn_list(&self.knn_heap(point, self.k_max)?.unpack(), self.k_max);
                    if !exact.same_as(&e.bound) {
                        return Err(SimIndexError::IntegrityViolation {
                            page,
                            detail: format!(
                                "object {} has bound {:?} but its kNN distances are {:?}",
                                e.object, e.bound, exact
                            ),
                        });
                    }
                }
            }
            MTreeNode::Directory(entries) => {
                for e in entries {
                    let actual = self.check_node_bounds(e.child)?;
                    if !actual.same_as(&e.bound) {
                        return Err(SimIndexError::IntegrityViolation {
                            page,
                            detail: format!(
                                "entry of {} has bound {:?} but the node aggregates to {:?}",
                                e.child, e.bound, actual
                            ),
                        });
                    }
                }
            }
        }
        Ok(node.bound(self.k_max))
    }
}

impl<D: PointCloud> MTree<D, ()> {
    /// Inserts one object.
    pub fn insert(&mut self, object: PointIndex) -> SimIndexResult<()> {
        self.insert_entry(object, ())
    }

    /// Inserts objects one after the other.
    pub fn insert_all(&mut self, ids: &[PointIndex]) -> SimIndexResult<()> {
        ids.iter().try_for_each(|i| self.insert_entry(*i, ()))
    }
}

type Half<B> = (PointIndex, f32, MTreeNode<B>);

fn halves<E, B>(
    assignments: Assignments<E>,
    wrap: fn(Vec<E>) -> MTreeNode<B>,
) -> (Half<B>, Half<B>) {
    (
        (
            assignments.first_routing_object,
            assignments.first_covering_radius,
            wrap(assignments.first),
        ),
        (
            assignments.second_routing_object,
            assignments.second_covering_radius,
            wrap(assignments.second),
        ),
    )
}

fn parent_distances<B: KnnBound>(node: &MTreeNode<B>) -> Vec<f32> {
    match node {
        MTreeNode::Leaf(entries) => entries.iter().map(|e| e.parent_distance).collect(),
        MTreeNode::Directory(entries) => entries.iter().map(|e| e.parent_distance).collect(),
    }
}

#[inline]
fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-5 * (1.0 + a.abs().max(b.abs()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    pub(crate) fn random_cloud(count: usize, dim: usize, seed: u64) -> Arc<DataRam> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let data: Vec<f32> = (0..count * dim).map(|_| rng.gen::<f32>()).collect();
        Arc::new(DataRam::new(data, dim).unwrap())
    }

    pub(crate) fn brute_knn(cloud: &DataRam, point: &[f32], k: usize) -> Vec<(f32, PointIndex)> {
        let mut all: Vec<(f32, PointIndex)> = (0..cloud.len())
            .map(|i| (cloud.distance_to_point(i, point).unwrap(), i))
            .collect();
        all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        all.truncate(k);
        all
    }

    fn build_plain(count: usize, dim: usize) -> MTree<DataRam, ()> {
        let cloud = random_cloud(count, dim, 0);
        let mut tree = MTree::new(cloud, 128, 1).unwrap();
        for i in 0..count {
            tree.insert_entry(i, ()).unwrap();
        }
        tree
    }

    #[test]
    fn capacities_from_page_size() {
        let tree: MTree<DataRam, f32> = MTree::new(random_cloud(1, 2, 0), 1024, 10).unwrap();
        assert_eq!(tree.leaf_capacity(), (1024 * 8 - 97) / (12 * 8));
        assert_eq!(tree.dir_capacity(), (1024 * 8 - 97) / (20 * 8));
        assert!(MTree::<DataRam, f32>::new(random_cloud(1, 2, 0), 16, 10).is_err());
    }

    #[test]
    fn insertion_keeps_structure() {
        let tree = build_plain(500, 3);
        println!(
            "height {} with {} nodes, leaf capacity {}",
            tree.height(),
            tree.node_count(),
            tree.leaf_capacity()
        );
        assert_eq!(tree.len(), 500);
        assert!(tree.height() > 1);
        tree.check_structure().unwrap();
        let mut objects = tree.objects().unwrap();
        objects.sort_unstable();
        assert_eq!(objects, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn knn_matches_scan() {
        let tree = build_plain(400, 4);
        let cloud = random_cloud(20, 4, 7);
        for q in 0..20 {
            let point = cloud.point(q).unwrap();
            let found = tree.knn(point, 7).unwrap();
            let expected = brute_knn(tree.point_cloud(), point, 7);
            assert_eq!(found.len(), 7);
            for (f, e) in found.iter().zip(&expected) {
                assert_approx_eq!(f.0, e.0);
            }
        }
    }

    #[test]
    fn range_matches_scan() {
        let tree = build_plain(400, 2);
        let point = [0.5, 0.5];
        let found = tree.range(&point, 0.2).unwrap();
        let expected: Vec<PointIndex> = (0..400)
            .filter(|i| tree.point_cloud().distance_to_point(*i, &point).unwrap() <= 0.2)
            .collect();
        let mut found_ids: Vec<PointIndex> = found.iter().map(|(_, i)| *i).collect();
        found_ids.sort_unstable();
        assert_eq!(found_ids, expected);
        assert!(found.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn batch_nn_matches_single_queries() {
        let tree = build_plain(300, 3);
        let ids: Vec<PointIndex> = (0..300).step_by(13).collect();
        let lists = tree.batch_nn(&ids, 5).unwrap();
        assert_eq!(lists.len(), ids.len());
        for i in ids {
            let single = tree.knn_by_index(i, 5).unwrap();
            let batched = lists[&i].to_sorted_vec();
            assert_eq!(batched[0], (0.0, i));
            for (s, b) in single.iter().zip(&batched) {
                assert_approx_eq!(s.0, b.0);
            }
        }
    }

    #[test]
    fn queries_are_counted() {
        let tree = build_plain(100, 2);
        let before = tree.statistics().snapshot();
        tree.knn(&[0.1, 0.1], 3).unwrap();
        let after = tree.statistics().snapshot().since(&before);
        assert_eq!(after.knn_queries, 1);
        assert!(after.distance_calcs > 0);
        assert!(after.page_reads > 0);
    }

    #[test]
    fn empty_tree_answers_nothing() {
        let tree: MTree<DataRam, ()> = MTree::new(random_cloud(3, 2, 0), 128, 1).unwrap();
        assert!(tree.knn(&[0.0, 0.0], 2).unwrap().is_empty());
        assert!(tree.range(&[0.0, 0.0], 10.0).unwrap().is_empty());
        tree.check_structure().unwrap();
        assert!(tree.knn(&[0.0, 0.0], 0).unwrap_err().is_usage_error());
    }
}
