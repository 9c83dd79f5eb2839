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

//! The paged node model of the M-tree family.

use super::bounds::KnnBound;
use core_pages::PageId;
use pointcloud::PointIndex;
use serde::{Deserialize, Serialize};

/// An object stored in a leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafEntry<B> {
    /// The stored object, also its routing object
    pub object: PointIndex,
    /// Distance to the routing object of the node's entry in the parent, `NaN` in the root
    pub parent_distance: f32,
    /// kNN distance bound of the object
    pub bound: B,
}

/// A child node referenced from a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingEntry<B> {
    /// The routing object the subtree is centered on
    pub routing_object: PointIndex,
    /// Distance to the routing object of the node's entry in the parent, `NaN` in the root
    pub parent_distance: f32,
    /// Every object of the subtree is within this of the routing object
    pub covering_radius: f32,
    /// The child node
    pub child: PageId,
    /// Aggregate kNN distance bound of the subtree
    pub bound: B,
}

/// What a split needs to know about an entry.
pub(crate) trait MTreeEntry: Clone {
    fn routing_object(&self) -> PointIndex;
    fn covering_radius(&self) -> f32;
    fn set_parent_distance(&mut self, dist: f32);
}

impl<B: Clone> MTreeEntry for LeafEntry<B> {
    #[inline]
    fn routing_object(&self) -> PointIndex {
        self.object
    }
    #[inline]
    fn covering_radius(&self) -> f32 {
        0.0
    }
    #[inline]
    fn set_parent_distance(&mut self, dist: f32) {
        self.parent_distance = dist;
    }
}

impl<B: Clone> MTreeEntry for RoutingEntry<B> {
    #[inline]
    fn routing_object(&self) -> PointIndex {
        self.routing_object
    }
    #[inline]
    fn covering_radius(&self) -> f32 {
        self.covering_radius
    }
    #[inline]
    fn set_parent_distance(&mut self, dist: f32) {
        self.parent_distance = dist;
    }
}

/// A page of the tree: a leaf of objects or a directory of children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MTreeNode<B> {
    /// Holds objects
    Leaf(Vec<LeafEntry<B>>),
    /// Holds children
    Directory(Vec<RoutingEntry<B>>),
}

impl<B: KnnBound> MTreeNode<B> {
    /// If this node holds objects rather than children
    pub fn is_leaf(&self) -> bool {
        matches!(self, MTreeNode::Leaf(_))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        match self {
            MTreeNode::Leaf(entries) => entries.len(),
            MTreeNode::Directory(entries) => entries.len(),
        }
    }

    /// If the node holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The aggregate bound of the node, what the entry representing it should carry.
    pub fn bound(&self, k_max: usize) -> B {
        let mut bound = B::empty(k_max);
        match self {
            MTreeNode::Leaf(entries) => entries.iter().for_each(|e| bound.aggregate(&e.bound)),
            MTreeNode::Directory(entries) => entries.iter().for_each(|e| bound.aggregate(&e.bound)),
        }
        bound
    }

    /// The covering radius this node needs around its routing object, from the parent distances
    /// of the entries.
    pub fn covering_radius(&self) -> f32 {
        match self {
            MTreeNode::Leaf(entries) => entries
                .iter()
                .map(|e| e.parent_distance)
                .fold(0.0, f32::max),
            MTreeNode::Directory(entries) => entries
                .iter()
                .map(|e| e.parent_distance + e.covering_radius)
                .fold(0.0, f32::max),
        }
    }

    /// Sets every entry's parent distance.
    pub(crate) fn set_parent_distances(&mut self, dists: &[f32]) {
        match self {
            MTreeNode::Leaf(entries) => entries
                .iter_mut()
                .zip(dists)
                .for_each(|(e, d)| e.parent_distance = *d),
            MTreeNode::Directory(entries) => entries
                .iter_mut()
                .zip(dists)
                .for_each(|(e, d)| e.parent_distance = *d),
        }
    }

    /// The routing objects of the entries, in order.
    pub fn routing_objects(&self) -> Vec<PointIndex> {
        match self {
            MTreeNode::Leaf(entries) => entries.iter().map(|e| e.object).collect(),
            MTreeNode::Directory(entries) => entries.iter().map(|e| e.routing_object).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(objects: &[(PointIndex, f32, f32)]) -> MTreeNode<f32> {
        MTreeNode::Leaf(
            objects
                .iter()
                .map(|(o, pd, b)| LeafEntry {
                    object: *o,
                    parent_distance: *pd,
                    bound: *b,
                })
                .collect(),
        )
    }

    #[test]
    fn leaf_radius_and_bound() {
        let node = leaf(&[(0, 0.0, 0.4), (1, 0.5, 0.2), (2, 0.3, 0.9)]);
        assert_approx_eq!(node.covering_radius(), 0.5);
        assert_approx_eq!(node.bound(3), 0.9);
        assert!(node.is_leaf());
        assert_eq!(node.routing_objects(), vec![0, 1, 2]);
    }

    #[test]
    fn directory_radius_adds_child_radius() {
        let node: MTreeNode<f32> = MTreeNode::Directory(vec![
            RoutingEntry {
                routing_object: 0,
                parent_distance: 0.0,
                covering_radius: 1.0,
                child: PageId::from(1),
                bound: 0.5,
            },
            RoutingEntry {
                routing_object: 3,
                parent_distance: 2.0,
                covering_radius: 0.5,
                child: PageId::from(2),
                bound: f32::NAN,
            },
        ]);
        assert_approx_eq!(node.covering_radius(), 2.5);
        assert!(node.bound(3).is_nan());
    }

    #[test]
    fn nodes_serialize() {
        let node = leaf(&[(4, 0.25, 0.5)]);
        let text = serde_json::to_string(&node).unwrap();
        let back: MTreeNode<f32> = serde_json::from_str(&text).unwrap();
        assert_eq!(back.routing_objects(), vec![4]);
    }
}
