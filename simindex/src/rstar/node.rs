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

//! Nodes of the R*-tree.

use super::mbr::HyperBoundingBox;
use core_pages::PageId;
use pointcloud::PointIndex;
use serde::{Deserialize, Serialize};

/// A child of a directory node and the box around everything below it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialEntry {
    /// Bounding box of the subtree
    pub mbr: HyperBoundingBox,
    /// Page of the subtree's root
    pub child: PageId,
}

/// A node, leaves hold object ids, their coordinates come from the point cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RStarNode {
    /// Holds objects
    Leaf(Vec<PointIndex>),
    /// Holds children
    Directory(Vec<SpatialEntry>),
}

impl RStarNode {
    /// If this node holds objects rather than children
    pub fn is_leaf(&self) -> bool {
        matches!(self, RStarNode::Leaf(_))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        match self {
            RStarNode::Leaf(entries) => entries.len(),
            RStarNode::Directory(entries) => entries.len(),
        }
    }

    /// If the node holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
