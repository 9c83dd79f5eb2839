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

//! # The M-tree family
//!
//! Paged metric trees over a [`pointcloud::PointCloud`]. [`MTree`] is the plain tree,
//! [`MkMaxTree`] and [`MkTabTree`] additionally keep upper bounds on the kNN distance of every
//! object in a subtree so reverse kNN queries can prune whole subtrees.
//!
//! Nodes live in a [`core_pages::PageStore`] and refer to each other only by page id.

mod bounds;
pub use bounds::{KnnBound, KnnDistances};
mod node;
pub use node::{LeafEntry, MTreeNode, RoutingEntry};
mod split;
mod tree;
pub use tree::{MTree, RootEntry};
#[cfg(test)]
pub(crate) use tree::tests;
mod mkmax;
pub use mkmax::MkMaxTree;
mod mktab;
pub use mktab::MkTabTree;
