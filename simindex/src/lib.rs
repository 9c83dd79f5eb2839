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

//! # SimIndex
//! Paged similarity indexes over a [`pointcloud::PointCloud`]:
//!
//! * [`MTree`], a dynamic metric tree, and its reverse kNN variants [`MkMaxTree`], which keeps a
//!   single kNN distance bound per entry, and [`MkTabTree`], which keeps the whole table of the
//!   first `k_max` kNN distances.
//! * [`RStarTree`], a spatial tree over bounding boxes for Lp spaces, and [`RdKnnTree`], which adds
//!   a kNN distance bound to every object and page for reverse kNN queries.
//! * [`VaFile`] and [`PartialVaFile`], quantized scans that filter with approximations and refine
//!   the survivors with exact distances.
//!
//! Every index stores its nodes in a [`core_pages::PageStore`] and counts page and distance work in
//! [`core_pages::IndexStatistics`]. The query seams are in [`query_interface`], construction is
//! done through an [`IndexBuilder`].
//!
//! ```rust,ignore
//! let cloud = Arc::new(DataRam::<L2>::new(data, dim)?);
//! let tree = IndexBuilder::new().set_k_max(10).build_mkmax(Arc::clone(&cloud))?;
//! let reverse = tree.reverse_knn(0, 5)?;
//! ```

#![allow(dead_code)]
#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

pub mod errors;
pub use errors::*;

pub mod query_tools;

pub mod mtree;
pub use mtree::{MTree, MkMaxTree, MkTabTree};

pub mod rstar;
pub use rstar::{RStarTree, RdKnnTree};

pub mod vafile;
pub use vafile::{PartialVaFile, VaFile, VaQuery};

pub mod query_interface;

mod builders;
pub use builders::*;

pub use core_pages::{IndexStatistics, PageId, StatisticsSnapshot};
pub use pointcloud::PointIndex;
