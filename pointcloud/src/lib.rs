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

//! # Point Cloud
//! The object storage and distance oracle the indexes are written against. Indexes never own
//! coordinates, they store [`PointIndex`] values and ask a [`PointCloud`] for the point and its
//! [`Metric`] for distances.

#![allow(dead_code)]
#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

pub mod pc_errors;
pub use pc_errors::{PointCloudError, PointCloudResult};

pub mod data_sources;
pub mod metrics;
pub use metrics::*;

mod base_traits;
#[doc(inline)]
pub use base_traits::*;

pub use data_sources::DataRam;

/// A sensible default for an unlabeled cloud
pub type DefaultCloud<M> = DataRam<M>;

/// To make things more obvious, we type the point index.
pub type PointIndex = usize;
