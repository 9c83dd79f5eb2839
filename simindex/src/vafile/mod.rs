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

//! # Vector approximation files
//!
//! Scan based indexes for Lp norms. Every object is quantized to one cell per dimension, queries
//! compute lower and upper distance bounds from the cells and only refine the objects the bounds
//! cannot decide.

mod approximation;
pub use approximation::VectorApproximation;
mod da_file;
pub use da_file::DaFile;
mod lp_distance;
pub use lp_distance::VaLpDistance;
mod va_file;
pub use va_file::{VaFile, VaQuery};
mod partial;
pub use partial::PartialVaFile;

/// Bound comparisons in power space tolerate this relative rounding error.
pub(crate) const ROUNDING_SLACK: f32 = 1.0 + 1e-5;
