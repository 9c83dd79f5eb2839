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

//! # Core Pages
//! The simulated paged storage shared by the trees: page identifiers, an arena that owns every node,
//! the counters each index instance keeps, and the page layout arithmetic that turns a byte budget into a node capacity.

use serde::{Deserialize, Serialize};
use std::fmt;

mod errors;
pub use errors::{PageError, PageResult};
mod page_store;
pub use page_store::PageStore;
mod statistics;
pub use statistics::{IndexStatistics, StatisticsSnapshot};
mod layout;
pub use layout::PageLayout;

/// The address of a node inside a [`PageStore`]. Nodes never reference each other directly, only through these.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    id: usize,
}

impl PageId {
    /// The underlying slot
    #[inline]
    pub fn raw(&self) -> usize {
        self.id
    }
}

impl From<usize> for PageId {
    fn from(id: usize) -> PageId {
        PageId { id }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "page({})", self.id)
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PageId").field("id", &self.id).finish()
    }
}

/// Size in bytes of a distance value in a serialized entry.
pub const DISTANCE_SIZE: usize = std::mem::size_of::<f32>();
/// Size in bytes of an object or page identifier in a serialized entry.
pub const ID_SIZE: usize = std::mem::size_of::<u32>();
