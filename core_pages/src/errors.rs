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

//! Errors raised by the page store and the page layout.

use crate::PageId;
use std::error::Error;
use std::fmt;

/// Helper type for a call that could go wrong.
pub type PageResult<T> = Result<T, PageError>;

/// Error type for the paged storage
#[derive(Debug, Clone, PartialEq)]
pub enum PageError {
    /// A page id that was never allocated in this store
    MissingPage(PageId),
    /// The configured page budget cannot hold enough entries to build a tree
    CapacityTooSmall {
        /// Which kind of node was being sized
        node_kind: &'static str,
        /// The configured page size in bytes
        page_size: usize,
        /// The serialized size of one entry in bytes
        entry_size: usize,
        /// The capacity this works out to
        capacity: usize,
    },
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PageError::MissingPage(id) => write!(f, "{} is not in the page store", id),
            PageError::CapacityTooSmall {
                node_kind,
                page_size,
                entry_size,
                capacity,
            } => write!(
                f,
                "a page of {} bytes holds only {} {} entries of {} bytes, increase the page size",
                page_size, capacity, node_kind, entry_size
            ),
        }
    }
}

#[allow(deprecated)]
impl Error for PageError {
    fn description(&self) -> &str {
        match self {
            PageError::MissingPage(..) => "the page is not in the page store",
            PageError::CapacityTooSmall { .. } => "the page size is too small for the node",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        None
    }
}
