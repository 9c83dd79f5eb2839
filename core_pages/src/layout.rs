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

//! Turns a page byte budget into a node capacity.

use crate::errors::*;
use log::warn;

/// The fixed header of every page: the page id, the entry count, the node's own id and one bit for the leaf flag.
const PAGE_HEADER_BITS: usize = 4 * 8 + 4 * 8 + 4 * 8 + 1;

/// The byte budget of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    page_size: usize,
}

impl PageLayout {
    /// A layout for pages of `page_size` bytes
    pub fn new(page_size: usize) -> PageLayout {
        PageLayout { page_size }
    }

    /// Bytes per page
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// How many entries of `entry_size` bytes fit on a page after the header. A capacity of one or
    /// less cannot be split and is an error, anything below ten is allowed with a warning.
    pub fn capacity(&self, node_kind: &'static str, entry_size: usize) -> PageResult<usize> {
        let budget = (self.page_size * 8).saturating_sub(PAGE_HEADER_BITS);
        let capacity = budget / (entry_size.max(1) * 8);
        if capacity <= 1 {
            return Err(PageError::CapacityTooSmall {
                node_kind,
                page_size: self.page_size,
                entry_size,
                capacity,
            });
        }
        if capacity < 10 {
            warn!(
                "Page size is too small, maximum number of entries in a {} node = {}",
                node_kind, capacity
            );
        }
        Ok(capacity)
    }

    /// The smallest number of entries a non root node may hold, half the capacity rounded up.
    pub fn min_fill(capacity: usize) -> usize {
        (capacity + 1) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_from_page() {
        let layout = PageLayout::new(1024);
        // (8192 - 97) / 96
        assert_eq!(layout.capacity("leaf", 12).unwrap(), 84);
    }

    #[test]
    fn tiny_pages_fail() {
        let layout = PageLayout::new(20);
        assert!(layout.capacity("directory", 16).is_err());
        let layout = PageLayout::new(4);
        assert!(layout.capacity("leaf", 4).is_err());
    }

    #[test]
    fn small_pages_still_work() {
        let layout = PageLayout::new(64);
        assert_eq!(layout.capacity("leaf", 12).unwrap(), 4);
    }

    #[test]
    fn min_fill_rounds_up() {
        assert_eq!(PageLayout::min_fill(5), 3);
        assert_eq!(PageLayout::min_fill(6), 3);
    }
}
