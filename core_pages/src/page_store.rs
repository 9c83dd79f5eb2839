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

//! The arena that owns every node of a tree.

use crate::errors::*;
use crate::statistics::IndexStatistics;
use crate::PageId;

/// Maps page ids to nodes. The store is the single owner of the nodes, trees hold ids.
/// Every access is counted in the store's [`IndexStatistics`].
#[derive(Debug)]
pub struct PageStore<N> {
    pages: Vec<N>,
    page_size: usize,
    statistics: IndexStatistics,
}

impl<N> PageStore<N> {
    /// An empty store of pages of `page_size` bytes.
    pub fn new(page_size: usize) -> PageStore<N> {
        PageStore {
            pages: Vec::new(),
            page_size,
            statistics: IndexStatistics::default(),
        }
    }

    /// Hands the node over to the store and returns its new id.
    pub fn allocate(&mut self, node: N) -> PageId {
        let id = PageId::from(self.pages.len());
        self.pages.push(node);
        self.statistics.count_page_write();
        id
    }

    /// Read access to a node.
    #[inline]
    pub fn read(&self, id: PageId) -> PageResult<&N> {
        self.statistics.count_page_read();
        self.pages.get(id.raw()).ok_or(PageError::MissingPage(id))
    }

    /// Write access to a node.
    #[inline]
    pub fn read_mut(&mut self, id: PageId) -> PageResult<&mut N> {
        self.statistics.count_page_write();
        self.pages.get_mut(id.raw()).ok_or(PageError::MissingPage(id))
    }

    /// Replaces the node at `id`, returning the old one.
    pub fn write(&mut self, id: PageId, node: N) -> PageResult<N> {
        let slot = self.read_mut(id)?;
        Ok(std::mem::replace(slot, node))
    }

    /// The number of allocated pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// If nothing was allocated yet
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The configured page size in bytes
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The counters of the index this store belongs to
    pub fn statistics(&self) -> &IndexStatistics {
        &self.statistics
    }

    /// Every page with its id, in allocation order. Not counted as reads.
    pub fn iter(&self) -> impl Iterator<Item = (PageId, &N)> {
        self.pages
            .iter()
            .enumerate()
            .map(|(i, n)| (PageId::from(i), n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_read() {
        let mut store: PageStore<Vec<u32>> = PageStore::new(1024);
        let a = store.allocate(vec![1, 2]);
        let b = store.allocate(vec![3]);
        assert_ne!(a, b);
        assert_eq!(store.read(a).unwrap(), &vec![1, 2]);
        store.read_mut(b).unwrap().push(4);
        assert_eq!(store.read(b).unwrap(), &vec![3, 4]);
        let old = store.write(a, vec![]).unwrap();
        assert_eq!(old, vec![1, 2]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn missing_page_errors() {
        let store: PageStore<u8> = PageStore::new(1024);
        let missing = PageId::from(3);
        assert_eq!(store.read(missing), Err(PageError::MissingPage(missing)));
    }

    #[test]
    fn any_slot_is_an_address() {
        let far = PageId::from(u32::MAX as usize + 7);
        assert_eq!(far.raw(), u32::MAX as usize + 7);
        let store: PageStore<u8> = PageStore::new(1024);
        assert_eq!(store.read(far), Err(PageError::MissingPage(far)));
    }

    #[test]
    fn accesses_are_counted() {
        let mut store: PageStore<u8> = PageStore::new(1024);
        let a = store.allocate(1);
        store.read(a).unwrap();
        store.read(a).unwrap();
        let snap = store.statistics().snapshot();
        assert_eq!(snap.page_reads, 2);
        assert_eq!(snap.page_writes, 1);
    }
}
