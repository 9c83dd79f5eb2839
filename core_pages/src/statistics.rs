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

//! Per instance counters. They are purely observational, nothing reads them to make a decision.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// The counters one index instance keeps. Atomic so that read only queries can run in parallel.
#[derive(Debug, Default)]
pub struct IndexStatistics {
    distance_calcs: AtomicU64,
    page_reads: AtomicU64,
    page_writes: AtomicU64,
    knn_queries: AtomicU64,
    range_queries: AtomicU64,
    reverse_knn_queries: AtomicU64,
    issued_queries: AtomicU64,
    scanned_bytes: AtomicU64,
    refinements: AtomicU64,
    reverse_knn_candidates: AtomicU64,
    reverse_knn_results: AtomicU64,
}

/// A plain copy of the counters at one moment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Number of distance computations
    pub distance_calcs: u64,
    /// Node reads from the page store
    pub page_reads: u64,
    /// Node allocations and writes to the page store
    pub page_writes: u64,
    /// kNN queries answered
    pub knn_queries: u64,
    /// Range queries answered
    pub range_queries: u64,
    /// Reverse kNN queries answered
    pub reverse_knn_queries: u64,
    /// Queries answered by a scan based index
    pub issued_queries: u64,
    /// Bytes a scan based index read, rounded to whole pages
    pub scanned_bytes: u64,
    /// Exact distance computations made to confirm an approximate candidate
    pub refinements: u64,
    /// Candidates a reverse kNN query had to look at before refinement
    pub reverse_knn_candidates: u64,
    /// Objects reverse kNN queries returned
    pub reverse_knn_results: u64,
}

impl StatisticsSnapshot {
    /// The difference between this snapshot and an earlier one.
    pub fn since(&self, earlier: &StatisticsSnapshot) -> StatisticsSnapshot {
        StatisticsSnapshot {
            distance_calcs: self.distance_calcs - earlier.distance_calcs,
            page_reads: self.page_reads - earlier.page_reads,
            page_writes: self.page_writes - earlier.page_writes,
            knn_queries: self.knn_queries - earlier.knn_queries,
            range_queries: self.range_queries - earlier.range_queries,
            reverse_knn_queries: self.reverse_knn_queries - earlier.reverse_knn_queries,
            issued_queries: self.issued_queries - earlier.issued_queries,
            scanned_bytes: self.scanned_bytes - earlier.scanned_bytes,
            refinements: self.refinements - earlier.refinements,
            reverse_knn_candidates: self.reverse_knn_candidates - earlier.reverse_knn_candidates,
            reverse_knn_results: self.reverse_knn_results - earlier.reverse_knn_results,
        }
    }
}

impl IndexStatistics {
    #[inline]
    pub fn count_distances(&self, n: u64) {
        self.distance_calcs.fetch_add(n, Ordering::Relaxed);
    }
    #[inline]
    pub fn count_page_read(&self) {
        self.page_reads.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn count_page_write(&self) {
        self.page_writes.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn count_knn_query(&self) {
        self.knn_queries.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn count_range_query(&self) {
        self.range_queries.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn count_reverse_knn_query(&self) {
        self.reverse_knn_queries.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn count_issued_query(&self) {
        self.issued_queries.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn count_scanned_bytes(&self, bytes: u64) {
        self.scanned_bytes.fetch_add(bytes, Ordering::Relaxed);
    }
    #[inline]
    pub fn count_refinements(&self, n: u64) {
        self.refinements.fetch_add(n, Ordering::Relaxed);
    }
    #[inline]
    pub fn count_reverse_knn_outcome(&self, candidates: u64, results: u64) {
        self.reverse_knn_candidates.fetch_add(candidates, Ordering::Relaxed);
        self.reverse_knn_results.fetch_add(results, Ordering::Relaxed);
    }

    /// Copies the current values out.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            distance_calcs: self.distance_calcs.load(Ordering::Relaxed),
            page_reads: self.page_reads.load(Ordering::Relaxed),
            page_writes: self.page_writes.load(Ordering::Relaxed),
            knn_queries: self.knn_queries.load(Ordering::Relaxed),
            range_queries: self.range_queries.load(Ordering::Relaxed),
            reverse_knn_queries: self.reverse_knn_queries.load(Ordering::Relaxed),
            issued_queries: self.issued_queries.load(Ordering::Relaxed),
            scanned_bytes: self.scanned_bytes.load(Ordering::Relaxed),
            refinements: self.refinements.load(Ordering::Relaxed),
            reverse_knn_candidates: self.reverse_knn_candidates.load(Ordering::Relaxed),
            reverse_knn_results: self.reverse_knn_results.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [
            &self.distance_calcs,
            &self.page_reads,
            &self.page_writes,
            &self.knn_queries,
            &self.range_queries,
            &self.reverse_knn_queries,
            &self.issued_queries,
            &self.scanned_bytes,
            &self.refinements,
            &self.reverse_knn_candidates,
            &self.reverse_knn_results,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_difference() {
        let stats = IndexStatistics::default();
        stats.count_distances(5);
        let before = stats.snapshot();
        stats.count_distances(3);
        stats.count_knn_query();
        let diff = stats.snapshot().since(&before);
        assert_eq!(diff.distance_calcs, 3);
        assert_eq!(diff.knn_queries, 1);
        stats.reset();
        assert_eq!(stats.snapshot(), StatisticsSnapshot::default());
    }
}
