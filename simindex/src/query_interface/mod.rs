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

//! The query seams every index implements, a brute force reference, and a parallel bulk interface.

use crate::errors::*;
use crate::mtree::*;
use crate::query_tools::KnnHeap;
use crate::rstar::{RStarTree, RdKnnTree};
use crate::vafile::{PartialVaFile, VaFile};
use core_pages::IndexStatistics;
use pointcloud::*;
use rayon::prelude::*;
use std::sync::Arc;

/// k nearest neighbour queries. Results are `(distance, index)`, closest first.
pub trait KnnIndex {
    /// The `k` nearest objects to a point
    fn knn(&self, point: &[f32], k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>>;
    /// The `k` nearest objects to a stored object, the object itself included
    fn knn_by_index(&self, index: PointIndex, k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>>;
    /// One list per id
    fn knn_for_indexes(
        &self,
        ids: &[PointIndex],
        k: usize,
    ) -> SimIndexResult<Vec<Vec<(f32, PointIndex)>>> {
        ids.iter().map(|i| self.knn_by_index(*i, k)).collect()
    }
}

/// Range queries. Results are `(distance, index)`, closest first.
pub trait RangeIndex {
    /// Every object within `radius` of a point
    fn range(&self, point: &[f32], radius: f32) -> SimIndexResult<Vec<(f32, PointIndex)>>;
    /// Every object within `radius` of a stored object
    fn range_by_index(
        &self,
        index: PointIndex,
        radius: f32,
    ) -> SimIndexResult<Vec<(f32, PointIndex)>>;
}

/// Reverse kNN queries.
pub trait ReverseKnnIndex {
    /// Every stored object that has `index` among its `k` nearest neighbours
    fn reverse_knn(&self, index: PointIndex, k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>>;
}

/// Indexes that objects can be added to. Removing objects is not implemented by any index.
pub trait DynamicIndex {
    /// Adds one object
    fn insert(&mut self, index: PointIndex) -> SimIndexResult<()>;
    /// Adds many objects
    fn insert_all(&mut self, ids: &[PointIndex]) -> SimIndexResult<()> {
        ids.iter().try_for_each(|i| self.insert(*i))
    }
    /// Always fails
    fn delete(&mut self, _index: PointIndex) -> SimIndexResult<()> {
        Err(SimIndexError::UnsupportedOperation("deleting objects"))
    }
    /// Always fails
    fn delete_all(&mut self, _ids: &[PointIndex]) -> SimIndexResult<()> {
        Err(SimIndexError::UnsupportedOperation("deleting objects"))
    }
}

fn sorted_lists(
    ids: &[PointIndex],
    lists: &hashbrown::HashMap<PointIndex, KnnHeap>,
) -> Vec<Vec<(f32, PointIndex)>> {
    ids.iter()
        .map(|i| lists.get(i).map(|l| l.to_sorted_vec()).unwrap_or_default())
        .collect()
}

impl<D: PointCloud, B: KnnBound> KnnIndex for MTree<D, B> {
    fn knn(&self, point: &[f32], k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        MTree::knn(self, point, k)
    }
    fn knn_by_index(&self, index: PointIndex, k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        MTree::knn_by_index(self, index, k)
    }
    fn knn_for_indexes(
        &self,
        ids: &[PointIndex],
        k: usize,
    ) -> SimIndexResult<Vec<Vec<(f32, PointIndex)>>> {
        Ok(sorted_lists(ids, &self.batch_nn(ids, k)?))
    }
}

impl<D: PointCloud, B: KnnBound> RangeIndex for MTree<D, B> {
    fn range(&self, point: &[f32], radius: f32) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        MTree::range(self, point, radius)
    }
    fn range_by_index(
        &self,
        index: PointIndex,
        radius: f32,
    ) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        MTree::range(self, self.point_cloud().point(index)?, radius)
    }
}

impl<D: PointCloud> DynamicIndex for MTree<D, ()> {
    fn insert(&mut self, index: PointIndex) -> SimIndexResult<()> {
        MTree::insert(self, index)
    }
}

/// Queries on the bound carrying trees go to the tree they wrap.
macro_rules! bound_tree_interface {
    ($tree:ident) => {
        impl<D: PointCloud> KnnIndex for $tree<D> {
            fn knn(&self, point: &[f32], k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
                self.tree.knn(point, k)
            }
            fn knn_by_index(
                &self,
                index: PointIndex,
                k: usize,
            ) -> SimIndexResult<Vec<(f32, PointIndex)>> {
                self.tree.knn_by_index(index, k)
            }
            fn knn_for_indexes(
                &self,
                ids: &[PointIndex],
                k: usize,
            ) -> SimIndexResult<Vec<Vec<(f32, PointIndex)>>> {
                KnnIndex::knn_for_indexes(&self.tree, ids, k)
            }
        }

        impl<D: PointCloud> RangeIndex for $tree<D> {
            fn range(&self, point: &[f32], radius: f32) -> SimIndexResult<Vec<(f32, PointIndex)>> {
                self.tree.range(point, radius)
            }
            fn range_by_index(
                &self,
                index: PointIndex,
                radius: f32,
            ) -> SimIndexResult<Vec<(f32, PointIndex)>> {
                RangeIndex::range_by_index(&self.tree, index, radius)
            }
        }

        impl<D: PointCloud> ReverseKnnIndex for $tree<D> {
            fn reverse_knn(
                &self,
                index: PointIndex,
                k: usize,
            ) -> SimIndexResult<Vec<(f32, PointIndex)>> {
                $tree::reverse_knn(self, index, k)
            }
        }

        impl<D: PointCloud> DynamicIndex for $tree<D> {
            fn insert(&mut self, index: PointIndex) -> SimIndexResult<()> {
                $tree::insert(self, index)
            }
            fn insert_all(&mut self, ids: &[PointIndex]) -> SimIndexResult<()> {
                $tree::insert_all(self, ids)
            }
        }
    };
}

bound_tree_interface!(MkMaxTree);
bound_tree_interface!(MkTabTree);
bound_tree_interface!(RdKnnTree);

impl<D: PointCloud> KnnIndex for RStarTree<D> {
    fn knn(&self, point: &[f32], k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        RStarTree::knn(self, point, k)
    }
    fn knn_by_index(&self, index: PointIndex, k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        RStarTree::knn(self, self.point_cloud().point(index)?, k)
    }
    fn knn_for_indexes(
        &self,
        ids: &[PointIndex],
        k: usize,
    ) -> SimIndexResult<Vec<Vec<(f32, PointIndex)>>> {
        RStarTree::knn_for_indexes(self, ids, k)
    }
}

impl<D: PointCloud> RangeIndex for RStarTree<D> {
    fn range(&self, point: &[f32], radius: f32) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        RStarTree::range(self, point, radius)
    }
    fn range_by_index(
        &self,
        index: PointIndex,
        radius: f32,
    ) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        RStarTree::range(self, self.point_cloud().point(index)?, radius)
    }
}

impl<D: PointCloud> DynamicIndex for RStarTree<D> {
    fn insert(&mut self, index: PointIndex) -> SimIndexResult<()> {
        RStarTree::insert(self, index)
    }
}

macro_rules! va_interface {
    ($index:ident) => {
        impl<D: PointCloud> KnnIndex for $index<D> {
            fn knn(&self, point: &[f32], k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
                self.knn_query()?.knn(point, k)
            }
            fn knn_by_index(
                &self,
                index: PointIndex,
                k: usize,
            ) -> SimIndexResult<Vec<(f32, PointIndex)>> {
                self.knn_query()?.knn(self.point_cloud().point(index)?, k)
            }
        }

        impl<D: PointCloud> RangeIndex for $index<D> {
            fn range(&self, point: &[f32], radius: f32) -> SimIndexResult<Vec<(f32, PointIndex)>> {
                self.range_query()?.range(point, radius)
            }
            fn range_by_index(
                &self,
                index: PointIndex,
                radius: f32,
            ) -> SimIndexResult<Vec<(f32, PointIndex)>> {
                self.range_query()?.range(self.point_cloud().point(index)?, radius)
            }
        }
    };
}

va_interface!(VaFile);
va_interface!(PartialVaFile);

/// Brute force over every object, for any metric.
#[derive(Debug)]
pub struct LinearScan<D: PointCloud> {
    point_cloud: Arc<D>,
    statistics: IndexStatistics,
}

impl<D: PointCloud> LinearScan<D> {
    /// Scans the whole cloud on every query.
    pub fn new(point_cloud: Arc<D>) -> Self {
        LinearScan {
            point_cloud,
            statistics: IndexStatistics::default(),
        }
    }

    /// The counters of this scan
    pub fn statistics(&self) -> &IndexStatistics {
        &self.statistics
    }

    fn all_distances(&self, point: &[f32]) -> SimIndexResult<(Vec<PointIndex>, Vec<f32>)> {
        let indexes = self.point_cloud.reference_indexes();
        let dists = self.point_cloud.distances_to_point(point, &indexes)?;
        self.statistics.count_distances(indexes.len() as u64);
        Ok((indexes, dists))
    }
}

impl<D: PointCloud> KnnIndex for LinearScan<D> {
    fn knn(&self, point: &[f32], k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        SimIndexError::check_k(k)?;
        self.statistics.count_knn_query();
        let (indexes, dists) = self.all_distances(point)?;
        let mut heap = KnnHeap::new(k);
        for (i, d) in indexes.iter().zip(dists) {
            heap.push(*i, d);
        }
        Ok(heap.unpack())
    }
    fn knn_by_index(&self, index: PointIndex, k: usize) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        self.knn(self.point_cloud.point(index)?, k)
    }
}

impl<D: PointCloud> RangeIndex for LinearScan<D> {
    fn range(&self, point: &[f32], radius: f32) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        self.statistics.count_range_query();
        let (indexes, dists) = self.all_distances(point)?;
        let mut result: Vec<(f32, PointIndex)> = dists
            .into_iter()
            .zip(indexes)
            .filter(|(d, _)| *d <= radius)
            .collect();
        result.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(result)
    }
    fn range_by_index(
        &self,
        index: PointIndex,
        radius: f32,
    ) -> SimIndexResult<Vec<(f32, PointIndex)>> {
        self.range(self.point_cloud.point(index)?, radius)
    }
}

/// Inteface for bulk queries. Runs many read only queries against one index in parallel.
pub struct BulkInterface<I> {
    index: Arc<I>,
}

impl<I: Send + Sync> BulkInterface<I> {
    /// Creates a new one.
    pub fn new(index: Arc<I>) -> Self {
        BulkInterface { index }
    }
}

impl<I: KnnIndex + Send + Sync> BulkInterface<I> {
    /// Bulk knn
    pub fn knn(&self, points: &[&[f32]], k: usize) -> Vec<SimIndexResult<Vec<(f32, PointIndex)>>> {
        points
            .par_chunks(1)
            .flat_map_iter(|chunk| chunk.iter().map(|p| self.index.knn(p, k)))
            .collect()
    }
}

impl<I: RangeIndex + Send + Sync> BulkInterface<I> {
    /// Bulk range
    pub fn range(
        &self,
        points: &[&[f32]],
        radius: f32,
    ) -> Vec<SimIndexResult<Vec<(f32, PointIndex)>>> {
        points
            .par_chunks(10)
            .flat_map_iter(|chunk| chunk.iter().map(|p| self.index.range(p, radius)))
            .collect()
    }
}
