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

extern crate pointcloud;
extern crate rand;
extern crate rand_distr;
extern crate simindex;

use pointcloud::DataRam;
use pointcloud::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use simindex::query_interface::*;
use simindex::*;
use std::sync::Arc;

/// Gaussian blobs plus exact copies of the first `duplicates` points.
fn blob_cloud(count: usize, dim: usize, duplicates: usize, seed: u64) -> Arc<DataRam> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, 1.0).unwrap();
    let mut data: Vec<f32> = Vec::with_capacity((count + duplicates) * dim);
    for i in 0..count {
        let center = (i % 4) as f32 * 3.0;
        data.extend((0..dim).map(|_| center + normal.sample(&mut rng)));
    }
    let copies: Vec<f32> = data[..duplicates * dim].to_vec();
    data.extend(copies);
    Arc::new(DataRam::new(data, dim).unwrap())
}

fn queries(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let normal = Normal::new(4.5f32, 3.0).unwrap();
    (0..count)
        .map(|_| (0..dim).map(|_| normal.sample(&mut rng)).collect())
        .collect()
}

fn assert_same_distances(found: &[(f32, PointIndex)], expected: &[(f32, PointIndex)]) {
    assert_eq!(found.len(), expected.len());
    for (f, e) in found.iter().zip(expected) {
        assert!((f.0 - e.0).abs() < 1e-4, "{:?} != {:?}", found, expected);
    }
}

fn sorted_ids(list: &[(f32, PointIndex)]) -> Vec<PointIndex> {
    let mut ids: Vec<PointIndex> = list.iter().map(|(_, i)| *i).collect();
    ids.sort_unstable();
    ids
}

fn check_knn<I: KnnIndex>(index: &I, scan: &LinearScan<DataRam>, queries: &[Vec<f32>], k: usize) {
    for q in queries {
        assert_same_distances(&index.knn(q, k).unwrap(), &scan.knn(q, k).unwrap());
    }
}

fn check_range<I: RangeIndex>(index: &I, scan: &LinearScan<DataRam>, queries: &[Vec<f32>], r: f32) {
    for q in queries {
        assert_eq!(
            sorted_ids(&index.range(q, r).unwrap()),
            sorted_ids(&scan.range(q, r).unwrap())
        );
    }
}

#[test]
fn trees_answer_like_a_scan() {
    let cloud = blob_cloud(1000, 8, 0, 1);
    let scan = LinearScan::new(Arc::clone(&cloud));
    let queries = queries(100, 8, 2);
    let mut builder = IndexBuilder::new();
    builder.set_page_size(1024).set_k_max(10);

    let mtree = builder.build_mtree(Arc::clone(&cloud)).unwrap();
    check_knn(&mtree, &scan, &queries, 10);
    let mkmax = builder.build_mkmax(Arc::clone(&cloud)).unwrap();
    check_knn(&mkmax, &scan, &queries, 10);
    let mktab = builder.build_mktab(Arc::clone(&cloud)).unwrap();
    check_knn(&mktab, &scan, &queries, 10);
    let rstar = builder.build_rstar(Arc::clone(&cloud)).unwrap();
    check_knn(&rstar, &scan, &queries, 10);
}

#[test]
fn duplicates_are_all_found() {
    let cloud = blob_cloud(400, 4, 40, 3);
    let scan = LinearScan::new(Arc::clone(&cloud));
    let queries: Vec<Vec<f32>> = (0..40).map(|i| cloud.point(i).unwrap().to_vec()).collect();
    let mut builder = IndexBuilder::new();
    builder.set_page_size(512).set_k_max(4).set_partitions(8);

    let mtree = builder.build_mtree(Arc::clone(&cloud)).unwrap();
    let rstar = builder.build_rstar(Arc::clone(&cloud)).unwrap();
    let va = builder.va_file(Arc::clone(&cloud)).unwrap();
    let partial = builder.partial_va_file(Arc::clone(&cloud)).unwrap();
    for r in [0.0, 0.8] {
        check_range(&mtree, &scan, &queries, r);
        check_range(&rstar, &scan, &queries, r);
        check_range(&va, &scan, &queries, r);
        check_range(&partial, &scan, &queries, r);
    }
    for q in &queries {
        // the point and its copy
        assert_eq!(mtree.knn(q, 2).unwrap()[1].0, 0.0);
    }
    check_knn(&va, &scan, &queries, 5);
    check_knn(&partial, &scan, &queries, 5);
}

/// L2 with a rectangle bound that overshoots, so it prunes boxes it must not.
#[derive(Debug, Clone, Default)]
struct OvershootingL2 {
    inner: L2,
}

impl Metric for OvershootingL2 {
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        self.inner.dist(x, y)
    }
    fn min_dist_to_rect(&self, lower: &[f32], upper: &[f32], point: &[f32]) -> f32 {
        self.inner.min_dist_to_rect(lower, upper, point) + 5.0
    }
}

#[test]
fn rstar_pruning_uses_the_rectangle_bound() {
    let mut rng = SmallRng::seed_from_u64(4);
    let normal = Normal::new(0.0f32, 1.0).unwrap();
    let data: Vec<f32> = (0..500 * 4).map(|_| normal.sample(&mut rng)).collect();
    let sound = Arc::new(DataRam::<L2>::new(data.clone(), 4).unwrap());
    let broken = Arc::new(DataRam::with_metric(data, 4, OvershootingL2::default()).unwrap());
    let mut builder = IndexBuilder::new();
    builder.set_page_size(512);
    let sound_tree = builder.build_rstar(sound).unwrap();
    let broken_tree = builder.build_rstar(broken).unwrap();
    assert!(broken_tree.height() > 1);

    let mut sound_total = 0;
    let mut broken_total = 0;
    for i in 0..50 {
        let q = sound_tree.point_cloud().point(i).unwrap().to_vec();
        let found = sorted_ids(&sound_tree.range(&q, 1.0).unwrap());
        let pruned = sorted_ids(&broken_tree.range(&q, 1.0).unwrap());
        assert!(pruned.iter().all(|i| found.binary_search(i).is_ok()));
        sound_total += found.len();
        broken_total += pruned.len();
    }
    assert!(broken_total < sound_total);
}

fn brute_reverse_knn(cloud: &DataRam, q: PointIndex, k: usize) -> Vec<PointIndex> {
    let scan = LinearScan::new(Arc::new(cloud.clone()));
    (0..cloud.len())
        .filter(|p| {
            let list = scan.knn_by_index(*p, k).unwrap();
            cloud.distance(*p, q).unwrap() <= list[list.len() - 1].0
        })
        .collect()
}

#[test]
fn reverse_knn_duality() {
    let cloud = blob_cloud(300, 3, 10, 5);
    let mut builder = IndexBuilder::new();
    builder.set_page_size(256).set_k_max(6);
    let mut mkmax = builder.mkmax(Arc::clone(&cloud)).unwrap();
    for i in cloud.reference_indexes() {
        mkmax.insert(i).unwrap();
    }
    mkmax.integrity_check().unwrap();
    let mktab = builder.build_mktab(Arc::clone(&cloud)).unwrap();
    mktab.integrity_check().unwrap();
    let mut rdknn = builder.rdknn(Arc::clone(&cloud)).unwrap();
    for i in cloud.reference_indexes() {
        rdknn.insert(i).unwrap();
    }
    rdknn.integrity_check().unwrap();

    for q in (0..310).step_by(23) {
        for k in [1, 3, 6] {
            let expected = brute_reverse_knn(&cloud, q, k);
            assert_eq!(sorted_ids(&mkmax.reverse_knn(q, k).unwrap()), expected);
            assert_eq!(sorted_ids(&mktab.reverse_knn(q, k).unwrap()), expected);
            assert_eq!(sorted_ids(&rdknn.reverse_knn(q, k).unwrap()), expected);
        }
    }
}

#[test]
fn bounds_survive_mixed_loading() {
    let cloud = blob_cloud(200, 2, 0, 6);
    let mut builder = IndexBuilder::new();
    builder.set_page_size(128).set_k_max(3);
    let mut tree = builder.mkmax(Arc::clone(&cloud)).unwrap();
    let ids = cloud.reference_indexes();
    tree.insert_all(&ids[..120]).unwrap();
    tree.integrity_check().unwrap();
    for i in &ids[120..] {
        tree.insert(*i).unwrap();
    }
    tree.integrity_check().unwrap();
    assert_eq!(tree.len(), 200);
}

#[test]
fn va_filter_does_not_change_answers() {
    let cloud = blob_cloud(600, 6, 0, 7);
    let queries = queries(20, 6, 8);
    let va = VaFile::new(Arc::clone(&cloud), 8, 4096).unwrap();
    let partial = PartialVaFile::new(Arc::clone(&cloud), 8, 4096).unwrap();
    for q in &queries {
        let with = va.knn_query().unwrap().knn(q, 7).unwrap();
        let without = va.knn_query().unwrap().with_filter(false).knn(q, 7).unwrap();
        assert_same_distances(&with, &without);
        let partial_with = partial.knn_query().unwrap().knn(q, 7).unwrap();
        assert_same_distances(&partial_with, &without);
        let range = va.range_query().unwrap().range(q, 2.0).unwrap();
        let range_without = va.range_query().unwrap().with_filter(false).range(q, 2.0).unwrap();
        assert_eq!(sorted_ids(&range), sorted_ids(&range_without));
    }
    let snapshot = va.statistics().snapshot();
    assert_eq!(snapshot.issued_queries, 80);
    assert_eq!(snapshot.scanned_bytes % 4096, 0);
}

#[test]
fn errors_are_classified() {
    let cloud = blob_cloud(50, 3, 0, 9);
    let mut builder = IndexBuilder::new();
    builder.set_page_size(256).set_k_max(3);

    let mkmax = builder.build_mkmax(Arc::clone(&cloud)).unwrap();
    let err = mkmax.knn(&[0.0, 0.0, 0.0], 0).unwrap_err();
    assert!(matches!(err, SimIndexError::InvalidK { .. }) && err.is_usage_error());
    let err = mkmax.reverse_knn(0, 4).unwrap_err();
    assert!(matches!(err, SimIndexError::KAboveKMax { .. }) && err.is_usage_error());

    let mut mktab = builder.build_mktab(Arc::clone(&cloud)).unwrap();
    assert!(mktab.insert(0).unwrap_err().is_unsupported());
    let mut mtree = builder.build_mtree(Arc::clone(&cloud)).unwrap();
    assert!(DynamicIndex::delete(&mut mtree, 0).unwrap_err().is_unsupported());

    let canberra = Arc::new(DataRam::<Canberra>::new(vec![1.0; 30], 3).unwrap());
    let err = VaFile::new(canberra, 8, 4096).unwrap().knn_query().unwrap_err();
    assert!(matches!(err, SimIndexError::UnsupportedDistance(..)) && err.is_unsupported());

    let err = builder.set_partitions(6).va_file(Arc::clone(&cloud)).unwrap_err();
    assert!(matches!(err, SimIndexError::InvalidPartitions { partitions: 6 }));
    assert!(err.is_configuration_error());

    let err = builder.set_page_size(8).build_rstar(cloud).unwrap_err();
    assert!(err.is_configuration_error());
}
