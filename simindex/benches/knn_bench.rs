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

use pointcloud::data_sources::*;
use pointcloud::*;
use simindex::query_interface::*;
use simindex::*;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_ram_random_test(count: usize, data_dim: usize) -> Arc<DataRam<L2>> {
    Arc::new(
        DataRam::new(
            (0..count * data_dim)
                .map(|_i| rand::random::<f32>())
                .collect(),
            data_dim,
        )
        .unwrap(),
    )
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let pc = build_ram_random_test(5000, 16);
    let point = vec![0.5; 16];
    let mut builder = IndexBuilder::new();
    builder.set_k_max(10);

    let scan = LinearScan::new(Arc::clone(&pc));
    let mtree = builder.build_mtree(Arc::clone(&pc)).unwrap();
    let rstar = builder.build_rstar(Arc::clone(&pc)).unwrap();
    let va = builder.va_file(Arc::clone(&pc)).unwrap();
    let partial = builder.partial_va_file(Arc::clone(&pc)).unwrap();
    let mkmax = builder.build_mkmax(Arc::clone(&pc)).unwrap();

    c.bench_function("Scan knn 10", |b| b.iter(|| scan.knn(black_box(&point), 10)));
    c.bench_function("M-tree knn 10", |b| b.iter(|| mtree.knn(black_box(&point), 10)));
    c.bench_function("R*-tree knn 10", |b| b.iter(|| rstar.knn(black_box(&point), 10)));
    c.bench_function("VA-File knn 10", |b| {
        b.iter(|| va.knn_query().unwrap().knn(black_box(&point), 10))
    });
    c.bench_function("Partial VA-File knn 10", |b| {
        b.iter(|| partial.knn_query().unwrap().knn(black_box(&point), 10))
    });
    c.bench_function("MkMax reverse knn 5", |b| {
        b.iter(|| mkmax.reverse_knn(black_box(0), 5))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
