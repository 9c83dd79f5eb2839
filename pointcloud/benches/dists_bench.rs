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

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_ram_random_test<M: Metric>(count: usize, data_dim: usize, metric: M) -> DataRam<M> {
    DataRam::with_metric(
        (0..count * data_dim)
            .map(|_i| rand::random::<f32>())
            .collect(),
        data_dim,
        metric,
    )
    .unwrap()
}

fn bench_metric<M: Metric>(c: &mut Criterion, name: &str, metric: M) {
    let count = 2000;
    let dim = 64;
    let pc = build_ram_random_test(count, dim, metric);

    let indexes_small: [PointIndex; 9] = [1, 3, 5, 7, 9, 11, 13, 15, 17];
    let indexes_large: Vec<PointIndex> = (0..count).collect();
    let point = vec![0.0; dim];

    c.bench_function(&format!("{}_distances_to_point_small", name), |b| {
        b.iter(|| {
            pc.distances_to_point(black_box(&point), black_box(&indexes_small))
                .unwrap()
        })
    });
    c.bench_function(&format!("{}_distances_to_point_large", name), |b| {
        b.iter(|| {
            pc.distances_to_point(black_box(&point), black_box(&indexes_large))
                .unwrap()
        })
    });
}

fn lp_benchmarks(c: &mut Criterion) {
    bench_metric(c, "L2", L2::default());
    bench_metric(c, "L1", L1::default());
    bench_metric(c, "L3", LpNorm::new(3.0).unwrap());
    bench_metric(c, "Sub_L2", SubspaceLpNorm::new(2.0, &[0, 7, 11, 40]).unwrap());
}

criterion_group!(benches, lp_benchmarks);
criterion_main!(benches);
