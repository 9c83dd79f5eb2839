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

use core_pages::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut store: PageStore<Vec<f32>> = PageStore::new(4096);
    let ids: Vec<PageId> = (0..1000).map(|i| store.allocate(vec![i as f32; 16])).collect();
    c.bench_function("read 1000 pages", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for id in &ids {
                total += store.read(black_box(*id)).unwrap()[0];
            }
            total
        })
    });
    let layout = PageLayout::new(4096);
    c.bench_function("capacity", |b| {
        b.iter(|| layout.capacity("leaf", black_box(24)).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
