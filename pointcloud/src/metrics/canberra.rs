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

use crate::base_traits::Metric;

/// The Canberra distance, a weighted L1. It keeps the default zero rectangle bound.
#[derive(Debug, Clone, Default)]
pub struct Canberra {}

impl Metric for Canberra {
    fn dist(&self, x: &[f32], y: &[f32]) -> f32 {
        x.iter()
            .zip(y)
            .map(|(xi, yi)| {
                let denom = xi.abs() + yi.abs();
                if denom > 0.0 {
                    (xi - yi).abs() / denom
                } else {
                    0.0
                }
            })
            .fold(0.0, |acc, y| acc + y)
    }
}
