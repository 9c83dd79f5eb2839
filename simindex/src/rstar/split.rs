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

//! The R* topological split.
//!
//! For every axis the entries are sorted by their lower and by their upper bound and every
//! distribution that leaves at least `min_fill` entries on both sides is measured. The split axis
//! has the smallest sum of margins, on it the distribution with the least overlap wins, ties broken
//! by the smaller total area.

use super::mbr::HyperBoundingBox;

/// A distribution of sorted entries, the first `split_at` go to the first node.
struct Distribution {
    order: Vec<usize>,
    split_at: usize,
    overlap: f32,
    area: f32,
}

/// Boxes around every prefix and every suffix of `order`.
fn prefix_suffix(
    mbrs: &[HyperBoundingBox],
    order: &[usize],
) -> (Vec<HyperBoundingBox>, Vec<HyperBoundingBox>) {
    let n = order.len();
    let mut prefix = Vec::with_capacity(n);
    let mut running = mbrs[order[0]].clone();
    for i in order {
        running.extend(&mbrs[*i]);
        prefix.push(running.clone());
    }
    let mut suffix = Vec::with_capacity(n);
    let mut running = mbrs[order[n - 1]].clone();
    for i in order.iter().rev() {
        running.extend(&mbrs[*i]);
        suffix.push(running.clone());
    }
    suffix.reverse();
    (prefix, suffix)
}

/// Splits the entries into two groups of at least `min_fill`.
pub(crate) fn topological_split<T>(
    entries: Vec<(HyperBoundingBox, T)>,
    min_fill: usize,
) -> (Vec<(HyperBoundingBox, T)>, Vec<(HyperBoundingBox, T)>) {
    let n = entries.len();
    let min_fill = min_fill.max(1).min(n / 2);
    let mbrs: Vec<HyperBoundingBox> = entries.iter().map(|(m, _)| m.clone()).collect();
    let dim = mbrs.first().map(|m| m.dim()).unwrap_or(0);

    let mut best_axis: Option<(f32, Vec<Vec<usize>>)> = None;
    for axis in 0..dim {
        let mut by_lower: Vec<usize> = (0..n).collect();
        by_lower.sort_by(|a, b| {
            mbrs[*a].min[axis]
                .total_cmp(&mbrs[*b].min[axis])
                .then(mbrs[*a].max[axis].total_cmp(&mbrs[*b].max[axis]))
        });
        let mut by_upper: Vec<usize> = (0..n).collect();
        by_upper.sort_by(|a, b| {
            mbrs[*a].max[axis]
                .total_cmp(&mbrs[*b].max[axis])
                .then(mbrs[*a].min[axis].total_cmp(&mbrs[*b].min[axis]))
        });
        let mut margin_sum = 0.0;
        for order in [&by_lower, &by_upper] {
            let (prefix, suffix) = prefix_suffix(&mbrs, order);
            for k in min_fill..=(n - min_fill) {
                margin_sum += prefix[k - 1].margin() + suffix[k].margin();
            }
        }
        if best_axis.as_ref().map_or(true, |(s, _)| margin_sum < *s) {
            best_axis = Some((margin_sum, vec![by_lower, by_upper]));
        }
    }

    let mut best: Option<Distribution> = None;
    let orders = best_axis.map(|(_, o)| o).unwrap_or_else(|| vec![(0..n).collect()]);
    for order in orders {
        let (prefix, suffix) = prefix_suffix(&mbrs, &order);
        for k in min_fill..=(n - min_fill) {
            let overlap = prefix[k - 1].overlap(&suffix[k]);
            let area = prefix[k - 1].area() + suffix[k].area();
            let better = match &best {
                None => true,
                Some(b) => overlap < b.overlap || (overlap == b.overlap && area < b.area),
            };
            if better {
                best = Some(Distribution {
                    order: order.clone(),
                    split_at: k,
                    overlap,
                    area,
                });
            }
        }
    }

    let (order, split_at) = match best {
        Some(b) => (b.order, b.split_at),
        None => ((0..n).collect(), n / 2),
    };
    let mut slots: Vec<Option<(HyperBoundingBox, T)>> = entries.into_iter().map(Some).collect();
    let mut first = Vec::with_capacity(split_at);
    let mut second = Vec::with_capacity(n - split_at);
    for (rank, i) in order.iter().enumerate() {
        if let Some(entry) = slots[*i].take() {
            if rank < split_at {
                first.push(entry);
            } else {
                second.push(entry);
            }
        }
    }
    (first, second)
}
