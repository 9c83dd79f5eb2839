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

//! Splitting an overflowing M-tree node.
//!
//! The two routing objects are promoted by the M_LB_DIST policy, the pair of entries furthest
//! apart. The entries are then handed out in a balanced way: both sides alternately take their
//! closest remaining entry, so each side ends up with at least half of them.

use super::node::MTreeEntry;
use crate::errors::SimIndexResult;
use pointcloud::PointIndex;

/// The two halves of a split node.
#[derive(Debug)]
pub(crate) struct Assignments<E> {
    pub(crate) first_routing_object: PointIndex,
    pub(crate) first_covering_radius: f32,
    pub(crate) first: Vec<E>,
    pub(crate) second_routing_object: PointIndex,
    pub(crate) second_covering_radius: f32,
    pub(crate) second: Vec<E>,
}

/// Splits the entries. `dist` measures two routing objects. The parent distances of the
/// returned entries are relative to their new routing object.
pub(crate) fn mlb_dist_split<E, F>(entries: Vec<E>, mut dist: F) -> SimIndexResult<Assignments<E>>
where
    E: MTreeEntry,
    F: FnMut(PointIndex, PointIndex) -> SimIndexResult<f32>,
{
    let n = entries.len();
    let mut dists = vec![0.0f32; n * n];
    let (mut first, mut second) = (0, n.saturating_sub(1));
    let mut current_max = f32::NEG_INFINITY;
    for i in 0..n {
        for j in (i + 1)..n {
            let d = dist(entries[i].routing_object(), entries[j].routing_object())?;
            dists[i * n + j] = d;
            dists[j * n + i] = d;
            if d >= current_max {
                first = i;
                second = j;
                current_max = d;
            }
        }
    }

    let mut by_first: Vec<usize> = (0..n).collect();
    by_first.sort_by(|a, b| dists[first * n + a].total_cmp(&dists[first * n + b]));
    let mut by_second: Vec<usize> = (0..n).collect();
    by_second.sort_by(|a, b| dists[second * n + a].total_cmp(&dists[second * n + b]));

    let mut assigned = vec![false; n];
    let mut first_entries = Vec::with_capacity(n / 2 + 1);
    let mut second_entries = Vec::with_capacity(n / 2 + 1);
    let mut first_radius = 0.0f32;
    let mut second_radius = 0.0f32;
    let (mut fi, mut si) = (by_first.iter(), by_second.iter());
    let mut remaining = n;
    while remaining > 0 {
        if let Some(i) = fi.by_ref().find(|i| !assigned[**i]) {
            assigned[*i] = true;
            remaining -= 1;
            let d = dists[first * n + i];
            let mut entry = entries[*i].clone();
            first_radius = first_radius.max(d + entry.covering_radius());
            entry.set_parent_distance(d);
            first_entries.push(entry);
        }
        if remaining == 0 {
            break;
        }
        if let Some(i) = si.by_ref().find(|i| !assigned[**i]) {
            assigned[*i] = true;
            remaining -= 1;
            let d = dists[second * n + i];
            let mut entry = entries[*i].clone();
            second_radius = second_radius.max(d + entry.covering_radius());
            entry.set_parent_distance(d);
            second_entries.push(entry);
        }
    }

    Ok(Assignments {
        first_routing_object: entries[first].routing_object(),
        first_covering_radius: first_radius,
        first: first_entries,
        second_routing_object: entries[second].routing_object(),
        second_covering_radius: second_radius,
        second: second_entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtree::node::LeafEntry;

    fn line_entries(xs: &[f32]) -> (Vec<LeafEntry<()>>, Vec<f32>) {
        let entries = (0..xs.len())
            .map(|i| LeafEntry {
                object: i,
                parent_distance: f32::NAN,
                bound: (),
            })
            .collect();
        (entries, xs.to_vec())
    }

    #[test]
    fn promotes_furthest_pair_and_balances() {
        let (entries, xs) = line_entries(&[0.0, 0.1, 0.2, 5.0, 5.1, 10.0, 0.05]);
        let split = mlb_dist_split(entries, |a, b| Ok((xs[a] - xs[b]).abs())).unwrap();
        let mut promoted = vec![split.first_routing_object, split.second_routing_object];
        promoted.sort();
        assert_eq!(promoted, vec![0, 5]);
        assert_eq!(split.first.len(), 4);
        assert_eq!(split.second.len(), 3);
        for e in split.first.iter() {
            let d = (xs[e.object] - xs[split.first_routing_object]).abs();
            assert_approx_eq!(e.parent_distance, d);
            assert!(d <= split.first_covering_radius);
        }
        for e in split.second.iter() {
            let d = (xs[e.object] - xs[split.second_routing_object]).abs();
            assert_approx_eq!(e.parent_distance, d);
            assert!(d <= split.second_covering_radius);
        }
    }

    #[test]
    fn duplicates_still_split_evenly() {
        let (entries, xs) = line_entries(&[1.0; 6]);
        let split = mlb_dist_split(entries, |a, b| Ok((xs[a] - xs[b]).abs())).unwrap();
        assert_eq!(split.first.len(), 3);
        assert_eq!(split.second.len(), 3);
        assert_eq!(split.first_covering_radius, 0.0);
    }
}
