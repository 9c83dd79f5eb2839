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

//! Axis aligned minimum bounding rectangles.

use serde::{Deserialize, Serialize};

/// An axis aligned box `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperBoundingBox {
    /// Lower corner
    pub min: Vec<f32>,
    /// Upper corner
    pub max: Vec<f32>,
}

impl HyperBoundingBox {
    /// The degenerate box around one point.
    pub fn from_point(point: &[f32]) -> HyperBoundingBox {
        HyperBoundingBox {
            min: point.to_vec(),
            max: point.to_vec(),
        }
    }

    /// Number of axes
    pub fn dim(&self) -> usize {
        self.min.len()
    }

    /// The smallest box containing both.
    pub fn union(&self, other: &HyperBoundingBox) -> HyperBoundingBox {
        let mut union = self.clone();
        union.extend(other);
        union
    }

    /// Grows this box to contain `other`.
    pub fn extend(&mut self, other: &HyperBoundingBox) {
        for (m, o) in self.min.iter_mut().zip(&other.min) {
            *m = m.min(*o);
        }
        for (m, o) in self.max.iter_mut().zip(&other.max) {
            *m = m.max(*o);
        }
    }

    /// Grows this box to contain `point`.
    pub fn extend_point(&mut self, point: &[f32]) {
        for ((l, u), x) in self.min.iter_mut().zip(self.max.iter_mut()).zip(point) {
            *l = l.min(*x);
            *u = u.max(*x);
        }
    }

    /// The volume
    pub fn area(&self) -> f32 {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(l, u)| u - l)
            .product()
    }

    /// Sum of the edge lengths
    pub fn margin(&self) -> f32 {
        self.min.iter().zip(&self.max).map(|(l, u)| u - l).sum()
    }

    /// The volume of the intersection, 0 if they are disjoint.
    pub fn overlap(&self, other: &HyperBoundingBox) -> f32 {
        let mut volume = 1.0;
        for i in 0..self.dim() {
            let extent = self.max[i].min(other.max[i]) - self.min[i].max(other.min[i]);
            if extent <= 0.0 {
                return 0.0;
            }
            volume *= extent;
        }
        volume
    }

    /// How much the volume grows when `other` is added.
    pub fn enlargement(&self, other: &HyperBoundingBox) -> f32 {
        self.union(other).area() - self.area()
    }

    /// Closed containment
    pub fn contains_point(&self, point: &[f32]) -> bool {
        self.min
            .iter()
            .zip(&self.max)
            .zip(point)
            .all(|((l, u), x)| l <= x && x <= u)
    }

    /// If `other` lies inside this box.
    pub fn contains(&self, other: &HyperBoundingBox) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// The midpoint
    pub fn center(&self) -> Vec<f32> {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(l, u)| (l + u) / 2.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bb(min: &[f32], max: &[f32]) -> HyperBoundingBox {
        HyperBoundingBox {
            min: min.to_vec(),
            max: max.to_vec(),
        }
    }

    #[test]
    fn measures() {
        let b = bb(&[0.0, 0.0], &[2.0, 3.0]);
        assert_approx_eq!(b.area(), 6.0);
        assert_approx_eq!(b.margin(), 5.0);
        assert_eq!(b.center(), vec![1.0, 1.5]);
    }

    #[test]
    fn overlap_and_enlargement() {
        let a = bb(&[0.0, 0.0], &[2.0, 2.0]);
        let b = bb(&[1.0, 1.0], &[3.0, 3.0]);
        let c = bb(&[5.0, 5.0], &[6.0, 6.0]);
        assert_approx_eq!(a.overlap(&b), 1.0);
        assert_approx_eq!(a.overlap(&c), 0.0);
        assert_approx_eq!(a.enlargement(&b), 5.0);
        assert!(a.union(&b).contains(&b));
    }

    #[test]
    fn points_extend() {
        let mut b = HyperBoundingBox::from_point(&[1.0, 1.0]);
        assert_approx_eq!(b.area(), 0.0);
        b.extend_point(&[0.0, 2.0]);
        assert!(b.contains_point(&[0.5, 1.5]));
        assert!(!b.contains_point(&[1.5, 1.5]));
    }
}
