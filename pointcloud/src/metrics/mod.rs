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

//! Supported distances. Everything except [`Canberra`] is an Lp norm and can be used
//! by the approximation indexes.

mod lp;
pub use lp::*;
mod canberra;
pub use canberra::*;

/// Per axis gap between a value and an interval, zero inside it.
#[inline]
pub(crate) fn rect_gap(lower: f32, upper: f32, x: f32) -> f32 {
    if x < lower {
        lower - x
    } else if x > upper {
        x - upper
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_traits::Metric;
    use crate::pc_errors::PointCloudError;

    #[test]
    fn l2_rect_is_lower_bound() {
        let metric = L2::default();
        let lower = [0.0, 0.0];
        let upper = [1.0, 1.0];
        let point = [2.0, 3.0];
        let corner = [1.0, 1.0];
        assert_approx_eq!(metric.min_dist_to_rect(&lower, &upper, &point), metric.dist(&corner, &point));
        assert_approx_eq!(metric.min_dist_to_rect(&lower, &upper, &[0.5, 0.5]), 0.0);
    }

    #[test]
    fn l2_rank_is_squared() {
        let metric = L2::default();
        let x = [0.0, 3.0];
        let y = [4.0, 0.0];
        assert_approx_eq!(metric.dist(&x, &y), 5.0);
        assert_approx_eq!(metric.dist_rank(&x, &y), 25.0);
        assert_approx_eq!(metric.rank_to_dist(25.0), 5.0);
    }

    #[test]
    fn lp_matches_named_norms() {
        let x = [0.5, -1.0, 2.0];
        let y = [1.5, 1.0, -2.0];
        assert_approx_eq!(LpNorm::new(1.0).unwrap().dist(&x, &y), L1::default().dist(&x, &y));
        assert_approx_eq!(LpNorm::new(2.0).unwrap().dist(&x, &y), L2::default().dist(&x, &y));
        assert_approx_eq!(Linfty::default().dist(&x, &y), 4.0);
    }

    #[test]
    fn subspace_ignores_other_axes() {
        let metric = SubspaceLpNorm::new(2.0, &[0, 2]).unwrap();
        let x = [0.0, 100.0, 0.0];
        let y = [3.0, -100.0, 4.0];
        assert_approx_eq!(metric.dist(&x, &y), 5.0);
        let params = metric.lp_parameters().unwrap();
        assert_eq!(params.active_dimensions(3), vec![0, 2]);
    }

    #[test]
    fn exponents_below_one_are_rejected() {
        for p in [0.5, 0.0, -2.0, f32::INFINITY, f32::NAN] {
            assert!(matches!(LpNorm::new(p), Err(PointCloudError::ExponentError { .. })));
            assert!(SubspaceLpNorm::new(p, &[0]).is_err());
        }
        assert_eq!(LpNorm::new(1.0).unwrap().p(), 1.0);
    }

    #[test]
    fn canberra_is_not_lp() {
        let metric = Canberra::default();
        assert!(metric.lp_parameters().is_none());
        assert_approx_eq!(metric.dist(&[1.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_approx_eq!(metric.dist(&[1.0], &[3.0]), 0.5);
    }
}
