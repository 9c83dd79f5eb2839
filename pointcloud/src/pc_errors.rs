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

//! The errors that can occur when a point cloud is built or accessed.
use std::error::Error;
use std::fmt;

/// Result alias for point cloud operations
pub type PointCloudResult<T> = Result<T, PointCloudError>;

/// Error type for the point cloud
#[derive(Debug)]
pub enum PointCloudError {
    /// Unable to retrieve some data point (given by index) from a cloud (cloud name)
    DataAccessError {
        /// Index of access error
        index: usize,
        /// Cloud that had the access error
        cloud_name: String,
    },
    /// The flat buffer handed over does not split into rows of the stated dimension
    ShapeError {
        /// Length of the flat buffer
        len: usize,
        /// The stated dimension
        dim: usize,
    },
    /// A metric was asked to restrict itself to a dimension the data does not have
    SubspaceError {
        /// The offending dimension
        dimension: usize,
        /// The dimensionality of the data
        dim: usize,
    },
    /// An Lp norm with an exponent that is not finite or below 1
    ExponentError {
        /// The rejected exponent
        p: f32,
    },
}

impl fmt::Display for PointCloudError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PointCloudError::DataAccessError { index, cloud_name } => write!(
                f,
                "there was an issue grabbing point {} from {}",
                index, cloud_name
            ),
            PointCloudError::ShapeError { len, dim } => write!(
                f,
                "a buffer of {} floats cannot be split into points of dimension {}",
                len, dim
            ),
            PointCloudError::SubspaceError { dimension, dim } => write!(
                f,
                "subspace dimension {} is outside of the data dimension {}",
                dimension, dim
            ),
            PointCloudError::ExponentError { p } => {
                write!(f, "an Lp norm needs a finite p >= 1, got {}", p)
            }
        }
    }
}

#[allow(deprecated)]
impl Error for PointCloudError {
    fn description(&self) -> &str {
        match self {
            PointCloudError::DataAccessError { .. } => "there was an issue grabbing a data point",
            PointCloudError::ShapeError { .. } => "the data buffer has the wrong shape",
            PointCloudError::SubspaceError { .. } => "the subspace does not fit the data",
            PointCloudError::ExponentError { .. } => "the Lp exponent is not a metric",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        None
    }
}

impl PointCloudError {
    /// If we can't get an element from a cloud, gives the index and cloud name
    pub fn data_access(index: usize, cloud_name: String) -> PointCloudError {
        PointCloudError::DataAccessError { index, cloud_name }
    }
}
