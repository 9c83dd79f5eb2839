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

//! The errors that can occur when an index is configured, built or queried.
//! Data access errors are floated up from `PointCloud` and page errors from the `PageStore`.

use core_pages::{PageError, PageId};
use pointcloud::pc_errors::PointCloudError;
use std::error::Error;
use std::fmt;
use std::io;

/// Helper type for a call that could go wrong.
pub type SimIndexResult<T> = Result<T, SimIndexError>;

/// Error type for the indexes.
#[derive(Debug)]
pub enum SimIndexError {
    /// Unable to retrieve some data point from the cloud
    PointCloudError(PointCloudError),
    /// A page was missing or the page size cannot hold a node
    PageError(PageError),
    /// IO error when opening files
    IoError(io::Error),
    /// Parsing error when loading a configuration file
    ParsingError(ParsingError),
    /// Asked for fewer than one neighbor
    InvalidK {
        /// The requested k
        k: usize,
    },
    /// Asked a reverse kNN query for more neighbors than the bounds were built for
    KAboveKMax {
        /// The requested k
        k: usize,
        /// The k the tree maintains bounds for
        k_max: usize,
    },
    /// Asked for more neighbors than the index holds objects
    NotEnoughObjects {
        /// The requested k
        requested: usize,
        /// Objects in the index
        available: usize,
    },
    /// The VA-File partition count has to be a power of two and at least 2
    InvalidPartitions {
        /// The configured partition count
        partitions: usize,
    },
    /// The operation is not implemented for this index
    UnsupportedOperation(&'static str),
    /// The index cannot work with this distance function
    UnsupportedDistance(String),
    /// A stored bound or radius disagrees with a fresh computation
    IntegrityViolation {
        /// The page the check failed on
        page: PageId,
        /// What disagreed
        detail: String,
    },
}

impl SimIndexError {
    /// The caller broke a query contract.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            SimIndexError::InvalidK { .. }
                | SimIndexError::KAboveKMax { .. }
                | SimIndexError::NotEnoughObjects { .. }
        )
    }

    /// The index does not implement this operation or distance.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            SimIndexError::UnsupportedOperation(..) | SimIndexError::UnsupportedDistance(..)
        )
    }

    /// The index was configured with parameters it cannot be built with.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            SimIndexError::PageError(PageError::CapacityTooSmall { .. })
                | SimIndexError::InvalidPartitions { .. }
                | SimIndexError::ParsingError(..)
        )
    }

    pub(crate) fn check_k(k: usize) -> SimIndexResult<()> {
        if k < 1 {
            Err(SimIndexError::InvalidK { k })
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for SimIndexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimIndexError::IoError(e) => write!(f, "{}", e),
            SimIndexError::ParsingError(e) => write!(f, "{}", e),
            SimIndexError::PointCloudError(e) => write!(f, "{}", e),
            SimIndexError::PageError(e) => write!(f, "{}", e),
            SimIndexError::InvalidK { k } => {
                write!(f, "k has to be at least 1, got {}", k)
            }
            SimIndexError::KAboveKMax { k, k_max } => write!(
                f,
                "k has to be equal or less than the k_max of the tree, got {} > {}",
                k, k_max
            ),
            SimIndexError::NotEnoughObjects {
                requested,
                available,
            } => write!(
                f,
                "asked for {} neighbors but only {} objects are indexed",
                requested, available
            ),
            SimIndexError::InvalidPartitions { partitions } => write!(
                f,
                "the number of partitions must be a power of 2, got {}",
                partitions
            ),
            SimIndexError::UnsupportedOperation(op) => write!(f, "{} is not implemented", op),
            SimIndexError::UnsupportedDistance(metric) => {
                write!(f, "{} is not an Lp norm and is not supported", metric)
            }
            SimIndexError::IntegrityViolation { page, detail } => {
                write!(f, "integrity check failed at {}: {}", page, detail)
            }
        }
    }
}

#[allow(deprecated)]
impl Error for SimIndexError {
    fn description(&self) -> &str {
        match self {
            SimIndexError::IoError(e) => e.description(),
            SimIndexError::ParsingError(e) => e.description(),
            SimIndexError::PointCloudError(e) => e.description(),
            SimIndexError::PageError(e) => e.description(),
            SimIndexError::InvalidK { .. } => "k has to be at least 1",
            SimIndexError::KAboveKMax { .. } => "k is above the k_max of the tree",
            SimIndexError::NotEnoughObjects { .. } => "asked for more neighbors than objects",
            SimIndexError::InvalidPartitions { .. } => "the number of partitions must be a power of 2",
            SimIndexError::UnsupportedOperation(..) => "operation is not implemented",
            SimIndexError::UnsupportedDistance(..) => "distance function is not supported",
            SimIndexError::IntegrityViolation { .. } => "integrity check failed",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        match self {
            SimIndexError::IoError(e) => Some(e),
            SimIndexError::ParsingError(e) => Some(e),
            SimIndexError::PointCloudError(e) => Some(e),
            SimIndexError::PageError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PointCloudError> for SimIndexError {
    fn from(err: PointCloudError) -> Self {
        SimIndexError::PointCloudError(err)
    }
}

impl From<PageError> for SimIndexError {
    fn from(err: PageError) -> Self {
        SimIndexError::PageError(err)
    }
}

impl From<io::Error> for SimIndexError {
    fn from(err: io::Error) -> Self {
        SimIndexError::IoError(err)
    }
}

impl From<ParsingError> for SimIndexError {
    fn from(err: ParsingError) -> Self {
        SimIndexError::ParsingError(err)
    }
}

impl From<SimIndexError> for io::Error {
    fn from(err: SimIndexError) -> Self {
        match err {
            SimIndexError::IoError(e) => e,
            e => io::Error::new(io::ErrorKind::Other, Box::new(e)),
        }
    }
}

/// A parsing error occored while reading a configuration
#[derive(Debug)]
pub enum ParsingError {
    /// Yaml was messed up
    MalformedYamlError {
        /// The file that was messed up
        file_name: String,
        /// The value that was messed up
        field: String,
    },
    /// A needed field was missing from the file.
    MissingYamlError {
        /// The file
        file_name: String,
        /// The missing field
        field: String,
    },
    /// Something else happened parsing a string
    RegularParsingError(&'static str),
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParsingError::MalformedYamlError { file_name, field } => {
                write!(f, "there is a error reading the yaml entry {} in {}", field, file_name)
            }
            ParsingError::MissingYamlError { file_name, field } => {
                write!(f, "{} is missing the field {}", file_name, field)
            }
            ParsingError::RegularParsingError(msg) => write!(f, "Error parsing a string: {}", msg),
        }
    }
}

#[allow(deprecated)]
impl Error for ParsingError {
    fn description(&self) -> &str {
        match self {
            ParsingError::MalformedYamlError { .. } => "there is a error reading a yaml entry",
            ParsingError::MissingYamlError { .. } => "not all message fields set",
            ParsingError::RegularParsingError(..) => "Error parsing a string",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        None
    }
}
