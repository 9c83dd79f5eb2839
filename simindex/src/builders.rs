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

//! Configuration for every index, in the manner of a tree builder: defaults, chained setters and
//! a yaml loader.

use crate::errors::*;
use crate::mtree::*;
use crate::rstar::{RStarTree, RdKnnTree};
use crate::vafile::{PartialVaFile, VaFile};
use log::debug;
use pointcloud::*;
use std::fs::read_to_string;
use std::path::Path;
use std::sync::Arc;
use yaml_rust::{Yaml, YamlLoader};

/// Page size in bytes when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 4096;
/// Largest reverse kNN `k` when nothing else is configured.
pub const DEFAULT_K_MAX: usize = 10;
/// VA-File cells per dimension when nothing else is configured.
pub const DEFAULT_PARTITIONS: usize = 16;

/// A construction object for the indexes.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    pub(crate) page_size: usize,
    pub(crate) k_max: usize,
    pub(crate) partitions: usize,
    pub(crate) verbosity: u32,
}

impl Default for IndexBuilder {
    fn default() -> IndexBuilder {
        IndexBuilder {
            page_size: DEFAULT_PAGE_SIZE,
            k_max: DEFAULT_K_MAX,
            partitions: DEFAULT_PARTITIONS,
            verbosity: 0,
        }
    }
}

fn yaml_usize(params: &Yaml, field: &str, file_name: &str, default: usize) -> SimIndexResult<usize> {
    match &params[field] {
        Yaml::BadValue => Ok(default),
        Yaml::Integer(i) if *i >= 0 => Ok(*i as usize),
        _ => Err(ParsingError::MalformedYamlError {
            file_name: file_name.to_string(),
            field: field.to_string(),
        }
        .into()),
    }
}

impl IndexBuilder {
    /// Creates a new builder with sensible defaults.
    pub fn new() -> IndexBuilder {
        IndexBuilder::default()
    }

    /// Creates a builder from a yaml file. Missing keys keep their defaults.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> SimIndexResult<Self> {
        let file_name = path.as_ref().to_string_lossy().to_string();
        let config = read_to_string(&path)?;
        IndexBuilder::from_yaml_str(&config, &file_name)
    }

    pub(crate) fn from_yaml_str(config: &str, file_name: &str) -> SimIndexResult<Self> {
        let params_files = YamlLoader::load_from_str(config).map_err(|_| {
            ParsingError::MalformedYamlError {
                file_name: file_name.to_string(),
                field: "document".to_string(),
            }
        })?;
        let params = match params_files.first() {
            Some(params) => params,
            None => {
                return Err(ParsingError::MissingYamlError {
                    file_name: file_name.to_string(),
                    field: "document".to_string(),
                }
                .into())
            }
        };
        let builder = IndexBuilder {
            page_size: yaml_usize(params, "page_size", file_name, DEFAULT_PAGE_SIZE)?,
            k_max: yaml_usize(params, "k_max", file_name, DEFAULT_K_MAX)?,
            partitions: yaml_usize(params, "partitions", file_name, DEFAULT_PARTITIONS)?,
            verbosity: yaml_usize(params, "verbosity", file_name, 0)? as u32,
        };
        debug!("Loaded {:?} from {}", builder, file_name);
        Ok(builder)
    }

    /// Bytes per node, decides node capacities and the page rounding of scanned bytes.
    pub fn set_page_size(&mut self, x: usize) -> &mut Self {
        self.page_size = x;
        self
    }
    /// The largest `k` reverse kNN queries can ask for.
    pub fn set_k_max(&mut self, x: usize) -> &mut Self {
        self.k_max = x;
        self
    }
    /// VA-File cells per dimension, a power of two.
    pub fn set_partitions(&mut self, x: usize) -> &mut Self {
        self.partitions = x;
        self
    }
    /// Above 1, bulk loads print progress.
    pub fn set_verbosity(&mut self, x: u32) -> &mut Self {
        self.verbosity = x;
        self
    }

    /// An empty plain M-tree.
    pub fn mtree<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<MTree<D, ()>> {
        let mut tree = MTree::new(point_cloud, self.page_size, 1)?;
        tree.set_verbosity(self.verbosity);
        Ok(tree)
    }

    /// A plain M-tree over every object of the cloud.
    pub fn build_mtree<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<MTree<D, ()>> {
        let ids = point_cloud.reference_indexes();
        let mut tree = self.mtree(point_cloud)?;
        tree.insert_all(&ids)?;
        Ok(tree)
    }

    /// An empty MkMax tree.
    pub fn mkmax<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<MkMaxTree<D>> {
        let mut tree = MkMaxTree::new(point_cloud, self.page_size, self.k_max)?;
        tree.set_verbosity(self.verbosity);
        Ok(tree)
    }

    /// An MkMax tree bulk loaded with every object of the cloud.
    pub fn build_mkmax<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<MkMaxTree<D>> {
        let ids = point_cloud.reference_indexes();
        let mut tree = self.mkmax(point_cloud)?;
        tree.insert_all(&ids)?;
        Ok(tree)
    }

    /// An empty MkTab tree. It can only be filled once, with `insert_all`.
    pub fn mktab<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<MkTabTree<D>> {
        let mut tree = MkTabTree::new(point_cloud, self.page_size, self.k_max)?;
        tree.set_verbosity(self.verbosity);
        Ok(tree)
    }

    /// An MkTab tree bulk loaded with every object of the cloud.
    pub fn build_mktab<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<MkTabTree<D>> {
        let ids = point_cloud.reference_indexes();
        let mut tree = self.mktab(point_cloud)?;
        tree.insert_all(&ids)?;
        Ok(tree)
    }

    /// An empty R*-tree.
    pub fn rstar<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<RStarTree<D>> {
        RStarTree::new(point_cloud, self.page_size)
    }

    /// An R*-tree with every object of the cloud inserted.
    pub fn build_rstar<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<RStarTree<D>> {
        let ids = point_cloud.reference_indexes();
        let mut tree = self.rstar(point_cloud)?;
        tree.insert_all(&ids)?;
        Ok(tree)
    }

    /// An empty R*-tree with `k_max`-NN distance bounds for reverse kNN queries.
    pub fn rdknn<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<RdKnnTree<D>> {
        RdKnnTree::new(point_cloud, self.page_size, self.k_max)
    }

    /// An R*-tree with reverse kNN bounds over every object of the cloud.
    pub fn build_rdknn<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<RdKnnTree<D>> {
        let ids = point_cloud.reference_indexes();
        let mut tree = self.rdknn(point_cloud)?;
        tree.insert_all(&ids)?;
        Ok(tree)
    }

    /// A VA-File over every object of the cloud.
    pub fn va_file<D: PointCloud>(&self, point_cloud: Arc<D>) -> SimIndexResult<VaFile<D>> {
        VaFile::new(point_cloud, self.partitions, self.page_size)
    }

    /// A partial VA-File over every object of the cloud.
    pub fn partial_va_file<D: PointCloud>(
        &self,
        point_cloud: Arc<D>,
    ) -> SimIndexResult<PartialVaFile<D>> {
        PartialVaFile::new(point_cloud, self.partitions, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtree::tests::random_cloud;

    #[test]
    fn yaml_overrides_defaults() {
        let builder = IndexBuilder::from_yaml_str("page_size: 1024\nk_max: 4\n", "test.yml").unwrap();
        assert_eq!(builder.page_size, 1024);
        assert_eq!(builder.k_max, 4);
        assert_eq!(builder.partitions, DEFAULT_PARTITIONS);
        assert_eq!(builder.verbosity, 0);
    }

    #[test]
    fn malformed_yaml_is_a_parsing_error() {
        let err = IndexBuilder::from_yaml_str("partitions: many\n", "test.yml").unwrap_err();
        assert!(matches!(
            err,
            SimIndexError::ParsingError(ParsingError::MalformedYamlError { .. })
        ));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = IndexBuilder::from_yaml("/nonexistent/simindex.yml").unwrap_err();
        assert!(matches!(err, SimIndexError::IoError(..)));
    }

    #[test]
    fn builds_every_index() {
        let cloud = random_cloud(120, 3, 12);
        let mut builder = IndexBuilder::new();
        builder.set_page_size(512).set_k_max(3).set_partitions(4);
        assert_eq!(builder.build_mtree(Arc::clone(&cloud)).unwrap().len(), 120);
        builder.build_mkmax(Arc::clone(&cloud)).unwrap().integrity_check().unwrap();
        builder.build_mktab(Arc::clone(&cloud)).unwrap().integrity_check().unwrap();
        builder.build_rstar(Arc::clone(&cloud)).unwrap().check_structure().unwrap();
        builder.build_rdknn(Arc::clone(&cloud)).unwrap().integrity_check().unwrap();
        assert_eq!(builder.va_file(Arc::clone(&cloud)).unwrap().len(), 120);
        assert_eq!(builder.partial_va_file(cloud).unwrap().partitions(), 4);
    }

    #[test]
    fn tiny_pages_fail_at_construction() {
        let cloud = random_cloud(10, 3, 0);
        let err = IndexBuilder::new().set_page_size(16).mkmax(cloud).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
