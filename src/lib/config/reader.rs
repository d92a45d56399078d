// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{DeviceType, NetplanError, NetworkDefinition};

/// Parsed declared configuration, keyed by definition id.
#[derive(Debug, Clone, PartialEq, Default)]
#[non_exhaustive]
pub struct NetplanState {
    pub definitions: BTreeMap<String, NetworkDefinition>,
}

impl NetplanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, def: NetworkDefinition) {
        self.definitions.insert(def.id.clone(), def);
    }

    pub fn get(&self, id: &str) -> Option<&NetworkDefinition> {
        self.definitions.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkDefinition> {
        self.definitions.values()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn physical(&self) -> impl Iterator<Item = &NetworkDefinition> {
        self.iter().filter(|d| d.device_type.is_physical())
    }

    pub fn of_type(
        &self,
        device_type: DeviceType,
    ) -> impl Iterator<Item = &NetworkDefinition> {
        self.iter().filter(move |d| d.device_type == device_type)
    }
}

/// Source of the declared configuration.
pub trait ConfigReader {
    /// Load the configuration hierarchy under `root_dir`.
    fn load_hierarchy(
        &self,
        root_dir: &Path,
    ) -> Result<NetplanState, NetplanError>;

    /// Load the hierarchy plus `extra_files` parsed last, so they override.
    fn load_with_files(
        &self,
        root_dir: &Path,
        extra_files: &[PathBuf],
    ) -> Result<NetplanState, NetplanError>;
}

/// In-memory configuration, returned whatever the root directory is.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigReader {
    state: NetplanState,
}

impl StaticConfigReader {
    pub fn new(state: NetplanState) -> Self {
        Self { state }
    }
}

impl ConfigReader for StaticConfigReader {
    fn load_hierarchy(&self, _: &Path) -> Result<NetplanState, NetplanError> {
        Ok(self.state.clone())
    }

    fn load_with_files(
        &self,
        root_dir: &Path,
        _: &[PathBuf],
    ) -> Result<NetplanState, NetplanError> {
        self.load_hierarchy(root_dir)
    }
}
