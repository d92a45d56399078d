// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use serde::Serialize;

use crate::{GlobPattern, NetplanError};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
pub enum Backend {
    #[serde(rename = "networkd")]
    Networkd,
    NetworkManager,
    #[serde(rename = "ovs")]
    Ovs,
}

impl Backend {
    pub const ALL: [Self; 3] =
        [Self::Networkd, Self::NetworkManager, Self::Ovs];

    /// Directory holding the generated files and the pattern they follow.
    fn artifact_location(&self) -> (&'static str, &'static str) {
        match self {
            Self::Networkd => ("run/systemd/network", "*netplan-*"),
            Self::NetworkManager => {
                ("run/NetworkManager/system-connections", "netplan-*")
            }
            Self::Ovs => ("run/systemd/system", "netplan-ovs-*"),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Networkd => "networkd",
                Self::NetworkManager => "NetworkManager",
                Self::Ovs => "OpenVSwitch",
            }
        )
    }
}

/// Which backends currently have generated artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub struct ArtifactSet {
    pub networkd: bool,
    pub network_manager: bool,
    pub ovs: bool,
}

impl ArtifactSet {
    pub fn new(networkd: bool, network_manager: bool, ovs: bool) -> Self {
        Self {
            networkd,
            network_manager,
            ovs,
        }
    }

    pub fn scan(root_dir: &Path) -> Result<Self, NetplanError> {
        let mut ret = Self::default();
        for backend in Backend::ALL {
            let (dir, pattern) = backend.artifact_location();
            let pattern = GlobPattern::new(pattern)?;
            let found = dir_has_match(&root_dir.join(dir), &pattern)?;
            ret.set(backend, found);
        }
        log::debug!(
            "Generated artifacts under {}: {ret:?}",
            root_dir.display()
        );
        Ok(ret)
    }

    pub fn has(&self, backend: Backend) -> bool {
        match backend {
            Backend::Networkd => self.networkd,
            Backend::NetworkManager => self.network_manager,
            Backend::Ovs => self.ovs,
        }
    }

    fn set(&mut self, backend: Backend, value: bool) {
        match backend {
            Backend::Networkd => self.networkd = value,
            Backend::NetworkManager => self.network_manager = value,
            Backend::Ovs => self.ovs = value,
        }
    }
}

fn dir_has_match(
    dir: &Path,
    pattern: &GlobPattern,
) -> Result<bool, NetplanError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if pattern.is_match(name) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
