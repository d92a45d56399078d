// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::{DeviceType, MatchCandidate, NetplanError};

const SYSFS_NET_DIR: &str = "sys/class/net";

/// Interface currently visible to the OS, as needed for rename decisions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct SystemInterface {
    pub name: String,
    pub mac_address: Option<String>,
    pub driver: Option<String>,
    /// Controller interface this one is enslaved to.
    pub master: Option<String>,
    pub kind: DeviceType,
}

impl SystemInterface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl MatchCandidate for SystemInterface {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn mac_address(&self) -> Option<&str> {
        self.mac_address.as_deref()
    }

    fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }
}

pub trait LinkInventory {
    fn interfaces(&self) -> Result<Vec<SystemInterface>, NetplanError>;
}

/// Names of the interfaces enslaved to a bridge or a bond.
pub(crate) fn composite_members(
    ifaces: &[SystemInterface],
) -> BTreeSet<String> {
    let kinds: BTreeMap<&str, DeviceType> =
        ifaces.iter().map(|i| (i.name.as_str(), i.kind)).collect();
    ifaces
        .iter()
        .filter(|i| {
            i.master
                .as_deref()
                .and_then(|m| kinds.get(m))
                .map(|k| matches!(k, DeviceType::Bridge | DeviceType::Bond))
                .unwrap_or_default()
        })
        .map(|i| i.name.clone())
        .collect()
}

fn link_target_name(path: &Path) -> Option<String> {
    std::fs::read_link(path)
        .ok()?
        .file_name()?
        .to_str()
        .map(|s| s.to_string())
}

pub(crate) fn sysfs_driver(root_dir: &Path, name: &str) -> Option<String> {
    link_target_name(
        &root_dir.join(SYSFS_NET_DIR).join(name).join("device/driver"),
    )
}

pub(crate) fn sysfs_is_wireless(root_dir: &Path, name: &str) -> bool {
    root_dir
        .join(SYSFS_NET_DIR)
        .join(name)
        .join("wireless")
        .is_dir()
}

/// Reads `<root>/sys/class/net`.
#[derive(Debug, Clone)]
pub struct SysfsInventory {
    root_dir: PathBuf,
}

impl SysfsInventory {
    pub fn new(root_dir: &Path) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
        }
    }

    fn read_iface(&self, dir: &Path, name: &str) -> SystemInterface {
        let mut iface = SystemInterface::new(name);
        iface.mac_address = std::fs::read_to_string(dir.join("address"))
            .ok()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty());
        iface.driver = sysfs_driver(&self.root_dir, name);
        iface.master = link_target_name(&dir.join("master"));
        iface.kind = if dir.join("bridge").is_dir() {
            DeviceType::Bridge
        } else if dir.join("bonding").is_dir() {
            DeviceType::Bond
        } else if sysfs_is_wireless(&self.root_dir, name) {
            DeviceType::Wifi
        } else if dir.join("device").exists() {
            DeviceType::Ethernet
        } else {
            DeviceType::Unknown
        };
        iface
    }
}

impl LinkInventory for SysfsInventory {
    fn interfaces(&self) -> Result<Vec<SystemInterface>, NetplanError> {
        let net_dir = self.root_dir.join(SYSFS_NET_DIR);
        let entries = match std::fs::read_dir(&net_dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} does not exist", net_dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut ret = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(|s| s.to_string())
            else {
                continue;
            };
            ret.push(self.read_iface(&entry.path(), &name));
        }
        ret.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ret)
    }
}
