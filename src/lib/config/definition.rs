// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    config::GlobPattern, route::DeclaredRoute, InterfaceIpAddr,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum DeviceType {
    Ethernet,
    Wifi,
    Modem,
    Bridge,
    Bond,
    Vlan,
    Vrf,
    Tunnel,
    Dummy,
    Veth,
    NmDevice,
    Loopback,
    Unknown,
}

impl Default for DeviceType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Ethernet => "ethernet",
                Self::Wifi => "wifi",
                Self::Modem => "modem",
                Self::Bridge => "bridge",
                Self::Bond => "bond",
                Self::Vlan => "vlan",
                Self::Vrf => "vrf",
                Self::Tunnel => "tunnel",
                Self::Dummy => "dummy",
                Self::Veth => "veth",
                Self::NmDevice => "nm-device",
                Self::Loopback => "loopback",
                Self::Unknown => "unknown",
            }
        )
    }
}

impl DeviceType {
    const PHYSICAL_TYPES: [Self; 3] = [Self::Ethernet, Self::Wifi, Self::Modem];
    const COMPOSITE_TYPES: [Self; 3] = [Self::Bridge, Self::Bond, Self::Vrf];

    /// Hardware backed devices, the only ones that can be renamed.
    pub fn is_physical(&self) -> bool {
        Self::PHYSICAL_TYPES.contains(self)
    }

    pub fn is_composite(&self) -> bool {
        Self::COMPOSITE_TYPES.contains(self)
    }

    /// Devices created in software by the backend.
    pub fn is_virtual(&self) -> bool {
        !self.is_physical()
            && !matches!(self, Self::NmDevice | Self::Loopback | Self::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[non_exhaustive]
pub enum Renderer {
    #[default]
    #[serde(rename = "networkd")]
    Networkd,
    NetworkManager,
}

impl std::fmt::Display for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Networkd => "networkd",
                Self::NetworkManager => "NetworkManager",
            }
        )
    }
}

/// Anything a match rule can be evaluated against.
pub trait MatchCandidate {
    fn name(&self) -> &str;
    fn mac_address(&self) -> Option<&str>;
    fn driver(&self) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub struct MatchRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<GlobPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub driver: Vec<GlobPattern>,
}

impl MatchRule {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.mac_address.is_none()
            && self.driver.is_empty()
    }

    pub fn matches<C: MatchCandidate + ?Sized>(&self, candidate: &C) -> bool {
        if let Some(name) = self.name.as_ref() {
            if !name.is_match(candidate.name()) {
                return false;
            }
        }
        if let Some(mac) = self.mac_address.as_ref() {
            match candidate.mac_address() {
                Some(cur) if cur.eq_ignore_ascii_case(mac) => (),
                _ => return false,
            }
        }
        if !self.driver.is_empty() {
            match candidate.driver() {
                Some(driver) => {
                    if !self.driver.iter().any(|d| d.is_match(driver)) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    /// Narrow the candidates step by step: name glob, MAC, then driver.
    pub fn narrow<'a, C: MatchCandidate>(
        &self,
        candidates: &'a [C],
    ) -> Vec<&'a C> {
        let mut ret: Vec<&C> = candidates.iter().collect();
        if let Some(name) = self.name.as_ref() {
            ret.retain(|c| name.is_match(c.name()));
        }
        if let Some(mac) = self.mac_address.as_ref() {
            ret.retain(|c| {
                c.mac_address()
                    .map(|cur| cur.eq_ignore_ascii_case(mac))
                    .unwrap_or_default()
            });
        }
        if !self.driver.is_empty() {
            ret.retain(|c| {
                c.driver()
                    .map(|d| self.driver.iter().any(|p| p.is_match(d)))
                    .unwrap_or_default()
            });
        }
        ret
    }
}

/// References from one definition to others, by declared id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub struct LinkRelations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bond: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sriov_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub struct Nameservers {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search: Vec<String>,
}

/// One declared interface. Read only for everything in this crate.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[non_exhaustive]
pub struct NetworkDefinition {
    pub id: String,
    pub device_type: DeviceType,
    pub renderer: Renderer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_rule: Option<MatchRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
    pub critical: bool,
    pub links: LinkRelations,
    /// Ids of the definitions enslaved to this composite.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub members: BTreeSet<String>,
    pub dhcp4: bool,
    pub dhcp6: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<InterfaceIpAddr>,
    pub nameservers: Nameservers,
    #[serde(skip)]
    pub routes: Vec<DeclaredRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Set whenever a `parameters` mapping is declared, even an empty one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, serde_yaml::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_switch_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vf_count: Option<u32>,
}

impl NetworkDefinition {
    pub fn new(id: &str, device_type: DeviceType) -> Self {
        Self {
            id: id.to_string(),
            device_type,
            ..Default::default()
        }
    }

    pub fn has_match(&self) -> bool {
        self.match_rule.is_some()
    }

    /// Name the interface carries once the backend configured it.
    pub fn expected_name(&self) -> &str {
        self.set_name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Declared bridge or bond this definition is enslaved to.
    pub fn is_composite_member(&self) -> bool {
        self.links.bridge.is_some() || self.links.bond.is_some()
    }

    pub fn dhcp_enabled(&self) -> bool {
        self.dhcp4 || self.dhcp6
    }
}
