// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{DeviceType, ManagedBy, NetplanRoute, Renderer};

/// Facts present on one side only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub struct FactDiff {
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub addresses: BTreeSet<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub missing_dhcp4_address: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub missing_dhcp6_address: bool,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub nameservers: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub search_domains: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub routes: BTreeSet<NetplanRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bond: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrf: Option<String>,
}

impl FactDiff {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub struct InterfaceDiff {
    pub index: u32,
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "FactDiff::is_empty")]
    pub declared_only: FactDiff,
    #[serde(skip_serializing_if = "FactDiff::is_empty")]
    pub observed_only: FactDiff,
}

impl InterfaceDiff {
    pub fn is_empty(&self) -> bool {
        self.declared_only.is_empty() && self.observed_only.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct MissingInSystem {
    pub device_type: DeviceType,
    pub renderer: Renderer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct MissingInDeclared {
    pub index: u32,
    pub device_type: DeviceType,
    pub managed_by: ManagedBy,
}

/// Difference between the declared and the observed state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub struct DiffReport {
    /// Interfaces both declared and observed, keyed by interface name.
    pub interfaces: BTreeMap<String, InterfaceDiff>,
    /// Declared ids without any observed interface.
    pub missing_interfaces_system: BTreeMap<String, MissingInSystem>,
    /// Observed interface names without a declared definition.
    pub missing_interfaces_declared: BTreeMap<String, MissingInDeclared>,
}

impl DiffReport {
    /// True when no comparable interface carries any difference.
    pub fn interfaces_in_sync(&self) -> bool {
        self.interfaces.values().all(InterfaceDiff::is_empty)
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces_in_sync()
            && self.missing_interfaces_system.is_empty()
            && self.missing_interfaces_declared.is_empty()
    }

    /// Declared ids that entered per interface comparison.
    pub fn comparable_ids(&self) -> BTreeSet<&str> {
        self.interfaces.values().map(|i| i.id.as_str()).collect()
    }
}
