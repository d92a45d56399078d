// SPDX-License-Identifier: Apache-2.0

mod iproute;
mod system;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    DeviceType, InterfaceIpAddr, MatchCandidate, NetplanError, NetplanRoute,
    RouteTables,
};

pub(crate) use self::iproute::{parse_ip_address_show, parse_ip_route_show};
pub(crate) use self::system::{
    parse_networkctl_list, parse_nmcli_active, parse_resolvectl,
};
pub use self::system::SystemStateReader;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AddressFlag {
    /// Acquired dynamically (DHCP, SLAAC).
    Dhcp,
    LinkLocal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct ObservedAddress {
    pub address: InterfaceIpAddr,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub flags: BTreeSet<AddressFlag>,
}

impl ObservedAddress {
    pub fn new(address: InterfaceIpAddr) -> Self {
        let mut flags = BTreeSet::new();
        if address.is_link_local() {
            flags.insert(AddressFlag::LinkLocal);
        }
        Self { address, flags }
    }

    pub fn with_flag(mut self, flag: AddressFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    /// Address not coming from static configuration.
    pub fn is_dynamic(&self) -> bool {
        !self.flags.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ManagedBy {
    #[serde(rename = "networkd")]
    Networkd,
    NetworkManager,
    #[default]
    #[serde(rename = "unmanaged")]
    Unmanaged,
}

impl std::fmt::Display for ManagedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Networkd => "networkd",
                Self::NetworkManager => "NetworkManager",
                Self::Unmanaged => "unmanaged",
            }
        )
    }
}

/// Live facts about one kernel interface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub struct ObservedInterface {
    pub index: u32,
    pub name: String,
    pub admin_state: String,
    pub oper_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(rename = "type")]
    pub iface_type: DeviceType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<ObservedAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<NetplanRoute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_search: Vec<String>,
    pub managed_by: ManagedBy,
    /// Declared id reported by the managing backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub members: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bond: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrf: Option<String>,
}

impl ObservedInterface {
    pub fn new(index: u32, name: &str, iface_type: DeviceType) -> Self {
        Self {
            index,
            name: name.to_string(),
            iface_type,
            ..Default::default()
        }
    }
}

impl MatchCandidate for ObservedInterface {
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

/// Immutable snapshot of the running system, keyed by interface name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub struct ObservedState {
    pub interfaces: BTreeMap<String, ObservedInterface>,
    #[serde(skip)]
    pub route_tables: RouteTables,
}

impl ObservedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, iface: ObservedInterface) {
        self.interfaces.insert(iface.name.clone(), iface);
    }

    pub fn get(&self, name: &str) -> Option<&ObservedInterface> {
        self.interfaces.get(name)
    }

    pub(crate) fn get_by_index_mut(
        &mut self,
        index: u32,
    ) -> Option<&mut ObservedInterface> {
        self.interfaces.values_mut().find(|i| i.index == index)
    }
}

/// Source of the observed state.
pub trait ObservedStateReader {
    fn read(&self) -> Result<ObservedState, NetplanError>;
}
