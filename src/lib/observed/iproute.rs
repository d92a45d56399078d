// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{
    ip::{default_network, normalize_ip, sanitize_ip_network},
    observed::{AddressFlag, ObservedAddress, ObservedInterface},
    route::MAIN_TABLE_ID,
    AddressFamily, DeviceType, InterfaceIpAddr, NetplanError, NetplanRoute,
    RouteTables,
};

const INFINITE_LIFETIME: u64 = u32::MAX as u64;

const TUNNEL_KINDS: [&str; 10] = [
    "gre", "gretap", "ip6gre", "ip6gretap", "ipip", "ip6tnl", "sit", "vti",
    "vxlan", "wireguard",
];

#[derive(Debug, Deserialize, Default)]
struct IpLink {
    ifindex: u32,
    ifname: String,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    operstate: Option<String>,
    #[serde(default)]
    link_type: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    master: Option<String>,
    #[serde(default)]
    linkinfo: Option<IpLinkInfo>,
    #[serde(default)]
    addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize, Default)]
struct IpLinkInfo {
    #[serde(default)]
    info_kind: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct IpAddrInfo {
    family: String,
    local: Option<String>,
    prefixlen: Option<u8>,
    #[serde(default)]
    dynamic: bool,
    #[serde(default)]
    valid_life_time: Option<u64>,
}

fn ip_link_type_to_device_type(link: &IpLink) -> DeviceType {
    if link.link_type.as_deref() == Some("loopback") {
        return DeviceType::Loopback;
    }
    match link.linkinfo.as_ref().and_then(|l| l.info_kind.as_deref()) {
        Some("bridge") => DeviceType::Bridge,
        Some("bond") => DeviceType::Bond,
        Some("vlan") => DeviceType::Vlan,
        Some("vrf") => DeviceType::Vrf,
        Some("dummy") => DeviceType::Dummy,
        Some("veth") => DeviceType::Veth,
        Some(kind) if TUNNEL_KINDS.contains(&kind) => DeviceType::Tunnel,
        Some(_) => DeviceType::Unknown,
        None => match link.link_type.as_deref() {
            Some("ether") => DeviceType::Ethernet,
            _ => DeviceType::Unknown,
        },
    }
}

fn ip_addr_to_observed(addr: &IpAddrInfo) -> Option<ObservedAddress> {
    if addr.family != "inet" && addr.family != "inet6" {
        return None;
    }
    let local = addr.local.as_deref()?;
    let ip = match normalize_ip(local) {
        Ok(ip) => ip,
        Err(e) => {
            log::debug!("Ignoring address {local}: {e}");
            return None;
        }
    };
    let address = match addr.prefixlen {
        Some(len) => format!("{ip}/{len}"),
        None => ip,
    };
    let mut ret = ObservedAddress::new(
        InterfaceIpAddr::try_from(address.as_str()).ok()?,
    );
    if addr.dynamic
        || addr
            .valid_life_time
            .map(|l| l < INFINITE_LIFETIME)
            .unwrap_or_default()
    {
        ret = ret.with_flag(AddressFlag::Dhcp);
    }
    Some(ret)
}

fn ip_link_to_observed(link: &IpLink) -> ObservedInterface {
    let mut iface = ObservedInterface::new(
        link.ifindex,
        link.ifname.as_str(),
        ip_link_type_to_device_type(link),
    );
    iface.admin_state = if link.flags.iter().any(|f| f == "UP") {
        "up".to_string()
    } else {
        "down".to_string()
    };
    iface.oper_state = link
        .operstate
        .as_deref()
        .unwrap_or("unknown")
        .to_lowercase();
    if iface.iface_type != DeviceType::Loopback {
        iface.mac_address = link.address.as_ref().map(|m| m.to_lowercase());
    }
    iface.addresses = link
        .addr_info
        .iter()
        .filter_map(ip_addr_to_observed)
        .collect();
    iface
}

/// Parse `ip -j -d address show` into interfaces keyed by name, with
/// composite membership filled on both sides.
pub(crate) fn parse_ip_address_show(
    output: &str,
) -> Result<BTreeMap<String, ObservedInterface>, NetplanError> {
    let links: Vec<IpLink> = serde_json::from_str(output)?;
    let mut ifaces: BTreeMap<String, ObservedInterface> = BTreeMap::new();
    for link in links.iter() {
        ifaces.insert(link.ifname.clone(), ip_link_to_observed(link));
    }
    for link in links.iter() {
        let Some(master) = link.master.as_ref() else {
            continue;
        };
        let Some(master_type) = ifaces.get(master).map(|i| i.iface_type)
        else {
            continue;
        };
        if let Some(iface) = ifaces.get_mut(&link.ifname) {
            match master_type {
                DeviceType::Bridge => iface.bridge = Some(master.clone()),
                DeviceType::Bond => iface.bond = Some(master.clone()),
                DeviceType::Vrf => iface.vrf = Some(master.clone()),
                _ => continue,
            }
        }
        if let Some(master_iface) = ifaces.get_mut(master) {
            master_iface.members.insert(link.ifname.clone());
        }
    }
    Ok(ifaces)
}

#[derive(Debug, Deserialize, Default)]
struct IpRoute {
    #[serde(rename = "type")]
    route_type: Option<String>,
    dst: Option<String>,
    gateway: Option<String>,
    dev: Option<String>,
    protocol: Option<String>,
    scope: Option<String>,
    prefsrc: Option<String>,
    metric: Option<u32>,
    table: Option<serde_json::Value>,
}

fn ip_route_dst(dst: &str, family: AddressFamily) -> Option<String> {
    if dst == "default" {
        return Some(default_network(family).to_string());
    }
    match sanitize_ip_network(dst) {
        Ok(d) => Some(d),
        Err(e) => {
            log::debug!("Ignoring route to {dst}: {e}");
            None
        }
    }
}

fn ip_route_table(
    table: Option<&serde_json::Value>,
    tables: &RouteTables,
) -> u32 {
    match table {
        None => MAIN_TABLE_ID,
        Some(serde_json::Value::Number(n)) => {
            n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0)
        }
        Some(serde_json::Value::String(s)) => tables.resolve(s),
        Some(_) => 0,
    }
}

/// Parse `ip -j -4|-6 route show table all` into `(device, route)` pairs.
/// Routes without an output device are skipped.
pub(crate) fn parse_ip_route_show(
    output: &str,
    family: AddressFamily,
    tables: &RouteTables,
) -> Result<Vec<(String, NetplanRoute)>, NetplanError> {
    let routes: Vec<IpRoute> = serde_json::from_str(output)?;
    let mut ret = Vec::new();
    for route in routes {
        let Some(dev) = route.dev.as_ref() else {
            continue;
        };
        let Some(to) = route
            .dst
            .as_deref()
            .and_then(|dst| ip_route_dst(dst, family))
        else {
            continue;
        };
        ret.push((
            dev.clone(),
            NetplanRoute {
                family,
                to,
                via: route
                    .gateway
                    .as_deref()
                    .and_then(|g| normalize_ip(g).ok()),
                from: route
                    .prefsrc
                    .as_deref()
                    .and_then(|s| normalize_ip(s).ok()),
                metric: route
                    .metric
                    .unwrap_or_else(|| NetplanRoute::default_metric(family)),
                scope: route.scope.unwrap_or_else(|| "global".to_string()),
                route_type: route
                    .route_type
                    .unwrap_or_else(|| "unicast".to_string()),
                protocol: route.protocol.unwrap_or_else(|| "boot".to_string()),
                table: ip_route_table(route.table.as_ref(), tables),
            },
        ));
    }
    Ok(ret)
}
