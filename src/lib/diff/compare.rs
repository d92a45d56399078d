// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use crate::{
    diff::{correlate::Correlation, FactDiff, InterfaceDiff},
    ip::{is_ipv6_multicast_net, is_ipv6_unicast_link_local},
    route::LOCAL_TABLE_ID,
    AddressFamily, AddressFlag, NetplanRoute, NetworkDefinition,
    ObservedInterface, RouteTables,
};

fn dhcp_expected(def: &NetworkDefinition, family: AddressFamily) -> bool {
    match family {
        AddressFamily::IPv4 => def.dhcp4,
        AddressFamily::IPv6 => def.dhcp6,
    }
}

fn compare_addresses(
    def: &NetworkDefinition,
    iface: &ObservedInterface,
    declared_only: &mut FactDiff,
    observed_only: &mut FactDiff,
) {
    let declared: BTreeSet<String> =
        def.addresses.iter().map(|a| a.to_string()).collect();

    let present: BTreeSet<String> = iface
        .addresses
        .iter()
        .filter(|a| {
            !(a.is_dynamic() && dhcp_expected(def, a.address.family()))
        })
        .map(|a| a.address.to_string())
        .collect();
    declared_only.addresses = declared.difference(&present).cloned().collect();

    observed_only.addresses = iface
        .addresses
        .iter()
        .filter(|a| !a.is_dynamic())
        .map(|a| a.address.to_string())
        .filter(|a| !declared.contains(a))
        .collect();

    let has_dhcp_address = |family: AddressFamily| {
        iface.addresses.iter().any(|a| {
            a.address.family() == family
                && a.flags.contains(&AddressFlag::Dhcp)
                && !a.flags.contains(&AddressFlag::LinkLocal)
        })
    };
    declared_only.missing_dhcp4_address =
        def.dhcp4 && !has_dhcp_address(AddressFamily::IPv4);
    declared_only.missing_dhcp6_address =
        def.dhcp6 && !has_dhcp_address(AddressFamily::IPv6);
}

fn compare_nameservers(
    def: &NetworkDefinition,
    iface: &ObservedInterface,
    declared_only: &mut FactDiff,
    observed_only: &mut FactDiff,
) {
    let declared_ns: BTreeSet<&String> =
        def.nameservers.addresses.iter().collect();
    let observed_ns: BTreeSet<&String> = iface.dns_addresses.iter().collect();
    let declared_search: BTreeSet<&String> =
        def.nameservers.search.iter().collect();
    let observed_search: BTreeSet<&String> = iface.dns_search.iter().collect();

    declared_only.nameservers = declared_ns
        .difference(&observed_ns)
        .map(|s| s.to_string())
        .collect();
    declared_only.search_domains = declared_search
        .difference(&observed_search)
        .map(|s| s.to_string())
        .collect();

    // DHCP may hand out any resolver.
    if !def.dhcp_enabled() {
        observed_only.nameservers = observed_ns
            .difference(&declared_ns)
            .map(|s| s.to_string())
            .collect();
        observed_only.search_domains = observed_search
            .difference(&declared_search)
            .map(|s| s.to_string())
            .collect();
    }
}

fn is_comparable_route(def: &NetworkDefinition, route: &NetplanRoute) -> bool {
    if route.protocol == "kernel" || route.table == LOCAL_TABLE_ID {
        return false;
    }
    if route.family == AddressFamily::IPv6 {
        if is_ipv6_multicast_net(&route.to) {
            return false;
        }
        if let Some(Ok(ip)) = route
            .to
            .split('/')
            .next()
            .map(|ip| ip.parse::<std::net::Ipv6Addr>())
        {
            if is_ipv6_unicast_link_local(&ip) {
                return false;
            }
        }
    }
    match route.protocol.as_str() {
        "ra" => false,
        "dhcp" => !dhcp_expected(def, route.family),
        _ => true,
    }
}

fn compare_routes(
    def: &NetworkDefinition,
    iface: &ObservedInterface,
    tables: &RouteTables,
    declared_only: &mut FactDiff,
    observed_only: &mut FactDiff,
) {
    let declared: BTreeSet<NetplanRoute> = def
        .routes
        .iter()
        .filter_map(|r| match r.project(tables) {
            Ok(r) => Some(r),
            Err(e) => {
                log::warn!("{}: ignoring route {r:?}: {e}", def.id);
                None
            }
        })
        .collect();
    let observed: BTreeSet<NetplanRoute> = iface
        .routes
        .iter()
        .filter(|r| is_comparable_route(def, r))
        .cloned()
        .collect();
    declared_only.routes = declared.difference(&observed).cloned().collect();
    observed_only.routes = observed.difference(&declared).cloned().collect();
}

fn compare_mac(
    def: &NetworkDefinition,
    iface: &ObservedInterface,
    declared_only: &mut FactDiff,
    observed_only: &mut FactDiff,
) {
    let Some(mac) = def.mac_address.as_ref() else {
        return;
    };
    let matches = iface
        .mac_address
        .as_deref()
        .map(|cur| cur.eq_ignore_ascii_case(mac))
        .unwrap_or_default();
    if !matches {
        declared_only.mac_address = Some(mac.to_lowercase());
        observed_only.mac_address = iface.mac_address.clone();
    }
}

// Declared link (an id) against the observed back reference (a name).
fn compare_link(
    declared: Option<&String>,
    observed: Option<&String>,
    correlation: &Correlation,
) -> (Option<String>, Option<String>) {
    let expected_names: BTreeSet<String> = match declared {
        Some(id) => correlation
            .names_of(id)
            .cloned()
            .unwrap_or_else(|| BTreeSet::from([id.to_string()])),
        None => BTreeSet::new(),
    };
    match (declared, observed) {
        (None, None) => (None, None),
        (Some(_), Some(name)) if expected_names.contains(name) => (None, None),
        (Some(id), observed) => (
            Some(
                expected_names
                    .iter()
                    .next()
                    .cloned()
                    .unwrap_or_else(|| id.to_string()),
            ),
            observed.cloned(),
        ),
        (None, Some(name)) => (None, Some(name.to_string())),
    }
}

pub(crate) fn compare_interface(
    def: &NetworkDefinition,
    iface: &ObservedInterface,
    tables: &RouteTables,
    correlation: &Correlation,
) -> InterfaceDiff {
    let mut declared_only = FactDiff::default();
    let mut observed_only = FactDiff::default();

    compare_addresses(def, iface, &mut declared_only, &mut observed_only);
    compare_nameservers(def, iface, &mut declared_only, &mut observed_only);
    compare_routes(
        def,
        iface,
        tables,
        &mut declared_only,
        &mut observed_only,
    );
    compare_mac(def, iface, &mut declared_only, &mut observed_only);

    (declared_only.bridge, observed_only.bridge) = compare_link(
        def.links.bridge.as_ref(),
        iface.bridge.as_ref(),
        correlation,
    );
    (declared_only.bond, observed_only.bond) = compare_link(
        def.links.bond.as_ref(),
        iface.bond.as_ref(),
        correlation,
    );
    (declared_only.vrf, observed_only.vrf) = compare_link(
        def.links.vrf.as_ref(),
        iface.vrf.as_ref(),
        correlation,
    );

    InterfaceDiff {
        index: iface.index,
        name: iface.name.clone(),
        id: def.id.clone(),
        declared_only,
        observed_only,
    }
}
