// SPDX-License-Identifier: Apache-2.0

use crate::{
    diff,
    unit_tests::testlib::{
        declared_from_yaml, new_observed_addr, new_observed_iface,
    },
    AddressFamily, AddressFlag, DeviceType, ManagedBy, NetplanRoute,
    ObservedState,
};

fn eth0_static_state() -> ObservedState {
    let mut eth0 = new_observed_iface(2, "eth0", DeviceType::Ethernet);
    eth0.addresses.push(new_observed_addr("192.0.2.10/24"));
    eth0.addresses.push(new_observed_addr("fe80::1/64"));
    eth0.dns_addresses.push("192.0.2.53".to_string());
    eth0.dns_search.push("example.com".to_string());
    eth0.routes.push(NetplanRoute {
        family: AddressFamily::IPv4,
        to: "0.0.0.0/0".to_string(),
        via: Some("192.0.2.1".to_string()),
        metric: 0,
        scope: "global".to_string(),
        route_type: "unicast".to_string(),
        protocol: "static".to_string(),
        table: 254,
        ..Default::default()
    });
    eth0.routes.push(NetplanRoute {
        family: AddressFamily::IPv4,
        to: "192.0.2.0/24".to_string(),
        from: Some("192.0.2.10".to_string()),
        metric: 0,
        scope: "link".to_string(),
        route_type: "unicast".to_string(),
        protocol: "kernel".to_string(),
        table: 254,
        ..Default::default()
    });
    let mut state = ObservedState::new();
    state.push(new_observed_iface(1, "lo", DeviceType::Loopback));
    state.push(eth0);
    state
}

const ETH0_STATIC: &str = r#"---
network:
  ethernets:
    eth0:
      addresses: [192.0.2.10/24]
      nameservers:
        addresses: [192.0.2.53]
        search: [example.com]
      routes:
        - to: default
          via: 192.0.2.1
"#;

#[test]
fn test_diff_in_sync() {
    let report = diff(
        &eth0_static_state(),
        &declared_from_yaml(ETH0_STATIC),
        None,
    );
    assert!(report.is_empty(), "{report:?}");
    assert!(report.interfaces["eth0"].is_empty());
    assert_eq!(report.interfaces["eth0"].id, "eth0");
    assert_eq!(report.interfaces["eth0"].index, 2);
}

#[test]
fn test_diff_is_idempotent() {
    let observed = eth0_static_state();
    let declared = declared_from_yaml(ETH0_STATIC);
    assert_eq!(
        diff(&observed, &declared, None),
        diff(&observed, &declared, None)
    );
}

#[test]
fn test_diff_address_and_nameserver_drift() {
    let mut observed = eth0_static_state();
    if let Some(eth0) = observed.interfaces.get_mut("eth0") {
        eth0.addresses.push(new_observed_addr("198.51.100.7/24"));
        eth0.dns_addresses.push("198.51.100.53".to_string());
    }
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0:
      addresses: [192.0.2.10/24, "2001:db8::10/64"]
      nameservers:
        addresses: [192.0.2.53]
        search: [example.com, example.org]
      routes:
        - to: default
          via: 192.0.2.1
"#,
    );
    let report = diff(&observed, &declared, None);
    let eth0 = &report.interfaces["eth0"];
    assert_eq!(
        eth0.declared_only.addresses.iter().collect::<Vec<_>>(),
        vec!["2001:db8::10/64"]
    );
    assert_eq!(
        eth0.observed_only.addresses.iter().collect::<Vec<_>>(),
        vec!["198.51.100.7/24"]
    );
    assert_eq!(
        eth0.declared_only.search_domains.iter().collect::<Vec<_>>(),
        vec!["example.org"]
    );
    assert_eq!(
        eth0.observed_only.nameservers.iter().collect::<Vec<_>>(),
        vec!["198.51.100.53"]
    );
    assert!(!report.interfaces_in_sync());
}

#[test]
fn test_diff_dhcp_address_missing() {
    let mut observed = ObservedState::new();
    let mut eth0 = new_observed_iface(2, "eth0", DeviceType::Ethernet);
    eth0.addresses.push(new_observed_addr("fe80::1/64"));
    eth0.dns_addresses.push("192.0.2.53".to_string());
    observed.push(eth0);

    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0:
      dhcp4: true
      dhcp6: true
"#,
    );
    let report = diff(&observed, &declared, None);
    let eth0 = &report.interfaces["eth0"];
    assert!(eth0.declared_only.missing_dhcp4_address);
    assert!(eth0.declared_only.missing_dhcp6_address);
    // Resolvers handed out by DHCP are not drift.
    assert!(eth0.observed_only.nameservers.is_empty());
}

#[test]
fn test_diff_dhcp_address_present() {
    let mut observed = ObservedState::new();
    let mut eth0 = new_observed_iface(2, "eth0", DeviceType::Ethernet);
    eth0.addresses.push(
        new_observed_addr("192.0.2.99/24").with_flag(AddressFlag::Dhcp),
    );
    eth0.routes.push(NetplanRoute {
        family: AddressFamily::IPv4,
        to: "0.0.0.0/0".to_string(),
        via: Some("192.0.2.1".to_string()),
        metric: 100,
        scope: "global".to_string(),
        route_type: "unicast".to_string(),
        protocol: "dhcp".to_string(),
        table: 254,
        ..Default::default()
    });
    observed.push(eth0);

    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0:
      dhcp4: true
"#,
    );
    let report = diff(&observed, &declared, None);
    assert!(report.is_empty(), "{report:?}");
}

#[test]
fn test_diff_dhcp_route_without_dhcp() {
    let mut observed = ObservedState::new();
    let mut eth0 = new_observed_iface(2, "eth0", DeviceType::Ethernet);
    let route = NetplanRoute {
        family: AddressFamily::IPv4,
        to: "0.0.0.0/0".to_string(),
        via: Some("192.0.2.1".to_string()),
        metric: 100,
        scope: "global".to_string(),
        route_type: "unicast".to_string(),
        protocol: "dhcp".to_string(),
        table: 254,
        ..Default::default()
    };
    eth0.routes.push(route.clone());
    observed.push(eth0);

    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0: {}
"#,
    );
    let report = diff(&observed, &declared, None);
    assert!(report.interfaces["eth0"].observed_only.routes.contains(&route));
}

#[test]
fn test_diff_ignore_local_ra_and_multicast_routes() {
    let mut observed = ObservedState::new();
    let mut eth0 = new_observed_iface(2, "eth0", DeviceType::Ethernet);
    for (to, protocol, table) in [
        ("2001:db8::/64", "ra", 254),
        ("ff00::/8", "boot", 254),
        ("fe80::/64", "boot", 254),
        ("192.0.2.10/32", "boot", 255),
    ] {
        eth0.routes.push(NetplanRoute {
            family: if to.contains(':') {
                AddressFamily::IPv6
            } else {
                AddressFamily::IPv4
            },
            to: to.to_string(),
            metric: 256,
            scope: "global".to_string(),
            route_type: "unicast".to_string(),
            protocol: protocol.to_string(),
            table,
            ..Default::default()
        });
    }
    observed.push(eth0);

    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0: {}
"#,
    );
    assert!(diff(&observed, &declared, None).is_empty());
}

#[test]
fn test_diff_missing_route() {
    let mut observed = eth0_static_state();
    if let Some(eth0) = observed.interfaces.get_mut("eth0") {
        eth0.routes.clear();
    }
    let report = diff(&observed, &declared_from_yaml(ETH0_STATIC), None);
    let routes = &report.interfaces["eth0"].declared_only.routes;
    assert_eq!(routes.len(), 1);
    assert!(routes.iter().all(|r| r.is_default()));
}

#[test]
fn test_diff_missing_interfaces() {
    let mut observed = eth0_static_state();
    let mut eth1 = new_observed_iface(3, "eth1", DeviceType::Ethernet);
    eth1.managed_by = ManagedBy::NetworkManager;
    observed.push(eth1);

    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0:
      addresses: [192.0.2.10/24]
    eth9:
      dhcp4: true
  wifis:
    wlan0:
      dhcp4: true
"#,
    );
    let report = diff(&observed, &declared, None);
    assert_eq!(
        report.missing_interfaces_system.keys().collect::<Vec<_>>(),
        vec!["eth9"]
    );
    // lo is never reported.
    assert_eq!(
        report.missing_interfaces_declared.keys().collect::<Vec<_>>(),
        vec!["eth1"]
    );
    let eth1 = &report.missing_interfaces_declared["eth1"];
    assert_eq!(eth1.index, 3);
    assert_eq!(eth1.managed_by, ManagedBy::NetworkManager);
}

#[test]
fn test_diff_partition() {
    let mut observed = eth0_static_state();
    observed.push(new_observed_iface(3, "eth1", DeviceType::Ethernet));
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0: {}
    eth9: {}
"#,
    );
    let report = diff(&observed, &declared, None);
    for id in report.comparable_ids() {
        assert!(!report.missing_interfaces_system.contains_key(id));
    }
    for name in report.interfaces.keys() {
        assert!(!report.missing_interfaces_declared.contains_key(name));
    }
}

#[test]
fn test_diff_focus() {
    let mut observed = eth0_static_state();
    observed.push(new_observed_iface(3, "eth1", DeviceType::Ethernet));
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0:
      addresses: [192.0.2.10/24]
    eth9: {}
"#,
    );
    let report = diff(&observed, &declared, Some("eth1"));
    assert!(report.interfaces.is_empty());
    assert!(report.missing_interfaces_system.is_empty());
    assert_eq!(report.missing_interfaces_declared.len(), 1);

    let report = diff(&observed, &declared, Some("eth0"));
    assert_eq!(report.interfaces.len(), 1);
    assert!(report.missing_interfaces_declared.is_empty());
}

#[test]
fn test_diff_mac_address() {
    let mut observed = ObservedState::new();
    let mut eth0 = new_observed_iface(2, "eth0", DeviceType::Ethernet);
    eth0.mac_address = Some("52:54:00:00:00:01".to_string());
    observed.push(eth0);

    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0:
      macaddress: "52:54:00:00:00:02"
"#,
    );
    let report = diff(&observed, &declared, None);
    let eth0 = &report.interfaces["eth0"];
    assert_eq!(
        eth0.declared_only.mac_address.as_deref(),
        Some("52:54:00:00:00:02")
    );
    assert_eq!(
        eth0.observed_only.mac_address.as_deref(),
        Some("52:54:00:00:00:01")
    );

    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0:
      macaddress: "52:54:00:00:00:01"
"#,
    );
    assert!(diff(&observed, &declared, None).is_empty());
}

#[test]
fn test_diff_bridge_membership() {
    let mut observed = ObservedState::new();
    let mut eth0 = new_observed_iface(2, "eth0", DeviceType::Ethernet);
    eth0.bridge = Some("br1".to_string());
    observed.push(eth0);
    observed.push(new_observed_iface(3, "br0", DeviceType::Bridge));
    observed.push(new_observed_iface(4, "br1", DeviceType::Bridge));

    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0: {}
  bridges:
    br0:
      interfaces: [eth0]
    br1: {}
"#,
    );
    let report = diff(&observed, &declared, None);
    let eth0 = &report.interfaces["eth0"];
    assert_eq!(eth0.declared_only.bridge.as_deref(), Some("br0"));
    assert_eq!(eth0.observed_only.bridge.as_deref(), Some("br1"));
}

#[test]
fn test_diff_report_serialize() {
    let mut observed = eth0_static_state();
    observed.push(new_observed_iface(3, "eth1", DeviceType::Ethernet));
    let report = diff(&observed, &declared_from_yaml(ETH0_STATIC), None);
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["interfaces"]["eth0"]["id"], "eth0");
    assert!(value["interfaces"]["eth0"].get("declared_only").is_none());
    assert_eq!(value["missing_interfaces_declared"]["eth1"]["index"], 3);
    assert_eq!(
        value["missing_interfaces_declared"]["eth1"]["managed_by"],
        "unmanaged"
    );
}
