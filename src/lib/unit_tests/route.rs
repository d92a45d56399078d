// SPDX-License-Identifier: Apache-2.0

use crate::{
    AddressFamily, DeclaredRoute, NetplanRoute, RouteTableRef, RouteTables,
};

fn parse_route(content: &str) -> DeclaredRoute {
    serde_yaml::from_str(content).unwrap()
}

#[test]
fn test_rt_tables_parse_and_resolve() {
    let mut tables = RouteTables::default();
    tables.parse(
        r#"
# reserved values
255     local
254     main
253     default
0       unspec
100     vpn
0x20    lab
bogus   line
"#,
    );
    assert_eq!(tables.resolve("main"), 254);
    assert_eq!(tables.resolve("vpn"), 100);
    assert_eq!(tables.resolve("lab"), 32);
    assert_eq!(tables.resolve("42"), 42);
    assert_eq!(tables.resolve("0x10"), 16);
    assert_eq!(tables.resolve("no-such-table"), 0);
}

#[test]
fn test_rt_tables_load_dropin() {
    let tmp = tempfile::TempDir::new().unwrap();
    super::testlib::write_file(
        tmp.path(),
        "etc/iproute2/rt_tables.d/vpn.conf",
        "200 vpn\n",
    );
    let tables = RouteTables::load(tmp.path()).unwrap();
    assert_eq!(tables.resolve("vpn"), 200);
    assert_eq!(tables.resolve("local"), 255);
}

#[test]
fn test_project_default_route_ipv4() {
    let route = parse_route(
        r#"---
to: default
via: 192.0.2.1
"#,
    );
    let projected = route.project(&RouteTables::default()).unwrap();
    assert_eq!(
        projected,
        NetplanRoute {
            family: AddressFamily::IPv4,
            to: "0.0.0.0/0".to_string(),
            via: Some("192.0.2.1".to_string()),
            from: None,
            metric: 0,
            scope: "global".to_string(),
            route_type: "unicast".to_string(),
            protocol: "static".to_string(),
            table: 254,
        }
    );
    assert!(projected.is_default());
}

#[test]
fn test_project_ipv6_route_defaults() {
    let route = parse_route(
        r#"---
to: 2001:db8:1::5/64
table: vpn
"#,
    );
    let mut tables = RouteTables::default();
    tables.parse("100 vpn");
    let projected = route.project(&tables).unwrap();
    assert_eq!(projected.family, AddressFamily::IPv6);
    assert_eq!(projected.to, "2001:db8:1::/64");
    assert_eq!(projected.metric, 1024);
    assert_eq!(projected.scope, "link");
    assert_eq!(projected.table, 100);
}

#[test]
fn test_project_ipv6_default_by_gateway() {
    let route = parse_route(
        r#"---
to: default
via: "2001:db8::1"
metric: "100"
table: 1000
"#,
    );
    assert_eq!(route.table, Some(RouteTableRef::Id(1000)));
    let projected = route.project(&RouteTables::default()).unwrap();
    assert_eq!(projected.to, "::/0");
    assert_eq!(projected.metric, 100);
    assert_eq!(projected.table, 1000);
}

#[test]
fn test_project_invalid_destination() {
    let route = parse_route(
        r#"---
to: 192.0.2.0/40
"#,
    );
    assert!(route.project(&RouteTables::default()).is_err());
}
