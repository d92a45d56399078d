// SPDX-License-Identifier: Apache-2.0

use crate::{
    unit_tests::testlib::{declared_from_yaml, new_sys_iface},
    ArtifactSet, Backend, DeviceType, MatchSkipReason, NetplanState,
    RestartPlan, SystemInterface,
};

fn plan_for(
    ifaces: &[SystemInterface],
    declared: &NetplanState,
) -> RestartPlan {
    RestartPlan::compute(
        &ArtifactSet::default(),
        &ArtifactSet::new(true, false, false),
        ifaces,
        declared,
        None,
    )
}

#[test]
fn test_restart_when_artifacts_appear_or_vanish() {
    let declared = NetplanState::new();
    let plan = RestartPlan::compute(
        &ArtifactSet::new(true, true, false),
        &ArtifactSet::new(false, true, true),
        &[],
        &declared,
        None,
    );
    // networkd lost its artifacts and must drop the old configuration.
    assert!(plan.restart(Backend::Networkd));
    assert!(plan.restart(Backend::NetworkManager));
    assert!(plan.restart(Backend::Ovs));

    let plan = RestartPlan::compute(
        &ArtifactSet::default(),
        &ArtifactSet::default(),
        &[],
        &declared,
        None,
    );
    assert_eq!(plan, RestartPlan::default());
}

#[test]
fn test_rename_by_mac() {
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    lan:
      match:
        macaddress: "00:11:22:33:44:55"
      set-name: lan0
"#,
    );
    let ifaces = vec![
        new_sys_iface("eth0", "00:11:22:33:44:55", "e1000e"),
        new_sys_iface("eth1", "00:11:22:33:44:66", "e1000e"),
    ];
    let plan = plan_for(&ifaces, &declared);
    assert_eq!(plan.renames.len(), 1);
    assert_eq!(plan.renames["eth0"], "lan0");
    assert!(plan.diagnostics.is_empty());
}

#[test]
fn test_rename_already_named() {
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    lan:
      match:
        macaddress: "00:11:22:33:44:55"
      set-name: lan0
"#,
    );
    let ifaces = vec![new_sys_iface("lan0", "00:11:22:33:44:55", "e1000e")];
    let plan = plan_for(&ifaces, &declared);
    assert!(plan.renames.is_empty());
    assert!(plan.diagnostics.is_empty());
}

#[test]
fn test_rename_skip_critical() {
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    lan:
      match:
        macaddress: "00:11:22:33:44:55"
      set-name: lan0
      critical: true
"#,
    );
    let ifaces = vec![new_sys_iface("eth0", "00:11:22:33:44:55", "e1000e")];
    let plan = plan_for(&ifaces, &declared);
    assert!(plan.renames.is_empty());
    assert_eq!(plan.diagnostics[0].reason, MatchSkipReason::Critical);
}

#[test]
fn test_rename_skip_declared_member() {
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    lan:
      match:
        macaddress: "00:11:22:33:44:55"
      set-name: lan0
  bonds:
    bond0:
      interfaces: [lan]
"#,
    );
    let ifaces = vec![new_sys_iface("eth0", "00:11:22:33:44:55", "e1000e")];
    let plan = plan_for(&ifaces, &declared);
    assert!(plan.renames.is_empty());
    assert_eq!(plan.diagnostics[0].id, "lan");
    assert_eq!(
        plan.diagnostics[0].reason,
        MatchSkipReason::CompositeMember
    );
}

#[test]
fn test_rename_skip_live_member() {
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    lan:
      match:
        driver: e1000e
      set-name: lan0
"#,
    );
    let mut eth0 = new_sys_iface("eth0", "00:11:22:33:44:55", "e1000e");
    eth0.master = Some("bond0".to_string());
    // A bond carries the MAC of one member and must never match.
    let mut bond0 = new_sys_iface("bond0", "00:11:22:33:44:55", "e1000e");
    bond0.kind = DeviceType::Bond;
    let plan = plan_for(&[eth0, bond0], &declared);
    assert!(plan.renames.is_empty());
    assert_eq!(
        plan.diagnostics[0].reason,
        MatchSkipReason::CompositeMember
    );
}

#[test]
fn test_rename_ambiguous() {
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    lan:
      match:
        driver: "e1000*"
      set-name: lan0
    wan:
      match:
        name: "wwan*"
      set-name: wan0
"#,
    );
    let ifaces = vec![
        new_sys_iface("eth0", "00:11:22:33:44:55", "e1000e"),
        new_sys_iface("eth1", "00:11:22:33:44:66", "e1000"),
    ];
    let plan = plan_for(&ifaces, &declared);
    assert!(plan.renames.is_empty());
    assert_eq!(plan.diagnostics.len(), 2);
    assert_eq!(
        plan.diagnostics[0].reason,
        MatchSkipReason::MultipleMatches(vec![
            "eth0".to_string(),
            "eth1".to_string()
        ])
    );
    assert_eq!(plan.diagnostics[1].id, "wan");
    assert_eq!(plan.diagnostics[1].reason, MatchSkipReason::NoMatch);
}

#[test]
fn test_rename_narrow_by_name_then_driver() {
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    lan:
      match:
        name: "eth*"
        driver: ixgbe
      set-name: lan0
"#,
    );
    let ifaces = vec![
        new_sys_iface("eth0", "00:11:22:33:44:55", "e1000e"),
        new_sys_iface("eth1", "00:11:22:33:44:66", "ixgbe"),
        new_sys_iface("eno1", "00:11:22:33:44:77", "ixgbe"),
    ];
    let plan = plan_for(&ifaces, &declared);
    assert_eq!(plan.renames["eth1"], "lan0");
    assert_eq!(plan.renames.len(), 1);
}

#[test]
fn test_stale_virtual_links() {
    let previous = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0: {}
    eth1: {}
  bridges:
    br0:
      interfaces: [eth0]
    br1: {}
  dummy-devices:
    dm0: {}
"#,
    );
    let declared = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0: {}
  bridges:
    br0:
      interfaces: [eth0]
"#,
    );
    let ifaces: Vec<SystemInterface> = ["eth0", "eth1", "br0", "dm0"]
        .iter()
        .map(|n| SystemInterface::new(n))
        .collect();
    let plan = RestartPlan::compute(
        &ArtifactSet::new(true, false, false),
        &ArtifactSet::new(true, false, false),
        &ifaces,
        &declared,
        Some(&previous),
    );
    // br1 is not visible, eth1 is physical.
    assert_eq!(plan.delete_links.iter().collect::<Vec<_>>(), vec!["dm0"]);
}
