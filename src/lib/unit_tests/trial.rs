// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::time::Duration;

use crate::{
    trial::check_revertable,
    unit_tests::testlib::{
        declared_from_yaml, dir_content, write_file, CopyGenerator,
        RecordingBackend, ScriptedInput, StaticInventory,
    },
    ApplyEnv, ErrorKind, Interrupt, InterruptToken, RevertReason,
    TrialOptions, TrialOutcome, TrialSession, TrialState, YamlConfigReader,
};

const ETH0_DHCP: &str =
    "network:\n  ethernets:\n    eth0:\n      dhcp4: true\n";
const ETH0_STATIC: &str =
    "network:\n  ethernets:\n    eth0:\n      dhcp4: false\n";

struct Fixture {
    tmp: tempfile::TempDir,
    config: YamlConfigReader,
    generator: CopyGenerator,
    backend: RecordingBackend,
    inventory: StaticInventory,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::TempDir::new().unwrap();
        write_file(
            &tmp.path().join("root"),
            "etc/netplan/01-eth0.yaml",
            ETH0_DHCP,
        );
        std::fs::write(tmp.path().join("01-eth0.yaml"), ETH0_STATIC).unwrap();
        Self {
            tmp,
            config: YamlConfigReader::new(),
            generator: CopyGenerator::default(),
            backend: RecordingBackend::default(),
            inventory: StaticInventory::default(),
        }
    }

    fn root(&self) -> std::path::PathBuf {
        self.tmp.path().join("root")
    }

    fn env(&self) -> ApplyEnv<'_> {
        ApplyEnv {
            config: &self.config,
            generator: &self.generator,
            backend: &self.backend,
            inventory: &self.inventory,
        }
    }

    fn options(&self) -> TrialOptions {
        TrialOptions {
            config_file: Some(self.tmp.path().join("01-eth0.yaml")),
            timeout: Duration::from_millis(50),
            tick: Duration::from_millis(10),
            ..TrialOptions::new(&self.root())
        }
    }
}

fn no_temp_area_left(root: &Path) -> bool {
    match std::fs::read_dir(root.join("tmp")) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[test]
fn test_trial_reject_restores_declared_config() {
    let fixture = Fixture::new();
    let root = fixture.root();
    let etc_before = dir_content(&root.join("etc/netplan"));

    let token = InterruptToken::new();
    token.post(Interrupt::Reject);
    let mut input = ScriptedInput::default();
    let mut out: Vec<u8> = Vec::new();
    let mut session = TrialSession::new(fixture.env(), fixture.options());
    let outcome = session.run(&mut input, &token, &mut out).unwrap();

    assert_eq!(outcome, TrialOutcome::Reverted(RevertReason::Rejected));
    assert_eq!(dir_content(&root.join("etc/netplan")), etc_before);
    // No backend artifacts existed before the trial.
    assert!(!root.join("run/systemd/network").exists());
    assert!(no_temp_area_left(&root));
    assert!(!root.join("run/netplan/netplan-try.ready").exists());
    assert!(input.restored);
    assert_eq!(
        session.history(),
        &[
            TrialState::Idle,
            TrialState::BackedUp,
            TrialState::Applied,
            TrialState::AwaitingConfirmation,
            TrialState::Rejected,
            TrialState::Reverting,
            TrialState::Cleaned,
        ]
    );
    // Candidate applied with regeneration, previous one re-applied from
    // the restored state without.
    assert_eq!(fixture.generator.runs.get(), 1);
    assert_eq!(
        fixture.backend.calls(),
        vec![
            "sriov",
            "reload networkd ",
            "sriov",
            "reload networkd ",
        ]
    );
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Do you want to keep these settings?"));
    assert!(out.contains("Reverting."));
}

#[test]
fn test_trial_timeout_reverts() {
    let fixture = Fixture::new();
    let root = fixture.root();
    write_file(
        &root,
        "run/systemd/network/10-netplan-01-eth0.network",
        ETH0_DHCP,
    );
    let run_before = dir_content(&root.join("run/systemd/network"));

    let mut input = ScriptedInput::default();
    let mut out: Vec<u8> = Vec::new();
    let mut session = TrialSession::new(fixture.env(), fixture.options());
    let outcome = session
        .run(&mut input, &InterruptToken::new(), &mut out)
        .unwrap();

    assert_eq!(outcome, TrialOutcome::Reverted(RevertReason::TimedOut));
    assert_eq!(dir_content(&root.join("run/systemd/network")), run_before);
    assert_eq!(
        std::fs::read_to_string(root.join("etc/netplan/01-eth0.yaml"))
            .unwrap(),
        ETH0_DHCP
    );
    assert_eq!(session.state(), TrialState::Cleaned);
}

#[test]
fn test_trial_accept_keeps_candidate() {
    let fixture = Fixture::new();
    let root = fixture.root();

    let mut input = ScriptedInput {
        readable_after: Some(0),
        ..Default::default()
    };
    let mut out: Vec<u8> = Vec::new();
    let mut session = TrialSession::new(fixture.env(), fixture.options());
    let outcome = session
        .run(&mut input, &InterruptToken::new(), &mut out)
        .unwrap();

    assert_eq!(outcome, TrialOutcome::Accepted);
    assert_eq!(
        std::fs::read_to_string(root.join("etc/netplan/01-eth0.yaml"))
            .unwrap(),
        ETH0_STATIC
    );
    assert!(root
        .join("run/systemd/network/10-netplan-01-eth0.network")
        .exists());
    assert!(no_temp_area_left(&root));
    assert_eq!(
        session.history().last().copied(),
        Some(TrialState::Cleaned)
    );
    assert!(session.history().contains(&TrialState::Accepted));
    assert!(String::from_utf8(out)
        .unwrap()
        .contains("Configuration accepted."));
}

#[test]
fn test_trial_apply_error_reverts() {
    let fixture = Fixture::new();
    let root = fixture.root();
    let etc_before = dir_content(&root.join("etc/netplan"));
    fixture.backend.fail_reload.set(1);

    let mut input = ScriptedInput::default();
    let mut out: Vec<u8> = Vec::new();
    let mut session = TrialSession::new(fixture.env(), fixture.options());
    let outcome = session
        .run(&mut input, &InterruptToken::new(), &mut out)
        .unwrap();

    match outcome {
        TrialOutcome::Reverted(RevertReason::Errored(e)) => {
            assert_eq!(e.kind(), ErrorKind::EnvironmentError);
        }
        _ => panic!("Unexpected outcome {outcome:?}"),
    }
    assert_eq!(dir_content(&root.join("etc/netplan")), etc_before);
    assert!(session.history().contains(&TrialState::Errored));
    assert!(!session.history().contains(&TrialState::AwaitingConfirmation));
    assert!(!input.prepared);
}

#[test]
fn test_trial_revert_failure() {
    let fixture = Fixture::new();
    // Candidate apply and re-apply both fail.
    fixture.backend.fail_reload.set(2);

    let mut input = ScriptedInput::default();
    let mut out: Vec<u8> = Vec::new();
    let mut session = TrialSession::new(fixture.env(), fixture.options());
    let result = session.run(&mut input, &InterruptToken::new(), &mut out);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::RevertError);
    }
    assert_eq!(session.state(), TrialState::Cleaned);
    assert!(no_temp_area_left(&fixture.root()));
}

#[test]
fn test_trial_refuse_bond_parameters() {
    let fixture = Fixture::new();
    let candidate = fixture.tmp.path().join("02-bond.yaml");
    std::fs::write(
        &candidate,
        r#"network:
  ethernets:
    eth1: {}
  bonds:
    bond0:
      interfaces: [eth1]
      parameters:
        mode: 802.3ad
"#,
    )
    .unwrap();
    let opts = TrialOptions {
        config_file: Some(candidate),
        ..fixture.options()
    };

    let mut input = ScriptedInput::default();
    let mut out: Vec<u8> = Vec::new();
    let mut session = TrialSession::new(fixture.env(), opts);
    let result = session.run(&mut input, &InterruptToken::new(), &mut out);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::NotSupportedError);
        assert!(e.msg().contains("bond0 (mode)"));
    }
    // Nothing was touched.
    assert!(fixture.backend.calls().is_empty());
    assert!(!fixture.root().join("etc/netplan/02-bond.yaml").exists());
    assert_eq!(
        session.history(),
        &[TrialState::Idle, TrialState::Cleaned]
    );
}

#[test]
fn test_check_revertable() {
    let state = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0: {}
  bridges:
    br0:
      interfaces: [eth0]
"#,
    );
    assert!(check_revertable(&state).is_ok());
}

#[test]
fn test_trial_refuse_empty_bridge_parameters() {
    let state = declared_from_yaml(
        r#"---
network:
  ethernets:
    eth0: {}
  bridges:
    br0:
      interfaces: [eth0]
      parameters: {}
"#,
    );
    let result = check_revertable(&state);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::NotSupportedError);
        assert!(e.msg().ends_with("br0"));
    }
}

#[test]
fn test_trial_ready_marker_exists_while_waiting() {
    struct MarkerWatch {
        marker: std::path::PathBuf,
        seen: bool,
    }

    impl crate::ConfirmInput for MarkerWatch {
        fn wait_readable(
            &mut self,
            _timeout: Duration,
        ) -> Result<bool, crate::NetplanError> {
            self.seen = self.marker.exists();
            Ok(true)
        }
    }

    let fixture = Fixture::new();
    let marker = fixture.tmp.path().join("try.ready");
    let opts = TrialOptions {
        ready_marker: marker.clone(),
        ..fixture.options()
    };
    let mut input = MarkerWatch {
        marker: marker.clone(),
        seen: false,
    };
    let mut out: Vec<u8> = Vec::new();
    let mut session = TrialSession::new(fixture.env(), opts);
    let outcome = session
        .run(&mut input, &InterruptToken::new(), &mut out)
        .unwrap();
    assert_eq!(outcome, TrialOutcome::Accepted);
    assert!(input.seen);
    assert!(!marker.exists());
}

#[test]
fn test_trial_config_file_already_declared() {
    let fixture = Fixture::new();
    let root = fixture.root();
    let declared = root.join("etc/netplan/01-eth0.yaml");
    let opts = TrialOptions {
        config_file: Some(declared.clone()),
        ..fixture.options()
    };

    let mut input = ScriptedInput {
        readable_after: Some(0),
        ..Default::default()
    };
    let mut out: Vec<u8> = Vec::new();
    let mut session = TrialSession::new(fixture.env(), opts);
    let outcome = session
        .run(&mut input, &InterruptToken::new(), &mut out)
        .unwrap();

    assert_eq!(outcome, TrialOutcome::Accepted);
    assert_eq!(std::fs::read_to_string(&declared).unwrap(), ETH0_DHCP);
    assert_eq!(
        std::fs::read_to_string(
            root.join("run/systemd/network/10-netplan-01-eth0.network")
        )
        .unwrap(),
        ETH0_DHCP
    );
}

#[test]
fn test_trial_config_file_already_declared_reject() {
    let fixture = Fixture::new();
    let root = fixture.root();
    let etc_before = dir_content(&root.join("etc/netplan"));
    let opts = TrialOptions {
        config_file: Some(root.join("etc/netplan/01-eth0.yaml")),
        ..fixture.options()
    };

    let token = InterruptToken::new();
    token.post(Interrupt::Reject);
    let mut input = ScriptedInput::default();
    let mut out: Vec<u8> = Vec::new();
    let mut session = TrialSession::new(fixture.env(), opts);
    let outcome = session.run(&mut input, &token, &mut out).unwrap();

    assert_eq!(outcome, TrialOutcome::Reverted(RevertReason::Rejected));
    assert_eq!(dir_content(&root.join("etc/netplan")), etc_before);
}

#[test]
fn test_trial_without_config_file_restores_runtime_state() {
    let fixture = Fixture::new();
    let root = fixture.root();
    write_file(
        &root,
        "run/systemd/network/10-netplan-old.network",
        "[Match]\nName=old0\n",
    );
    write_file(
        &root,
        "run/NetworkManager/system-connections/netplan-eth1.nmconnection",
        "[connection]\nid=netplan-eth1\n",
    );
    let etc_before = dir_content(&root.join("etc/netplan"));
    let networkd_before = dir_content(&root.join("run/systemd/network"));
    let nm_before =
        dir_content(&root.join("run/NetworkManager/system-connections"));
    let opts = TrialOptions {
        config_file: None,
        ..fixture.options()
    };

    let token = InterruptToken::new();
    token.post(Interrupt::Reject);
    let mut input = ScriptedInput::default();
    let mut out: Vec<u8> = Vec::new();
    let mut session = TrialSession::new(fixture.env(), opts);
    let outcome = session.run(&mut input, &token, &mut out).unwrap();

    assert_eq!(outcome, TrialOutcome::Reverted(RevertReason::Rejected));
    // Regeneration replaced the networkd files during the trial only.
    assert_eq!(fixture.generator.runs.get(), 1);
    assert_eq!(
        dir_content(&root.join("run/systemd/network")),
        networkd_before
    );
    assert_eq!(
        dir_content(&root.join("run/NetworkManager/system-connections")),
        nm_before
    );
    assert_eq!(dir_content(&root.join("etc/netplan")), etc_before);
    assert!(no_temp_area_left(&root));
    assert!(!root.join("run/netplan/netplan-try.ready").exists());
    assert_eq!(
        session.history(),
        &[
            TrialState::Idle,
            TrialState::BackedUp,
            TrialState::Applied,
            TrialState::AwaitingConfirmation,
            TrialState::Rejected,
            TrialState::Reverting,
            TrialState::Cleaned,
        ]
    );
}
