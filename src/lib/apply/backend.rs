// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use crate::{
    command::{run_command, run_command_status},
    NetplanError, NetplanState,
};

const NETWORKD_SERVICE: &str = "systemd-networkd.service";
const NETWORK_MANAGER_SERVICE: &str = "NetworkManager.service";
const OVS_CLEANUP_SERVICE: &str = "netplan-ovs-cleanup.service";
const DEFAULT_GENERATOR: &str = "/usr/libexec/netplan/generate";

/// Operations on the network backends. Implementations decide how, callers
/// decide whether and for which interfaces.
pub trait BackendControl {
    fn stop_network_manager(&self) -> Result<(), NetplanError>;
    fn start_network_manager(&self) -> Result<(), NetplanError>;
    fn disconnect_device(&self, name: &str) -> Result<(), NetplanError>;
    /// Reload networkd and reconfigure `devices`.
    fn reload_networkd(&self, devices: &[String]) -> Result<(), NetplanError>;
    fn cleanup_ovs(&self) -> Result<(), NetplanError>;
    /// Bring the link down, rename it and bring it back up.
    fn rename_link(&self, from: &str, to: &str) -> Result<(), NetplanError>;
    fn flush_addresses(&self, name: &str) -> Result<(), NetplanError>;
    fn delete_link(&self, name: &str) -> Result<(), NetplanError>;
    fn apply_sriov(&self, state: &NetplanState) -> Result<(), NetplanError>;
}

/// Drives `systemctl`, `networkctl`, `nmcli` and `ip`.
#[derive(Debug, Clone, Default)]
pub struct SystemBackend;

impl SystemBackend {
    pub fn new() -> Self {
        Self
    }

    fn service_active(service: &str) -> bool {
        run_command("systemctl", &["is-active", "--quiet", service]).is_ok()
    }
}

impl BackendControl for SystemBackend {
    fn stop_network_manager(&self) -> Result<(), NetplanError> {
        if Self::service_active(NETWORK_MANAGER_SERVICE) {
            run_command_status(
                "systemctl",
                &["stop", "--no-block", NETWORK_MANAGER_SERVICE],
            )?;
        }
        Ok(())
    }

    fn start_network_manager(&self) -> Result<(), NetplanError> {
        run_command_status(
            "systemctl",
            &["start", "--no-block", NETWORK_MANAGER_SERVICE],
        )
    }

    fn disconnect_device(&self, name: &str) -> Result<(), NetplanError> {
        run_command_status("nmcli", &["device", "disconnect", name])
    }

    fn reload_networkd(&self, devices: &[String]) -> Result<(), NetplanError> {
        if !Self::service_active(NETWORKD_SERVICE) {
            run_command_status("systemctl", &["start", NETWORKD_SERVICE])?;
        }
        run_command_status("networkctl", &["reload"])?;
        if !devices.is_empty() {
            let mut args = vec!["reconfigure"];
            args.extend(devices.iter().map(|d| d.as_str()));
            run_command_status("networkctl", &args)?;
        }
        Ok(())
    }

    fn cleanup_ovs(&self) -> Result<(), NetplanError> {
        run_command_status("systemctl", &["start", OVS_CLEANUP_SERVICE])
    }

    fn rename_link(&self, from: &str, to: &str) -> Result<(), NetplanError> {
        run_command_status("ip", &["link", "set", "dev", from, "down"])?;
        run_command_status("ip", &["link", "set", "dev", from, "name", to])?;
        run_command_status("ip", &["link", "set", "dev", to, "up"])
    }

    fn flush_addresses(&self, name: &str) -> Result<(), NetplanError> {
        run_command_status("ip", &["address", "flush", "dev", name])
    }

    fn delete_link(&self, name: &str) -> Result<(), NetplanError> {
        run_command_status("ip", &["link", "delete", "dev", name])
    }

    fn apply_sriov(&self, state: &NetplanState) -> Result<(), NetplanError> {
        for def in state.iter().filter(|d| d.vf_count.is_some()) {
            log::info!(
                "{}: SR-IOV settings (virtual-function-count {:?}, \
                embedded-switch-mode {:?}) are left to the SR-IOV service",
                def.id,
                def.vf_count,
                def.embedded_switch_mode
            );
        }
        Ok(())
    }
}

/// Produces the backend artifacts from the declared configuration.
pub trait Generator {
    fn generate(&self, root_dir: &Path) -> Result<(), NetplanError>;
}

/// Runs the external generator binary.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    path: PathBuf,
}

impl Default for CommandGenerator {
    fn default() -> Self {
        Self::new(Path::new(DEFAULT_GENERATOR))
    }
}

impl CommandGenerator {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Generator for CommandGenerator {
    fn generate(&self, root_dir: &Path) -> Result<(), NetplanError> {
        let program = self.path.display().to_string();
        if root_dir == Path::new("/") {
            run_command_status(&program, &[])
        } else {
            let root = root_dir.display().to_string();
            run_command_status(&program, &["--root-dir", root.as_str()])
        }
    }
}
