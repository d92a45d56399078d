// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    apply::{sysfs_driver, sysfs_is_wireless},
    command::run_command,
    ip::normalize_ip,
    observed::{
        parse_ip_address_show, parse_ip_route_show, ManagedBy,
        ObservedState, ObservedStateReader,
    },
    AddressFamily, DeviceType, NetplanError, RouteTables,
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NetworkctlLink {
    pub(crate) index: u32,
    pub(crate) name: String,
    #[serde(rename = "Type")]
    pub(crate) iface_type: Option<String>,
    pub(crate) administrative_state: Option<String>,
    pub(crate) network_file: Option<String>,
}

impl NetworkctlLink {
    pub(crate) fn is_managed(&self) -> bool {
        !matches!(
            self.administrative_state.as_deref(),
            None | Some("unmanaged")
        )
    }

    /// Declared id encoded in `<prio>-netplan-<id>.network`.
    pub(crate) fn declared_id(&self) -> Option<String> {
        let file = self.network_file.as_deref()?;
        let base = Path::new(file).file_name()?.to_str()?;
        let (_, id) = base.split_once("netplan-")?;
        id.strip_suffix(".network").map(|i| i.to_string())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct NetworkctlReply {
    #[serde(default)]
    interfaces: Vec<NetworkctlLink>,
}

pub(crate) fn parse_networkctl_list(
    output: &str,
) -> Result<Vec<NetworkctlLink>, NetplanError> {
    let reply: NetworkctlReply = serde_json::from_str(output)?;
    Ok(reply.interfaces)
}

fn split_nmcli_terse(line: &str) -> Vec<String> {
    let mut ret = Vec::new();
    let mut cur = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    cur.push(next);
                }
            }
            ':' => ret.push(std::mem::take(&mut cur)),
            c => cur.push(c),
        }
    }
    ret.push(cur);
    ret
}

/// Parse `nmcli -t -f DEVICE,FILENAME connection show --active` into
/// `(device, declared id)`. The id is taken from the
/// `netplan-<id>[-<ssid>].nmconnection` keyfile naming and is `None` for
/// connections not generated from the declared configuration.
pub(crate) fn parse_nmcli_active(
    output: &str,
) -> Vec<(String, Option<String>)> {
    let mut ret = Vec::new();
    for line in output.lines() {
        let fields = split_nmcli_terse(line);
        let (Some(dev), Some(file)) = (fields.first(), fields.get(1)) else {
            continue;
        };
        if dev.is_empty() || dev == "--" {
            continue;
        }
        let id = Path::new(file)
            .file_name()
            .and_then(|f| f.to_str())
            .and_then(|f| f.strip_prefix("netplan-"))
            .and_then(|f| f.strip_suffix(".nmconnection"))
            .map(|f| f.to_string());
        ret.push((dev.to_string(), id));
    }
    ret
}

/// Parse `resolvectl dns` or `resolvectl domain` output into per interface
/// index values. Routing only domains (`~example.com`) are skipped.
pub(crate) fn parse_resolvectl(output: &str) -> BTreeMap<u32, Vec<String>> {
    let mut ret: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for line in output.lines() {
        let Some(rest) = line.trim().strip_prefix("Link ") else {
            continue;
        };
        let Some((head, values)) = rest.split_once("):") else {
            continue;
        };
        let Some(index) = head
            .split_whitespace()
            .next()
            .and_then(|i| i.parse::<u32>().ok())
        else {
            continue;
        };
        let entry = ret.entry(index).or_default();
        for value in values.split_whitespace() {
            if value.starts_with('~') {
                continue;
            }
            entry.push(value.to_string());
        }
    }
    ret
}

/// Gathers the observed state from `ip`, `networkctl`, `nmcli`,
/// `resolvectl` and sysfs.
#[derive(Debug, Clone)]
pub struct SystemStateReader {
    root_dir: PathBuf,
}

impl Default for SystemStateReader {
    fn default() -> Self {
        Self::new(Path::new("/"))
    }
}

fn optional_command(program: &str, args: &[&str]) -> Option<String> {
    match run_command(program, args) {
        Ok(output) => Some(output),
        Err(e) => {
            log::warn!("Ignoring {program} state: {e}");
            None
        }
    }
}

impl SystemStateReader {
    pub fn new(root_dir: &Path) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
        }
    }

    fn read_links(&self, state: &mut ObservedState) {
        let Some(output) =
            optional_command("ip", &["-j", "-d", "address", "show"])
        else {
            return;
        };
        match parse_ip_address_show(&output) {
            Ok(ifaces) => state.interfaces = ifaces,
            Err(e) => log::warn!("Ignoring ip address state: {e}"),
        }
        for iface in state.interfaces.values_mut() {
            iface.driver = sysfs_driver(&self.root_dir, &iface.name);
            if sysfs_is_wireless(&self.root_dir, &iface.name) {
                iface.iface_type = DeviceType::Wifi;
            }
        }
    }

    fn read_routes(&self, state: &mut ObservedState) {
        for (family, flag) in
            [(AddressFamily::IPv4, "-4"), (AddressFamily::IPv6, "-6")]
        {
            let Some(output) = optional_command(
                "ip",
                &["-j", flag, "route", "show", "table", "all"],
            ) else {
                continue;
            };
            let routes = match parse_ip_route_show(
                &output,
                family,
                &state.route_tables,
            ) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("Ignoring {family} routes: {e}");
                    continue;
                }
            };
            for (dev, route) in routes {
                if let Some(iface) = state.interfaces.get_mut(&dev) {
                    iface.routes.push(route);
                }
            }
        }
    }

    fn read_networkd(&self, state: &mut ObservedState) {
        let Some(output) = optional_command("networkctl", &["--json=short"])
        else {
            return;
        };
        let links = match parse_networkctl_list(&output) {
            Ok(l) => l,
            Err(e) => {
                log::warn!("Ignoring networkctl state: {e}");
                return;
            }
        };
        for link in links {
            let Some(iface) = state.get_by_index_mut(link.index) else {
                continue;
            };
            match link.iface_type.as_deref() {
                Some("wlan") => iface.iface_type = DeviceType::Wifi,
                Some("wwan") => iface.iface_type = DeviceType::Modem,
                _ => (),
            }
            if link.is_managed() {
                iface.managed_by = ManagedBy::Networkd;
                iface.declared_id = link.declared_id();
            }
        }
    }

    fn read_network_manager(&self, state: &mut ObservedState) {
        let Some(output) = optional_command(
            "nmcli",
            &["-t", "-f", "DEVICE,FILENAME", "connection", "show", "--active"],
        ) else {
            return;
        };
        for (dev, id) in parse_nmcli_active(&output) {
            if let Some(iface) = state.interfaces.get_mut(&dev) {
                iface.managed_by = ManagedBy::NetworkManager;
                iface.declared_id = id;
            }
        }
    }

    fn read_resolver(&self, state: &mut ObservedState) {
        if let Some(output) = optional_command("resolvectl", &["dns"]) {
            for (index, servers) in parse_resolvectl(&output) {
                if let Some(iface) = state.get_by_index_mut(index) {
                    iface.dns_addresses = servers
                        .iter()
                        .filter_map(|s| normalize_ip(s).ok())
                        .collect();
                }
            }
        }
        if let Some(output) = optional_command("resolvectl", &["domain"]) {
            for (index, domains) in parse_resolvectl(&output) {
                if let Some(iface) = state.get_by_index_mut(index) {
                    iface.dns_search = domains;
                }
            }
        }
    }
}

impl ObservedStateReader for SystemStateReader {
    fn read(&self) -> Result<ObservedState, NetplanError> {
        let mut state = ObservedState::new();
        state.route_tables = RouteTables::load(&self.root_dir)?;
        self.read_links(&mut state);
        self.read_routes(&mut state);
        self.read_networkd(&mut state);
        self.read_network_manager(&mut state);
        self.read_resolver(&mut state);
        log::debug!(
            "Observed {} interfaces: {:?}",
            state.interfaces.len(),
            state.interfaces.keys().collect::<Vec<_>>()
        );
        Ok(state)
    }
}
