// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::{
    config::{ConfigReader, NetplanState},
    deserializer::{
        option_bool_or_string, option_u32_or_string, string_or_seq,
    },
    ip::normalize_ip,
    route::{validate_route, DeclaredRoute},
    ConfigLocation, DeviceType, ErrorKind, GlobPattern, InterfaceIpAddr,
    MatchRule, NetplanError, NetworkDefinition, Renderer,
};

const CONFIG_DIRS: [&str; 3] = ["lib/netplan", "etc/netplan", "run/netplan"];

/// Loads `*.yaml` from the netplan configuration hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlConfigReader;

impl YamlConfigReader {
    pub fn new() -> Self {
        Self
    }

    /// Files in load order. A file in a later directory shadows a file of
    /// the same name in an earlier one.
    pub fn config_files(
        root_dir: &Path,
    ) -> Result<Vec<PathBuf>, NetplanError> {
        let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
        for dir in CONFIG_DIRS {
            let dir = root_dir.join(dir);
            let entries = match std::fs::read_dir(&dir) {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("yaml")
                {
                    continue;
                }
                if let Some(name) =
                    path.file_name().and_then(|n| n.to_str())
                {
                    files.insert(name.to_string(), path);
                }
            }
        }
        Ok(files.into_values().collect())
    }

    /// Parse a single YAML document, as if it were the only file of the
    /// hierarchy.
    pub fn load_str(
        &self,
        content: &str,
    ) -> Result<NetplanState, NetplanError> {
        self.load_contents(&[(
            PathBuf::from("<string>"),
            content.to_string(),
        )])
    }

    fn load_files(
        &self,
        files: &[PathBuf],
    ) -> Result<NetplanState, NetplanError> {
        let mut contents = Vec::new();
        for file in files {
            log::debug!("Loading {}", file.display());
            let content = std::fs::read_to_string(file)
                .map_err(|e| NetplanError::from(e).with_file(file))?;
            contents.push((file.clone(), content));
        }
        self.load_contents(&contents)
    }

    fn load_contents(
        &self,
        contents: &[(PathBuf, String)],
    ) -> Result<NetplanState, NetplanError> {
        let mut merged = Value::Null;
        let mut origins: BTreeMap<String, PathBuf> = BTreeMap::new();
        for (file, content) in contents {
            let value: Value = serde_yaml::from_str(content)
                .map_err(|e| NetplanError::from(e).with_file(file))?;
            if value.is_null() {
                continue;
            }
            // Type errors are reported against the file that carries them.
            let raw: RawConfig = serde_yaml::from_value(value.clone())
                .map_err(|e| NetplanError::from(e).with_file(file))?;
            if let Some(network) = raw.network.as_ref() {
                for (_, id, _) in network.sections() {
                    origins.insert(id.to_string(), file.clone());
                }
            }
            merge_value(&mut merged, value);
        }
        if merged.is_null() {
            return Ok(NetplanState::new());
        }
        let raw: RawConfig = serde_yaml::from_value(merged)?;
        match raw.network {
            Some(network) => build_state(network, &origins),
            None => Ok(NetplanState::new()),
        }
    }
}

impl ConfigReader for YamlConfigReader {
    fn load_hierarchy(
        &self,
        root_dir: &Path,
    ) -> Result<NetplanState, NetplanError> {
        self.load_files(&Self::config_files(root_dir)?)
    }

    fn load_with_files(
        &self,
        root_dir: &Path,
        extra_files: &[PathBuf],
    ) -> Result<NetplanState, NetplanError> {
        let mut files = Self::config_files(root_dir)?;
        // An extra file replaces a hierarchy file of the same name.
        for extra in extra_files {
            files.retain(|f| f.file_name() != extra.file_name());
        }
        files.extend(extra_files.iter().cloned());
        self.load_files(&files)
    }
}

fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(cur) => merge_value(cur, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    network: Option<RawNetwork>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct RawNetwork {
    #[serde(default, deserialize_with = "option_u32_or_string")]
    #[allow(dead_code)]
    version: Option<u32>,
    renderer: Option<String>,
    #[serde(default)]
    ethernets: BTreeMap<String, RawDefinition>,
    #[serde(default)]
    wifis: BTreeMap<String, RawDefinition>,
    #[serde(default)]
    modems: BTreeMap<String, RawDefinition>,
    #[serde(default)]
    bridges: BTreeMap<String, RawDefinition>,
    #[serde(default)]
    bonds: BTreeMap<String, RawDefinition>,
    #[serde(default)]
    vlans: BTreeMap<String, RawDefinition>,
    #[serde(default)]
    vrfs: BTreeMap<String, RawDefinition>,
    #[serde(default)]
    tunnels: BTreeMap<String, RawDefinition>,
    #[serde(default)]
    dummy_devices: BTreeMap<String, RawDefinition>,
    #[serde(default)]
    virtual_ethernets: BTreeMap<String, RawDefinition>,
    #[serde(default)]
    nm_devices: BTreeMap<String, RawDefinition>,
}

impl RawNetwork {
    fn sections(
        &self,
    ) -> impl Iterator<Item = (DeviceType, &str, &RawDefinition)> {
        [
            (DeviceType::Ethernet, &self.ethernets),
            (DeviceType::Wifi, &self.wifis),
            (DeviceType::Modem, &self.modems),
            (DeviceType::Bridge, &self.bridges),
            (DeviceType::Bond, &self.bonds),
            (DeviceType::Vlan, &self.vlans),
            (DeviceType::Vrf, &self.vrfs),
            (DeviceType::Tunnel, &self.tunnels),
            (DeviceType::Dummy, &self.dummy_devices),
            (DeviceType::Veth, &self.virtual_ethernets),
            (DeviceType::NmDevice, &self.nm_devices),
        ]
        .into_iter()
        .flat_map(|(device_type, defs)| {
            defs.iter()
                .map(move |(id, def)| (device_type, id.as_str(), def))
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct RawMatch {
    name: Option<String>,
    macaddress: Option<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    driver: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAddress {
    Plain(String),
    // `- 192.0.2.1/24: {label: eth0:1}`
    WithOptions(BTreeMap<String, Value>),
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct RawNameservers {
    #[serde(default)]
    addresses: Vec<String>,
    #[serde(default)]
    search: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct RawDefinition {
    #[serde(rename = "match")]
    match_rule: Option<RawMatch>,
    set_name: Option<String>,
    renderer: Option<String>,
    #[serde(default, deserialize_with = "option_bool_or_string")]
    critical: Option<bool>,
    #[serde(default, deserialize_with = "option_bool_or_string")]
    dhcp4: Option<bool>,
    #[serde(default, deserialize_with = "option_bool_or_string")]
    dhcp6: Option<bool>,
    #[serde(default)]
    addresses: Vec<RawAddress>,
    #[serde(default)]
    nameservers: RawNameservers,
    #[serde(default)]
    routes: Vec<DeclaredRoute>,
    gateway4: Option<String>,
    gateway6: Option<String>,
    macaddress: Option<String>,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    parameters: Option<BTreeMap<String, Value>>,
    link: Option<String>,
    embedded_switch_mode: Option<String>,
    #[serde(default, deserialize_with = "option_u32_or_string")]
    virtual_function_count: Option<u32>,
}

fn parse_renderer(value: &str) -> Result<Renderer, NetplanError> {
    match value {
        "networkd" => Ok(Renderer::Networkd),
        "NetworkManager" => Ok(Renderer::NetworkManager),
        _ => Err(NetplanError::new(
            ErrorKind::InvalidConfig,
            format!(
                "Unknown renderer '{value}', expecting networkd or \
                NetworkManager"
            ),
        )),
    }
}

fn config_error(
    msg: String,
    id: &str,
    origins: &BTreeMap<String, PathBuf>,
) -> NetplanError {
    let e = NetplanError::new_config_error(
        msg,
        ConfigLocation {
            file: origins
                .get(id)
                .map(|f| f.display().to_string())
                .unwrap_or_default(),
            ..Default::default()
        },
    );
    log::error!("{e}");
    e
}

fn build_state(
    network: RawNetwork,
    origins: &BTreeMap<String, PathBuf>,
) -> Result<NetplanState, NetplanError> {
    let global_renderer = network
        .renderer
        .as_deref()
        .map(parse_renderer)
        .transpose()?
        .unwrap_or_default();

    let mut state = NetplanState::new();
    for (device_type, id, raw) in network.sections() {
        let def = build_definition(device_type, id, raw, global_renderer)
            .map_err(|e| match e.location() {
                Some(_) => e,
                None => config_error(e.msg().to_string(), id, origins),
            })?;
        state.push(def);
    }

    // Composite membership is declared on the composite side.
    let mut links: Vec<(String, DeviceType, String)> = Vec::new();
    for def in state.iter().filter(|d| d.device_type.is_composite()) {
        for member in def.members.iter() {
            links.push((def.id.clone(), def.device_type, member.clone()));
        }
    }
    for (composite, device_type, member) in links {
        let Some(member_def) = state.definitions.get_mut(&member) else {
            return Err(config_error(
                format!(
                    "{composite}: interface '{member}' is not defined"
                ),
                &composite,
                origins,
            ));
        };
        match device_type {
            DeviceType::Bridge => member_def.links.bridge = Some(composite),
            DeviceType::Bond => member_def.links.bond = Some(composite),
            _ => member_def.links.vrf = Some(composite),
        }
    }
    Ok(state)
}

fn build_definition(
    device_type: DeviceType,
    id: &str,
    raw: &RawDefinition,
    global_renderer: Renderer,
) -> Result<NetworkDefinition, NetplanError> {
    let device_type = if device_type == DeviceType::Ethernet
        && id == "lo"
        && raw.match_rule.is_none()
    {
        DeviceType::Loopback
    } else {
        device_type
    };
    let mut def = NetworkDefinition::new(id, device_type);

    def.renderer = match raw.renderer.as_deref() {
        Some(r) => parse_renderer(r)?,
        None if device_type == DeviceType::NmDevice => {
            Renderer::NetworkManager
        }
        None => global_renderer,
    };

    if let Some(raw_match) = raw.match_rule.as_ref() {
        def.match_rule = Some(MatchRule {
            name: raw_match
                .name
                .as_deref()
                .map(GlobPattern::new)
                .transpose()?,
            mac_address: raw_match.macaddress.clone(),
            driver: raw_match
                .driver
                .iter()
                .map(|d| GlobPattern::new(d))
                .collect::<Result<Vec<_>, _>>()?,
        });
    }
    if raw.set_name.is_some() && raw.match_rule.is_none() {
        return Err(NetplanError::new(
            ErrorKind::InvalidConfig,
            format!("{id}: 'set-name' requires 'match' properties"),
        ));
    }
    def.set_name = raw.set_name.clone();
    def.critical = raw.critical.unwrap_or_default();
    def.dhcp4 = raw.dhcp4.unwrap_or_default();
    def.dhcp6 = raw.dhcp6.unwrap_or_default();

    for address in raw.addresses.iter() {
        let address = match address {
            RawAddress::Plain(a) => a.as_str(),
            RawAddress::WithOptions(a) => match a.keys().next() {
                Some(a) => a.as_str(),
                None => continue,
            },
        };
        if !address.contains('/') {
            return Err(NetplanError::new(
                ErrorKind::InvalidConfig,
                format!(
                    "{id}: address '{address}' is missing /prefixlength"
                ),
            ));
        }
        def.addresses.push(InterfaceIpAddr::try_from(address)?);
    }

    for ns in raw.nameservers.addresses.iter() {
        def.nameservers.addresses.push(normalize_ip(ns)?);
    }
    def.nameservers.search = raw.nameservers.search.clone();

    for route in raw.routes.iter() {
        validate_route(route, id)?;
        def.routes.push(route.clone());
    }
    for gateway in [raw.gateway4.as_deref(), raw.gateway6.as_deref()]
        .into_iter()
        .flatten()
    {
        log::warn!(
            "{id}: gateway4/gateway6 are deprecated, use default routes \
            instead"
        );
        normalize_ip(gateway)?;
        def.routes.push(DeclaredRoute::new_default_gateway(gateway));
    }

    def.mac_address = raw.macaddress.clone();
    if device_type.is_composite() {
        def.members = raw.interfaces.iter().cloned().collect();
    }
    def.parameters = raw.parameters.clone();
    match device_type {
        DeviceType::Vlan => def.links.vlan_link = raw.link.clone(),
        DeviceType::Ethernet => def.links.sriov_link = raw.link.clone(),
        _ => (),
    }
    def.embedded_switch_mode = raw.embedded_switch_mode.clone();
    def.vf_count = raw.virtual_function_count;
    Ok(def)
}
