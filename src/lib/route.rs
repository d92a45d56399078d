// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    deserializer::{option_bool_or_string, option_u32_or_string},
    ip::{
        default_network, is_ipv6_addr, normalize_ip, sanitize_ip_network,
        AddressFamily,
    },
    ErrorKind, NetplanError,
};

pub(crate) const LOCAL_TABLE_ID: u32 = 255;
pub(crate) const MAIN_TABLE_ID: u32 = 254;
const DEFAULT_TABLE_ID: u32 = 253;
const UNSPEC_TABLE_ID: u32 = 0;

const DEFAULT_IPV4_METRIC: u32 = 0;
const DEFAULT_IPV6_METRIC: u32 = 1024;

const RT_TABLES_FILES: [&str; 2] =
    ["usr/share/iproute2/rt_tables", "etc/iproute2/rt_tables"];
const RT_TABLES_DROPIN_DIRS: [&str; 2] =
    ["usr/share/iproute2/rt_tables.d", "etc/iproute2/rt_tables.d"];

/// Route in the form both the declared and the observed side are projected
/// into before comparison. Two routes are equal only when every field is.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default,
)]
#[non_exhaustive]
pub struct NetplanRoute {
    pub family: AddressFamily,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub metric: u32,
    pub scope: String,
    #[serde(rename = "type")]
    pub route_type: String,
    pub protocol: String,
    pub table: u32,
}

impl NetplanRoute {
    pub(crate) fn default_metric(family: AddressFamily) -> u32 {
        match family {
            AddressFamily::IPv4 => DEFAULT_IPV4_METRIC,
            AddressFamily::IPv6 => DEFAULT_IPV6_METRIC,
        }
    }

    pub fn is_default(&self) -> bool {
        self.to == default_network(self.family)
    }
}

impl std::fmt::Display for NetplanRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to)?;
        if let Some(via) = self.via.as_ref() {
            write!(f, " via {via}")?;
        }
        if let Some(from) = self.from.as_ref() {
            write!(f, " from {from}")?;
        }
        write!(
            f,
            " metric {} scope {} type {} proto {} table {}",
            self.metric, self.scope, self.route_type, self.protocol, self.table
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RouteTableRef {
    Id(u32),
    Name(String),
}

/// Route as written in the declared configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct DeclaredRoute {
    pub to: Option<String>,
    pub via: Option<String>,
    pub from: Option<String>,
    #[serde(default, deserialize_with = "option_u32_or_string")]
    pub metric: Option<u32>,
    pub scope: Option<String>,
    #[serde(rename = "type")]
    pub route_type: Option<String>,
    pub table: Option<RouteTableRef>,
    #[serde(default, deserialize_with = "option_bool_or_string")]
    pub on_link: Option<bool>,
}

impl DeclaredRoute {
    pub(crate) fn new_default_gateway(via: &str) -> Self {
        Self {
            to: Some("default".to_string()),
            via: Some(via.to_string()),
            ..Default::default()
        }
    }

    pub fn family(&self) -> AddressFamily {
        match (self.to.as_deref(), self.via.as_deref()) {
            (Some(to), _) if to != "default" && is_ipv6_addr(to) => {
                AddressFamily::IPv6
            }
            (_, Some(via)) if is_ipv6_addr(via) => AddressFamily::IPv6,
            _ => AddressFamily::IPv4,
        }
    }

    /// Fill in the kernel defaults and resolve symbolic table names.
    pub fn project(
        &self,
        tables: &RouteTables,
    ) -> Result<NetplanRoute, NetplanError> {
        let family = self.family();
        let to = match self.to.as_deref() {
            None | Some("default") => default_network(family).to_string(),
            Some(to) => sanitize_ip_network(to)?,
        };
        let via = self.via.as_deref().map(normalize_ip).transpose()?;
        let from = self.from.as_deref().map(normalize_ip).transpose()?;
        let scope = match self.scope.as_deref() {
            Some(scope) => scope.to_string(),
            None if via.is_some() => "global".to_string(),
            None => "link".to_string(),
        };
        let table = match self.table.as_ref() {
            Some(RouteTableRef::Id(id)) => *id,
            Some(RouteTableRef::Name(name)) => tables.resolve(name),
            None => MAIN_TABLE_ID,
        };
        Ok(NetplanRoute {
            family,
            to,
            via,
            from,
            metric: self
                .metric
                .unwrap_or_else(|| NetplanRoute::default_metric(family)),
            scope,
            route_type: self
                .route_type
                .clone()
                .unwrap_or_else(|| "unicast".to_string()),
            protocol: "static".to_string(),
            table,
        })
    }
}

/// Route table name to id mapping from `rt_tables`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTables {
    names: BTreeMap<String, u32>,
}

impl Default for RouteTables {
    fn default() -> Self {
        let mut names = BTreeMap::new();
        names.insert("local".to_string(), LOCAL_TABLE_ID);
        names.insert("main".to_string(), MAIN_TABLE_ID);
        names.insert("default".to_string(), DEFAULT_TABLE_ID);
        names.insert("unspec".to_string(), UNSPEC_TABLE_ID);
        Self { names }
    }
}

impl RouteTables {
    pub fn load(root_dir: &Path) -> Result<Self, NetplanError> {
        let mut ret = Self::default();
        for file in RT_TABLES_FILES {
            ret.load_file(&root_dir.join(file))?;
        }
        for dir in RT_TABLES_DROPIN_DIRS {
            let dir = root_dir.join(dir);
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let mut files = Vec::new();
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("conf") {
                    files.push(path);
                }
            }
            files.sort();
            for file in files {
                ret.load_file(&file)?;
            }
        }
        Ok(ret)
    }

    fn load_file(&mut self, path: &Path) -> Result<(), NetplanError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        self.parse(&content);
        Ok(())
    }

    pub(crate) fn parse(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(id), Some(name)) = (fields.next(), fields.next()) else {
                continue;
            };
            match parse_table_id(id) {
                Some(id) => {
                    self.names.insert(name.to_string(), id);
                }
                None => {
                    log::debug!("Ignoring invalid rt_tables line: {line}");
                }
            }
        }
    }

    /// Numeric ids pass through, unknown names resolve to 0.
    pub fn resolve(&self, name: &str) -> u32 {
        if let Some(id) = parse_table_id(name) {
            return id;
        }
        self.names.get(name).copied().unwrap_or(UNSPEC_TABLE_ID)
    }
}

fn parse_table_id(value: &str) -> Option<u32> {
    if let Some(hex) = value.strip_prefix("0x") {
        u32::from_str_radix(hex, 16).ok()
    } else {
        value.parse::<u32>().ok()
    }
}

pub(crate) fn validate_route(
    route: &DeclaredRoute,
    id: &str,
) -> Result<(), NetplanError> {
    if route.to.is_none() {
        return Err(NetplanError::new(
            ErrorKind::InvalidConfig,
            format!("{id}: route is missing the 'to' destination"),
        ));
    }
    Ok(())
}
