// SPDX-License-Identifier: Apache-2.0

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, NetplanError};

const IPV4_ADDR_LEN: u8 = 32;
const IPV6_ADDR_LEN: u8 = 128;

#[derive(
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum AddressFamily {
    IPv4,
    IPv6,
}

impl Default for AddressFamily {
    fn default() -> Self {
        Self::IPv4
    }
}

impl From<&IpAddr> for AddressFamily {
    fn from(ip: &IpAddr) -> Self {
        if ip.is_ipv6() {
            Self::IPv6
        } else {
            Self::IPv4
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::IPv4 => "ipv4",
                Self::IPv6 => "ipv6",
            }
        )
    }
}

/// IP address with prefix length, rendered in canonical form
/// (`192.0.2.1/24`, `2001:db8::1/64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub struct InterfaceIpAddr {
    pub ip: IpAddr,
    pub prefix_length: u8,
}

impl InterfaceIpAddr {
    pub fn new(ip: IpAddr, prefix_length: u8) -> Self {
        Self { ip, prefix_length }
    }

    pub fn family(&self) -> AddressFamily {
        AddressFamily::from(&self.ip)
    }

    pub fn is_link_local(&self) -> bool {
        match self.ip {
            IpAddr::V4(ip) => ip.is_link_local(),
            IpAddr::V6(ip) => is_ipv6_unicast_link_local(&ip),
        }
    }
}

impl std::fmt::Display for InterfaceIpAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_length)
    }
}

impl std::convert::TryFrom<&str> for InterfaceIpAddr {
    type Error = NetplanError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut addr: Vec<&str> = value.split('/').collect();
        addr.resize(2, "");
        let ip = IpAddr::from_str(addr[0]).map_err(|e| {
            NetplanError::new(
                ErrorKind::InvalidConfig,
                format!("Invalid IP address {}: {e}", addr[0]),
            )
        })?;

        let max_len = if ip.is_ipv6() {
            IPV6_ADDR_LEN
        } else {
            IPV4_ADDR_LEN
        };
        let prefix_length = if addr[1].is_empty() {
            max_len
        } else {
            addr[1].parse::<u8>().map_err(|parse_error| {
                NetplanError::new(
                    ErrorKind::InvalidConfig,
                    format!("Invalid IP address {value}: {parse_error}"),
                )
            })?
        };
        if prefix_length > max_len {
            return Err(NetplanError::new(
                ErrorKind::InvalidConfig,
                format!(
                    "Invalid prefix length {prefix_length} of IP address \
                    {value}"
                ),
            ));
        }
        Ok(Self { ip, prefix_length })
    }
}

impl Serialize for InterfaceIpAddr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Render an address in canonical compressed form with its prefix length
/// attached. Addresses without prefix get the full host prefix.
pub fn normalize_address(value: &str) -> Result<String, NetplanError> {
    Ok(InterfaceIpAddr::try_from(value)?.to_string())
}

pub(crate) fn is_ipv6_addr(addr: &str) -> bool {
    addr.contains(':')
}

// Copy from Rust official std::net::Ipv6Addr::is_unicast_link_local() which
// is experimental.
pub(crate) fn is_ipv6_unicast_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

pub(crate) fn is_ipv6_multicast_net(ip_net: &str) -> bool {
    ip_net.starts_with("ff")
}

/// Mask host bits off a network, `192.0.2.1/24` becomes `192.0.2.0/24`.
/// `default` is not handled here.
pub(crate) fn sanitize_ip_network(
    ip_net: &str,
) -> Result<String, NetplanError> {
    let addr = InterfaceIpAddr::try_from(ip_net)?;
    let network = match addr.ip {
        IpAddr::V4(ip) => {
            let bits = u32::from(ip);
            let mask = if addr.prefix_length == 0 {
                0
            } else {
                u32::MAX << (IPV4_ADDR_LEN - addr.prefix_length)
            };
            IpAddr::V4(Ipv4Addr::from(bits & mask))
        }
        IpAddr::V6(ip) => {
            let bits = u128::from(ip);
            let mask = if addr.prefix_length == 0 {
                0
            } else {
                u128::MAX << (IPV6_ADDR_LEN - addr.prefix_length)
            };
            IpAddr::V6(Ipv6Addr::from(bits & mask))
        }
    };
    Ok(format!("{}/{}", network, addr.prefix_length))
}

pub(crate) fn default_network(family: AddressFamily) -> &'static str {
    match family {
        AddressFamily::IPv4 => "0.0.0.0/0",
        AddressFamily::IPv6 => "::/0",
    }
}

/// Canonical text form of a bare IP address (no prefix), used for gateways
/// and nameservers. Zone suffixes (`fe80::1%eth0`) are dropped.
pub(crate) fn normalize_ip(value: &str) -> Result<String, NetplanError> {
    let value = value.split('%').next().unwrap_or(value);
    Ok(IpAddr::from_str(value)?.to_string())
}
