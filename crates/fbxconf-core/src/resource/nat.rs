// # NAT port forwarding rule
//
// The router distinguishes rules by (lan_ip, lan_port, wan_port_start,
// wan_port_end, ip_proto). Two rules sharing that tuple are the same rule,
// whatever their src_ip, enabled flag or comment say; those three are the
// mutable attributes.

use super::{ResourceKind, RouterResource};
use crate::error::{Error, Result};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Source address meaning "any source"
pub const ANY_SOURCE: &str = "0.0.0.0";

/// Transport protocol of a forwarding rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpProto {
    /// TCP
    Tcp,
    /// UDP
    Udp,
}

impl IpProto {
    /// Lowercase protocol name, as the router expects it
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl FromStr for IpProto {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(Error::validation(format!(
                "unsupported ip_proto '{s}' (expected tcp or udp)"
            ))),
        }
    }
}

impl fmt::Display for IpProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An IPv4 host or IPv4 CIDR block
///
/// Blocks are kept in network form with their host bits cleared, so
/// `10.1.2.3/8` and `10.0.0.0/8` compare equal. A `/32` block is the host it
/// covers: `192.168.1.42/32` and `192.168.1.42` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ipv4Target {
    /// A single address
    Host(Ipv4Addr),
    /// A network block
    Block(Ipv4Net),
}

impl Ipv4Target {
    /// `0.0.0.0`, any source
    pub const ANY: Self = Self::Host(Ipv4Addr::UNSPECIFIED);
}

impl FromStr for Ipv4Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || Error::validation(format!("invalid IPv4 address or CIDR block: '{s}'"));

        if trimmed.contains('/') {
            let net: Ipv4Net = trimmed.parse().map_err(|_| invalid())?;
            if net.prefix_len() == 32 {
                Ok(Self::Host(net.addr()))
            } else {
                Ok(Self::Block(net.trunc()))
            }
        } else {
            trimmed.parse().map(Self::Host).map_err(|_| invalid())
        }
    }
}

impl fmt::Display for Ipv4Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(addr) => addr.fmt(f),
            Self::Block(net) => net.fmt(f),
        }
    }
}

/// Identity key of a NAT rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NatRuleKey {
    /// Internal address traffic is forwarded to
    pub lan_ip: Ipv4Target,
    /// Internal port traffic is forwarded to
    pub lan_port: u16,
    /// First external port
    pub wan_port_start: u16,
    /// Last external port
    pub wan_port_end: u16,
    /// Protocol
    pub ip_proto: IpProto,
}

impl fmt::Display for NatRuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{} -> {}:{}",
            self.ip_proto, self.wan_port_start, self.wan_port_end, self.lan_ip, self.lan_port
        )
    }
}

/// A validated NAT port forwarding rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatRule {
    lan_ip: Ipv4Target,
    lan_port: u16,
    wan_port_start: u16,
    wan_port_end: u16,
    ip_proto: IpProto,
    src_ip: Ipv4Target,
    enabled: bool,
    comment: String,
}

impl NatRule {
    /// Validate and build a rule
    ///
    /// # Errors
    ///
    /// `Error::Validation` when a port is outside [1, 65535], the WAN range
    /// is inverted, the protocol is not tcp/udp, or an address is not an
    /// IPv4 literal or CIDR block.
    pub fn new(params: NatRuleParams) -> Result<Self> {
        let lan_port = port("lan_port", params.lan_port)?;
        let wan_port_start = port("wan_port_start", params.wan_port_start)?;
        let wan_port_end = port("wan_port_end", params.wan_port_end)?;

        if wan_port_start > wan_port_end {
            return Err(Error::validation(format!(
                "wan_port_start ({wan_port_start}) must not exceed wan_port_end ({wan_port_end})"
            )));
        }

        Ok(Self {
            lan_ip: target("lan_ip", &params.lan_ip)?,
            lan_port,
            wan_port_start,
            wan_port_end,
            ip_proto: params.ip_proto.parse()?,
            src_ip: target("src_ip", &params.src_ip)?,
            enabled: params.enabled,
            comment: params.comment,
        })
    }

    /// Internal address traffic is forwarded to
    pub const fn lan_ip(&self) -> Ipv4Target {
        self.lan_ip
    }

    /// Internal port traffic is forwarded to
    pub const fn lan_port(&self) -> u16 {
        self.lan_port
    }

    /// First external port
    pub const fn wan_port_start(&self) -> u16 {
        self.wan_port_start
    }

    /// Last external port
    pub const fn wan_port_end(&self) -> u16 {
        self.wan_port_end
    }

    /// Forwarded protocol
    pub const fn ip_proto(&self) -> IpProto {
        self.ip_proto
    }

    /// Allowed source, [`Ipv4Target::ANY`] for any
    pub const fn src_ip(&self) -> Ipv4Target {
        self.src_ip
    }

    /// Whether the rule is active
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Free text comment
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Raw parameters equivalent to this rule
    pub fn params(&self) -> NatRuleParams {
        NatRuleParams {
            lan_ip: self.lan_ip.to_string(),
            lan_port: i64::from(self.lan_port),
            wan_port_start: i64::from(self.wan_port_start),
            wan_port_end: i64::from(self.wan_port_end),
            ip_proto: self.ip_proto.to_string(),
            src_ip: self.src_ip.to_string(),
            enabled: self.enabled,
            comment: self.comment.clone(),
        }
    }
}

impl RouterResource for NatRule {
    const KIND: ResourceKind = ResourceKind::NatRule;

    type Key = NatRuleKey;

    fn identity_key(&self) -> NatRuleKey {
        NatRuleKey {
            lan_ip: self.lan_ip,
            lan_port: self.lan_port,
            wan_port_start: self.wan_port_start,
            wan_port_end: self.wan_port_end,
            ip_proto: self.ip_proto,
        }
    }

    fn differing_attributes(&self, current: &Self) -> Vec<&'static str> {
        // Identity fields are listed so a new field cannot be added silently.
        let Self {
            lan_ip: _,
            lan_port: _,
            wan_port_start: _,
            wan_port_end: _,
            ip_proto: _,
            src_ip,
            enabled,
            comment,
        } = self;

        let mut differing = Vec::new();
        if *src_ip != current.src_ip {
            differing.push("src_ip");
        }
        if *enabled != current.enabled {
            differing.push("enabled");
        }
        if *comment != current.comment {
            differing.push("comment");
        }
        differing
    }
}

impl TryFrom<NatRuleParams> for NatRule {
    type Error = Error;

    fn try_from(params: NatRuleParams) -> Result<Self> {
        Self::new(params)
    }
}

/// Unvalidated NAT rule input
///
/// Ports are signed 64-bit so that out-of-range input reaches validation
/// instead of failing to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatRuleParams {
    /// Internal address to forward to
    pub lan_ip: String,
    /// Internal port to forward to
    pub lan_port: i64,
    /// First external port
    pub wan_port_start: i64,
    /// Last external port
    pub wan_port_end: i64,
    /// `tcp` or `udp`
    pub ip_proto: String,
    /// Allowed source, `0.0.0.0` for any
    #[serde(default = "default_src_ip")]
    pub src_ip: String,
    /// Whether the rule is active
    pub enabled: bool,
    /// Free text comment
    #[serde(default)]
    pub comment: String,
}

impl NatRuleParams {
    /// Create parameters with the default source (`0.0.0.0`) and an empty comment
    pub fn new(
        lan_ip: impl Into<String>,
        lan_port: i64,
        wan_ports: (i64, i64),
        ip_proto: impl Into<String>,
        enabled: bool,
    ) -> Self {
        Self {
            lan_ip: lan_ip.into(),
            lan_port,
            wan_port_start: wan_ports.0,
            wan_port_end: wan_ports.1,
            ip_proto: ip_proto.into(),
            src_ip: default_src_ip(),
            enabled,
            comment: String::new(),
        }
    }

    /// Set the allowed source
    pub fn with_src_ip(mut self, src_ip: impl Into<String>) -> Self {
        self.src_ip = src_ip.into();
        self
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

fn default_src_ip() -> String {
    ANY_SOURCE.to_string()
}

fn port(field: &str, value: i64) -> Result<u16> {
    u16::try_from(value)
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| Error::validation(format!("{field} must be in [1, 65535], got {value}")))
}

fn target(field: &str, value: &str) -> Result<Ipv4Target> {
    value
        .parse()
        .map_err(|e: Error| Error::validation(format!("{field}: {}", e.detail())))
}
