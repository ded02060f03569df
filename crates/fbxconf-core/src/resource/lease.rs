// # Static DHCP lease
//
// A lease binds a MAC address to a fixed IP. The router keeps at most one
// lease per MAC, so the MAC is the identity key and the IP is the only
// mutable attribute.

use super::{ResourceKind, RouterResource};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// A link-layer (EUI-48) address
///
/// Parses `aa:bb:cc:dd:ee:ff` and `AA-BB-CC-DD-EE-FF` alike and always
/// displays in lowercase colon-separated form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::validation(format!("invalid MAC address: '{s}'"));

        let trimmed = s.trim();
        let separator = if trimmed.contains('-') { '-' } else { ':' };
        let mut parts = trimmed.split(separator);

        let mut octets = [0u8; 6];
        for octet in &mut octets {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// A validated static DHCP lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticLease {
    mac: MacAddress,
    ip: IpAddr,
}

impl StaticLease {
    /// Validate and build a lease from textual input
    ///
    /// # Errors
    ///
    /// `Error::Validation` if `mac` is not a MAC address or `ip` is not an
    /// IPv4/IPv6 literal.
    pub fn new(mac: &str, ip: &str) -> Result<Self> {
        let mac = mac.parse()?;
        let ip = ip.trim().parse().map_err(|_| {
            Error::validation(format!("invalid IP address for static lease: '{ip}'"))
        })?;

        Ok(Self { mac, ip })
    }

    /// The MAC address
    pub const fn mac(&self) -> MacAddress {
        self.mac
    }

    /// The reserved IP address
    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Raw parameters equivalent to this lease
    pub fn params(&self) -> StaticLeaseParams {
        StaticLeaseParams {
            mac: self.mac.to_string(),
            ip: self.ip.to_string(),
        }
    }
}

impl RouterResource for StaticLease {
    const KIND: ResourceKind = ResourceKind::StaticLease;

    type Key = MacAddress;

    fn identity_key(&self) -> MacAddress {
        self.mac
    }

    fn differing_attributes(&self, current: &Self) -> Vec<&'static str> {
        let Self { mac: _, ip } = self;

        let mut differing = Vec::new();
        if *ip != current.ip {
            differing.push("ip");
        }
        differing
    }
}

/// Unvalidated static lease input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticLeaseParams {
    /// MAC address of the device
    pub mac: String,
    /// IPv4 or IPv6 address to reserve
    pub ip: String,
}

impl TryFrom<StaticLeaseParams> for StaticLease {
    type Error = Error;

    fn try_from(params: StaticLeaseParams) -> Result<Self> {
        Self::new(&params.mac, &params.ip)
    }
}
