//! Resource model
//!
//! The two router resources fbxconf manages, as a closed set:
//!
//! - [`StaticLease`]: a static DHCP reservation, identified by its MAC
//! - [`NatRule`]: a port forwarding rule, identified by its 5-tuple
//!
//! Validated values ([`Resource`]) and raw caller input ([`ResourceParams`])
//! are distinct types. Fields of the validated types are private, so a
//! resource that breaks an invariant cannot be constructed.

pub mod lease;
pub mod nat;

pub use lease::{MacAddress, StaticLease, StaticLeaseParams};
pub use nat::{IpProto, Ipv4Target, NatRule, NatRuleKey, NatRuleParams};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Kind of router resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Static DHCP lease
    StaticLease,
    /// NAT port forwarding rule
    NatRule,
}

impl ResourceKind {
    /// Name used in logs and reports
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StaticLease => "static_lease",
            Self::NatRule => "nat_rule",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Router-assigned identifier of an existing resource
///
/// The Freebox uses the MAC for leases and an integer for NAT rules; both
/// are carried as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create an identifier from its textual form
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Behaviour shared by every managed resource type
///
/// The reconciler only needs two things from a resource: the key that
/// matches it against router state, and which of its mutable attributes
/// differ from a router entry with the same key.
pub trait RouterResource: Clone + fmt::Debug + Send + Sync + 'static {
    /// Which kind this type represents
    const KIND: ResourceKind;

    /// Identity key type
    type Key: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync;

    /// The attributes the router uses to tell two entries apart
    fn identity_key(&self) -> Self::Key;

    /// Names of the mutable attributes whose value differs from `current`
    ///
    /// Implementations must consider every mutable attribute. An empty
    /// result means no update is needed.
    fn differing_attributes(&self, current: &Self) -> Vec<&'static str>;
}

/// A validated desired resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Static DHCP lease
    StaticLease(StaticLease),
    /// NAT port forwarding rule
    NatRule(NatRule),
}

impl Resource {
    /// The resource kind
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::StaticLease(_) => ResourceKind::StaticLease,
            Self::NatRule(_) => ResourceKind::NatRule,
        }
    }

    /// The identity key, tagged by kind
    pub fn identity_key(&self) -> IdentityKey {
        match self {
            Self::StaticLease(lease) => IdentityKey::StaticLease(lease.identity_key()),
            Self::NatRule(rule) => IdentityKey::NatRule(rule.identity_key()),
        }
    }

    /// Raw parameters equivalent to this resource
    pub fn params(&self) -> ResourceParams {
        match self {
            Self::StaticLease(lease) => ResourceParams::StaticLease(lease.params()),
            Self::NatRule(rule) => ResourceParams::NatRule(rule.params()),
        }
    }
}

impl From<StaticLease> for Resource {
    fn from(lease: StaticLease) -> Self {
        Self::StaticLease(lease)
    }
}

impl From<NatRule> for Resource {
    fn from(rule: NatRule) -> Self {
        Self::NatRule(rule)
    }
}

/// Identity key of any resource, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// Key of a static lease
    StaticLease(MacAddress),
    /// Key of a NAT rule
    NatRule(NatRuleKey),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticLease(mac) => write!(f, "static_lease {mac}"),
            Self::NatRule(key) => write!(f, "nat_rule {key}"),
        }
    }
}

/// Unvalidated resource description, as supplied by a front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceParams {
    /// Static DHCP lease parameters
    StaticLease(StaticLeaseParams),
    /// NAT rule parameters
    NatRule(NatRuleParams),
}

impl ResourceParams {
    /// The resource kind these parameters describe
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::StaticLease(_) => ResourceKind::StaticLease,
            Self::NatRule(_) => ResourceKind::NatRule,
        }
    }
}

impl TryFrom<ResourceParams> for Resource {
    type Error = Error;

    fn try_from(params: ResourceParams) -> Result<Self> {
        match params {
            ResourceParams::StaticLease(p) => StaticLease::try_from(p).map(Self::StaticLease),
            ResourceParams::NatRule(p) => NatRule::try_from(p).map(Self::NatRule),
        }
    }
}
