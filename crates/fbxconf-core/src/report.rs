//! Outcome reporting
//!
//! Turns an [`Outcome`] into the flat record a front end prints: whether the
//! router changed, a human readable message, and an echo of every input field
//! as the caller supplied it.

use crate::config::DesiredState;
use crate::reconciler::{Action, Outcome};
use crate::resource::{NatRuleParams, ResourceId, ResourceKind, ResourceParams};
use serde::Serialize;
use serde_json::Value;

/// Echo of the caller's input, flattened into the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Echo {
    /// Static lease input, as `mac_address` / `ip_address`
    StaticLease {
        mac_address: String,
        ip_address: String,
    },
    /// NAT rule input, under its parameter names
    NatRule(NatRuleParams),
}

impl From<&ResourceParams> for Echo {
    fn from(params: &ResourceParams) -> Self {
        match params {
            ResourceParams::StaticLease(p) => Self::StaticLease {
                mac_address: p.mac.clone(),
                ip_address: p.ip.clone(),
            },
            ResourceParams::NatRule(p) => Self::NatRule(p.clone()),
        }
    }
}

/// One reconciliation, as reported to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Whether the router was (or would be) modified
    pub changed: bool,

    /// Action taken
    pub action: Action,

    /// Resource kind
    pub kind: ResourceKind,

    /// Human readable summary, or `<ErrorKind>: <detail>` on failure
    pub message: String,

    /// JSON of the requested parameters
    pub original_message: String,

    /// Router id, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,

    /// Attributes an update changed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<&'static str>,

    /// Router-only fields of the matched entry, such as its hostname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_details: Option<Value>,

    /// Present (and `true`) only in check mode
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,

    #[serde(flatten)]
    pub echo: Echo,
}

impl Report {
    /// Serialize as a single JSON line
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&Outcome> for Report {
    fn from(outcome: &Outcome) -> Self {
        Self {
            changed: outcome.changed(),
            action: outcome.action,
            kind: outcome.requested.kind(),
            message: message(outcome),
            original_message: serde_json::to_string(&outcome.requested).unwrap_or_default(),
            id: outcome.id.clone(),
            changed_fields: outcome.changed_fields.clone(),
            router_details: outcome.router_details.clone(),
            dry_run: outcome.dry_run,
            echo: Echo::from(&outcome.requested),
        }
    }
}

impl From<Outcome> for Report {
    fn from(outcome: Outcome) -> Self {
        Self::from(&outcome)
    }
}

fn message(outcome: &Outcome) -> String {
    if let Some(error) = &outcome.error {
        return format!("{}: {}", error.kind(), error.detail());
    }

    let text = match &outcome.requested {
        ResourceParams::StaticLease(p) => match (outcome.action, outcome.state) {
            (Action::Created | Action::Updated, _) => {
                format!("Static DHCP configured for MAC {} with IP {}", p.mac, p.ip)
            }
            (Action::Deleted, _) => format!("Static DHCP lease for MAC {} removed", p.mac),
            (_, DesiredState::Absent) => {
                format!("Static DHCP lease for MAC {} already absent", p.mac)
            }
            (_, DesiredState::Present) => {
                format!("Static DHCP lease for MAC {} already set to {}", p.mac, p.ip)
            }
        },
        ResourceParams::NatRule(p) => {
            let rule = format!(
                "{} from external port {} to internal {}:{}",
                p.ip_proto, p.wan_port_start, p.lan_ip, p.lan_port
            );
            match (outcome.action, outcome.state) {
                (Action::Created | Action::Updated, _) => format!("NAT rule configured for {rule}"),
                (Action::Deleted, _) => format!("NAT rule for {rule} removed"),
                (_, DesiredState::Absent) => format!("NAT rule for {rule} already absent"),
                (_, DesiredState::Present) => format!("NAT rule for {rule} already up to date"),
            }
        }
    };

    if outcome.dry_run && outcome.changed() {
        format!("[DRY-RUN] {text}")
    } else {
        text
    }
}
