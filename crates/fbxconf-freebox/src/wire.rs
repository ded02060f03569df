// # Freebox wire format
//
// Every Freebox OS API response is wrapped in an envelope:
//
// ```json
// { "success": true, "result": { ... } }
// { "success": false, "msg": "Entrée introuvable", "error_code": "noent" }
// ```
//
// Router entries are decoded into loose DTOs first, then through the
// validating constructors of the core model. An entry the model rejects is a
// protocol error: the router holds something fbxconf cannot represent.

use fbxconf_core::resource::{NatRule, NatRuleParams, ResourceId, StaticLease};
use fbxconf_core::traits::Current;
use fbxconf_core::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

/// Router ids are integers for NAT rules and MAC strings for leases
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireId {
    Number(u64),
    Text(String),
}

impl From<WireId> for ResourceId {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Number(n) => ResourceId::from(n),
            WireId::Text(s) => ResourceId::new(s),
        }
    }
}

/// A static lease as listed by `/dhcp/static_lease/`
#[derive(Debug, Deserialize)]
pub(crate) struct WireLease {
    #[serde(default)]
    id: Option<WireId>,
    mac: String,
    ip: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<WireLease> for Current<StaticLease> {
    type Error = Error;

    fn try_from(wire: WireLease) -> Result<Self> {
        let lease = StaticLease::new(&wire.mac, &wire.ip).map_err(|e| {
            Error::protocol(format!("router returned an invalid lease: {}", e.detail()))
        })?;
        // The lease id is its MAC; older firmwares omit it from listings.
        let id = wire.id.map_or_else(|| ResourceId::new(wire.mac), ResourceId::from);

        Ok(Current {
            id,
            resource: lease,
            extra: Value::Object(wire.extra),
        })
    }
}

/// A port forwarding rule as listed by `/fw/redir/`
#[derive(Debug, Deserialize)]
pub(crate) struct WireRedir {
    id: WireId,
    lan_ip: String,
    lan_port: i64,
    wan_port_start: i64,
    wan_port_end: i64,
    ip_proto: String,
    #[serde(default = "any_source")]
    src_ip: String,
    enabled: bool,
    #[serde(default)]
    comment: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn any_source() -> String {
    fbxconf_core::resource::nat::ANY_SOURCE.to_string()
}

impl TryFrom<WireRedir> for Current<NatRule> {
    type Error = Error;

    fn try_from(wire: WireRedir) -> Result<Self> {
        let params = NatRuleParams {
            lan_ip: wire.lan_ip,
            lan_port: wire.lan_port,
            wan_port_start: wire.wan_port_start,
            wan_port_end: wire.wan_port_end,
            ip_proto: wire.ip_proto,
            src_ip: wire.src_ip,
            enabled: wire.enabled,
            comment: wire.comment,
        };
        let rule = NatRule::new(params).map_err(|e| {
            Error::protocol(format!("router returned an invalid NAT rule: {}", e.detail()))
        })?;

        Ok(Current {
            id: wire.id.into(),
            resource: rule,
            extra: Value::Object(wire.extra),
        })
    }
}

/// Decode a `result` value into a DTO
pub(crate) fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::protocol(format!("cannot decode {what}: {e}")))
}
