// # Freebox OS HTTP client
//
// Implements `RouterClient` for static DHCP leases and NAT port forwarding
// rules over the Freebox OS REST API.
//
// ## Behaviour
//
// - One HTTP request per trait call
// - Session token requested from the injected `SessionProvider` on every call
// - HTTP timeout from `RouterConfig` (30 seconds by default)
// - No retries, no caching: every error is returned to the reconciler as-is
//
// ## API Reference
//
// - List leases: GET `/dhcp/static_lease/`
// - Create lease: POST `/dhcp/static_lease/`
// - Get/update/delete lease: GET/PUT/DELETE `/dhcp/static_lease/:mac`
// - List redirections: GET `/fw/redir/`
// - Create redirection: POST `/fw/redir/`
// - Get/update/delete redirection: GET/PUT/DELETE `/fw/redir/:id`

use crate::wire::{self, Envelope, WireLease, WireRedir};
use async_trait::async_trait;
use fbxconf_core::config::RouterConfig;
use fbxconf_core::resource::{NatRule, ResourceId, StaticLease};
use fbxconf_core::traits::{Current, RouterClient, SessionProvider};
use fbxconf_core::{Error, Result};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Header carrying the session token
pub const AUTH_HEADER: &str = "X-Fbx-App-Auth";

const LEASE_PATH: &str = "/dhcp/static_lease/";
const REDIR_PATH: &str = "/fw/redir/";

/// Freebox OS API client
///
/// One client serves both resource kinds; hand it to
/// [`fbxconf_core::Reconciler::with_client`].
pub struct FreeboxClient {
    /// Base URL, e.g. `https://mafreebox.freebox.fr/api/v4`
    base_url: String,

    /// Authentication capability
    session: Arc<dyn SessionProvider>,

    /// HTTP client for API requests
    http: reqwest::Client,
}

impl std::fmt::Debug for FreeboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreeboxClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FreeboxClient {
    /// Create a client for the router described by `config`
    ///
    /// # Errors
    ///
    /// `Error::Config` if the settings are invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &RouterConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.api_base(),
            session,
            http,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request and unwrap the response envelope
    ///
    /// Returns the envelope's `result`, or `None` when the router sent none.
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Option<Value>> {
        let token = self.session.session_token().await?;
        let url = format!("{}{}", self.base_url, path);

        tracing::debug!("{} {}", method, url);

        let mut request = self.http.request(method.clone(), &url).header(AUTH_HEADER, token);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::transport(format!("{method} {path} timed out"))
            } else {
                Error::transport(format!("{method} {path} failed: {e}"))
            }
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("{method} {path}: cannot read response: {e}")))?;

        // 204 on DELETE
        if status.is_success() && bytes.is_empty() && method == Method::DELETE {
            return Ok(None);
        }

        match serde_json::from_slice::<Envelope>(&bytes) {
            Ok(envelope) if envelope.success => Ok(envelope.result.filter(|v| !v.is_null())),
            Ok(envelope) => {
                let err = error_from_envelope(status, envelope);
                tracing::warn!("{} {} rejected by router: {}", method, path, err);
                Err(err)
            }
            Err(_) => Err(error_from_status(status, &method, path, &bytes)),
        }
    }

    async fn fetch_list<T, R>(&self, path: &str, what: &str) -> Result<Vec<Current<R>>>
    where
        T: serde::de::DeserializeOwned,
        Current<R>: TryFrom<T, Error = Error>,
    {
        let Some(result) = self.call(Method::GET, path, None).await? else {
            return Ok(Vec::new());
        };
        let entries: Vec<T> = wire::decode(result, what)?;
        entries.into_iter().map(Current::<R>::try_from).collect()
    }

    async fn fetch_one<T, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        what: &str,
    ) -> Result<Current<R>>
    where
        T: serde::de::DeserializeOwned,
        Current<R>: TryFrom<T, Error = Error>,
    {
        let result = self
            .call(method, path, body)
            .await?
            .ok_or_else(|| Error::protocol(format!("router returned no {what}")))?;
        let entry: T = wire::decode(result, what)?;
        Current::try_from(entry)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.call(Method::DELETE, path, None).await.map(|_| ())
    }
}

/// Map a `success: false` envelope onto an error
fn error_from_envelope(status: StatusCode, envelope: Envelope) -> Error {
    let code = envelope.error_code.unwrap_or_default();
    let msg = envelope.msg.unwrap_or_default();
    let detail = if msg.is_empty() {
        format!("{code} (HTTP {})", status.as_u16())
    } else {
        format!("{msg} ({code})")
    };

    match code.as_str() {
        "auth_required" | "invalid_token" | "pending_token" | "insufficient_rights"
        | "denied_from_external_ip" => Error::transport(detail),
        "exists" => Error::conflict(detail),
        "noent" | "not_found" => Error::not_found(detail),
        "inval" | "invalid_request" | "bad_param" | "invalid_port" | "invalid_ip"
        | "invalid_id" | "port_conflict" => Error::validation(detail),
        _ if status.is_client_error() => Error::validation(detail),
        _ => Error::transport(detail),
    }
}

/// Map a response without a decodable envelope onto an error
fn error_from_status(status: StatusCode, method: &Method, path: &str, body: &[u8]) -> Error {
    let text = String::from_utf8_lossy(body);
    let detail = format!("{method} {path}: HTTP {} - {}", status.as_u16(), text.trim());

    match status.as_u16() {
        200..=299 => Error::protocol(format!(
            "{method} {path}: response is not a Freebox API envelope"
        )),
        404 => Error::not_found(detail),
        409 => Error::conflict(detail),
        400 | 422 => Error::validation(detail),
        _ => Error::transport(detail),
    }
}

fn lease_path(id: &ResourceId) -> String {
    format!("{LEASE_PATH}{id}")
}

fn redir_path(id: &ResourceId) -> String {
    format!("{REDIR_PATH}{id}")
}

fn payload<T: serde::Serialize>(params: &T) -> Result<Value> {
    Ok(serde_json::to_value(params)?)
}

#[async_trait]
impl RouterClient<StaticLease> for FreeboxClient {
    async fn list(&self) -> Result<Vec<Current<StaticLease>>> {
        self.fetch_list::<WireLease, _>(LEASE_PATH, "static leases")
            .await
    }

    async fn get(&self, id: &ResourceId) -> Result<Current<StaticLease>> {
        self.fetch_one::<WireLease, _>(Method::GET, &lease_path(id), None, "static lease")
            .await
    }

    async fn create(&self, desired: &StaticLease) -> Result<Current<StaticLease>> {
        let body = payload(&desired.params())?;
        self.fetch_one::<WireLease, _>(Method::POST, LEASE_PATH, Some(body), "static lease")
            .await
    }

    async fn update(&self, id: &ResourceId, desired: &StaticLease) -> Result<Current<StaticLease>> {
        let body = payload(&desired.params())?;
        self.fetch_one::<WireLease, _>(Method::PUT, &lease_path(id), Some(body), "static lease")
            .await
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.remove(&lease_path(id)).await
    }

    fn client_name(&self) -> &'static str {
        "freebox"
    }
}

#[async_trait]
impl RouterClient<NatRule> for FreeboxClient {
    async fn list(&self) -> Result<Vec<Current<NatRule>>> {
        self.fetch_list::<WireRedir, _>(REDIR_PATH, "NAT rules").await
    }

    async fn get(&self, id: &ResourceId) -> Result<Current<NatRule>> {
        self.fetch_one::<WireRedir, _>(Method::GET, &redir_path(id), None, "NAT rule")
            .await
    }

    async fn create(&self, desired: &NatRule) -> Result<Current<NatRule>> {
        let body = payload(&desired.params())?;
        self.fetch_one::<WireRedir, _>(Method::POST, REDIR_PATH, Some(body), "NAT rule")
            .await
    }

    async fn update(&self, id: &ResourceId, desired: &NatRule) -> Result<Current<NatRule>> {
        let body = payload(&desired.params())?;
        self.fetch_one::<WireRedir, _>(Method::PUT, &redir_path(id), Some(body), "NAT rule")
            .await
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.remove(&redir_path(id)).await
    }

    fn client_name(&self) -> &'static str {
        "freebox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticSession;

    fn envelope(code: &str) -> Envelope {
        Envelope {
            success: false,
            result: None,
            msg: Some("refused".to_string()),
            error_code: Some(code.to_string()),
        }
    }

    #[test]
    fn test_envelope_error_mapping() {
        let cases = [
            ("invalid_token", StatusCode::FORBIDDEN, "TransportError"),
            ("auth_required", StatusCode::FORBIDDEN, "TransportError"),
            ("exists", StatusCode::CONFLICT, "ConflictError"),
            ("noent", StatusCode::NOT_FOUND, "NotFoundError"),
            ("inval", StatusCode::BAD_REQUEST, "ValidationError"),
            ("something_new", StatusCode::BAD_REQUEST, "ValidationError"),
            ("something_new", StatusCode::INTERNAL_SERVER_ERROR, "TransportError"),
        ];

        for (code, status, kind) in cases {
            assert_eq!(error_from_envelope(status, envelope(code)).kind(), kind, "{code}");
        }
    }

    #[test]
    fn test_status_error_mapping() {
        let cases = [
            (StatusCode::OK, "ProtocolError"),
            (StatusCode::UNAUTHORIZED, "TransportError"),
            (StatusCode::TOO_MANY_REQUESTS, "TransportError"),
            (StatusCode::BAD_GATEWAY, "TransportError"),
            (StatusCode::NOT_FOUND, "NotFoundError"),
            (StatusCode::CONFLICT, "ConflictError"),
            (StatusCode::UNPROCESSABLE_ENTITY, "ValidationError"),
        ];

        for (status, kind) in cases {
            let err = error_from_status(status, &Method::GET, LEASE_PATH, b"<html>");
            assert_eq!(err.kind(), kind, "{status}");
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let session: Arc<dyn SessionProvider> = Arc::new(StaticSession::new("token").unwrap());
        let config = RouterConfig {
            timeout_secs: 0,
            ..RouterConfig::default()
        };

        let err = FreeboxClient::new(&config, session).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_base_url() {
        let session: Arc<dyn SessionProvider> = Arc::new(StaticSession::new("token").unwrap());
        let client = FreeboxClient::new(&RouterConfig::default(), session).unwrap();

        assert_eq!(client.base_url(), "https://mafreebox.freebox.fr/api/v4");
        assert!(!format!("{client:?}").contains("token"));
    }
}
