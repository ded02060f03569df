//! Contract Test: Freebox OS API Client
//!
//! This test verifies the HTTP client against a mock Freebox.
//!
//! Constraints verified:
//! - Every request carries the session token
//! - Payloads use the router's field names
//! - Single entries are fetched by id and deletes accept empty or enveloped replies
//! - Envelope error codes and bare HTTP statuses map onto the right error kinds
//! - Garbage responses and invalid router entries are protocol errors
//! - Network failures are transport errors
//! - A full reconciliation issues exactly the expected requests
//!
//! If this test fails, the client would misreport router state or failures.

use fbxconf_core::config::RouterConfig;
use fbxconf_core::resource::{NatRule, NatRuleParams, Resource, ResourceId, StaticLease};
use fbxconf_core::traits::RouterClient;
use fbxconf_core::{Action, Error, Reconciler};
use fbxconf_freebox::{AUTH_HEADER, FreeboxClient, StaticSession};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-session-token";

fn client_for(url: String, timeout_secs: u64) -> FreeboxClient {
    let config = RouterConfig {
        url,
        timeout_secs,
        ..RouterConfig::default()
    };
    let session = Arc::new(StaticSession::new(TOKEN).unwrap());
    FreeboxClient::new(&config, session).unwrap()
}

fn client(server: &MockServer) -> FreeboxClient {
    client_for(server.uri(), 5)
}

fn web_rule_json(id: u64, enabled: bool) -> serde_json::Value {
    json!({
        "id": id,
        "lan_ip": "192.168.1.42",
        "lan_port": 4242,
        "wan_port_start": 4242,
        "wan_port_end": 4242,
        "ip_proto": "tcp",
        "src_ip": "0.0.0.0",
        "enabled": enabled,
        "comment": "Web server access",
        "hostname": "web"
    })
}

#[tokio::test]
async fn list_leases_sends_session_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/dhcp/static_lease/"))
        .and(header(AUTH_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [
                {
                    "id": "00:11:22:33:44:55",
                    "mac": "00:11:22:33:44:55",
                    "ip": "192.168.1.100",
                    "hostname": "nas"
                },
                { "id": "00:11:22:33:44:66", "mac": "00:11:22:33:44:66", "ip": "192.168.1.101" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let leases = RouterClient::<StaticLease>::list(&client(&server)).await.unwrap();

    assert_eq!(leases.len(), 2);
    assert_eq!(leases[0].id.as_str(), "00:11:22:33:44:55");
    assert_eq!(leases[0].resource.ip().to_string(), "192.168.1.100");
    assert_eq!(leases[0].extra["hostname"], "nas");
}

#[tokio::test]
async fn missing_result_means_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/fw/redir/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    let rules = RouterClient::<NatRule>::list(&client(&server)).await.unwrap();
    assert!(rules.is_empty());
}

#[tokio::test]
async fn create_lease_posts_router_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/dhcp/static_lease/"))
        .and(header(AUTH_HEADER, TOKEN))
        .and(body_json(json!({ "mac": "00:11:22:33:44:55", "ip": "192.168.1.100" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {
                "id": "00:11:22:33:44:55",
                "mac": "00:11:22:33:44:55",
                "ip": "192.168.1.100"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lease = StaticLease::new("00:11:22:33:44:55", "192.168.1.100").unwrap();
    let created = client(&server).create(&lease).await.unwrap();

    assert_eq!(created.id, ResourceId::from("00:11:22:33:44:55"));
    assert_eq!(created.resource, lease);
}

#[tokio::test]
async fn get_lease_by_mac() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/dhcp/static_lease/00:11:22:33:44:55"))
        .and(header(AUTH_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {
                "id": "00:11:22:33:44:55",
                "mac": "00:11:22:33:44:55",
                "ip": "192.168.1.100",
                "hostname": "nas"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = ResourceId::from("00:11:22:33:44:55");
    let lease = RouterClient::<StaticLease>::get(&client(&server), &id).await.unwrap();

    assert_eq!(lease.id, id);
    assert_eq!(lease.resource.ip().to_string(), "192.168.1.100");
    assert_eq!(lease.extra["hostname"], "nas");
}

#[tokio::test]
async fn get_nat_rule_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/fw/redir/7"))
        .and(header(AUTH_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": web_rule_json(7, true)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rule = RouterClient::<NatRule>::get(&client(&server), &ResourceId::from(7))
        .await
        .unwrap();

    assert_eq!(rule.id, ResourceId::from(7));
    assert_eq!(rule.resource.lan_port(), 4242);
    assert!(rule.resource.enabled());
    assert_eq!(rule.resource.comment(), "Web server access");
}

#[tokio::test]
async fn get_of_unknown_id_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/fw/redir/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "msg": "Entrée introuvable",
            "error_code": "noent"
        })))
        .mount(&server)
        .await;

    let err = RouterClient::<NatRule>::get(&client(&server), &ResourceId::from(99))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{err}");
}

#[tokio::test]
async fn delete_with_empty_reply_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v4/dhcp/static_lease/00:11:22:33:44:55"))
        .and(header(AUTH_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let id = ResourceId::from("00:11:22:33:44:55");
    RouterClient::<StaticLease>::delete(&client(&server), &id)
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_with_success_envelope_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v4/fw/redir/7"))
        .and(header(AUTH_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    RouterClient::<NatRule>::delete(&client(&server), &ResourceId::from(7))
        .await
        .unwrap();
}

#[tokio::test]
async fn envelope_error_codes_map_to_error_kinds() {
    let cases = [
        (409, "exists", "ConflictError"),
        (400, "inval", "ValidationError"),
        (403, "invalid_token", "TransportError"),
        (400, "brand_new_code", "ValidationError"),
    ];

    for (status, code, kind) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v4/dhcp/static_lease/"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "success": false,
                "msg": "refused",
                "error_code": code
            })))
            .mount(&server)
            .await;

        let lease = StaticLease::new("00:11:22:33:44:55", "192.168.1.100").unwrap();
        let err = client(&server).create(&lease).await.unwrap_err();
        assert_eq!(err.kind(), kind, "{code}: {err}");
    }
}

#[tokio::test]
async fn delete_of_unknown_id_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v4/fw/redir/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "msg": "Impossible de supprimer la redirection : Entrée introuvable",
            "error_code": "noent"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = RouterClient::<NatRule>::delete(&client(&server), &ResourceId::from(99))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{err}");
}

#[tokio::test]
async fn bare_statuses_and_garbage_bodies() {
    let cases = [
        (ResponseTemplate::new(200).set_body_string("not json"), "ProtocolError"),
        (ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"), "TransportError"),
        (ResponseTemplate::new(401), "TransportError"),
        (ResponseTemplate::new(404), "NotFoundError"),
    ];

    for (template, kind) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/fw/redir/"))
            .respond_with(template)
            .mount(&server)
            .await;

        let err = RouterClient::<NatRule>::list(&client(&server)).await.unwrap_err();
        assert_eq!(err.kind(), kind, "{err}");
    }
}

#[tokio::test]
async fn invalid_router_entry_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/dhcp/static_lease/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [ { "id": "x", "mac": "not-a-mac", "ip": "192.168.1.100" } ]
        })))
        .mount(&server)
        .await;

    let err = RouterClient::<StaticLease>::list(&client(&server)).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "{err}");
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    // Nothing listens on port 1.
    let client = client_for("http://127.0.0.1:1".to_string(), 5);

    let err = RouterClient::<StaticLease>::list(&client).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{err}");
}

#[tokio::test]
async fn slow_router_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/fw/redir/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "result": [] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = client_for(server.uri(), 1);
    let err = RouterClient::<NatRule>::list(&client).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{err}");
}

#[tokio::test]
async fn disabled_rule_is_updated_in_place() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/fw/redir/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [ web_rule_json(7, false) ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v4/fw/redir/7"))
        .and(header(AUTH_HEADER, TOKEN))
        .and(body_json(json!({
            "lan_ip": "192.168.1.42",
            "lan_port": 4242,
            "wan_port_start": 4242,
            "wan_port_end": 4242,
            "ip_proto": "tcp",
            "src_ip": "0.0.0.0",
            "enabled": true,
            "comment": "Web server access"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": web_rule_json(7, true)
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = Reconciler::with_client(Arc::new(client(&server)));
    let desired = NatRule::new(
        NatRuleParams::new("192.168.1.42", 4242, (4242, 4242), "tcp", true)
            .with_comment("Web server access"),
    )
    .unwrap();

    let outcome = reconciler.reconcile(&Resource::from(desired)).await;

    assert_eq!(outcome.action, Action::Updated, "{outcome:?}");
    assert!(outcome.changed());
    assert_eq!(outcome.id, Some(ResourceId::from(7)));
    assert_eq!(outcome.changed_fields, vec!["enabled"]);
    assert_eq!(outcome.router_details.unwrap()["hostname"], "web");
}
