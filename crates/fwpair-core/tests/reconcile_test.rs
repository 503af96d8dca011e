#![allow(clippy::unwrap_used)]
// Object reconciliation against a mocked controller.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fwpair_api::{FmcClient, TransportConfig};
use fwpair_core::reconcile::reconcile;
use fwpair_core::{CoreError, ObjectKind, ObjectSpec, Outcome, ScopeIds};

const DOMAIN: &str = "e276abec-e0f2-11e3-8169-6d9ed49b625f";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FmcClient) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/generatetoken"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("X-auth-access-token", "token-1")
                .insert_header("X-auth-refresh-token", "refresh-1")
                .insert_header("DOMAIN_UUID", DOMAIN),
        )
        .mount(&server)
        .await;
    let client = FmcClient::authenticate(
        &server.uri(),
        "admin",
        SecretString::from("hunter2".to_owned()),
        &TransportConfig::default(),
    )
    .await
    .unwrap();
    (server, client)
}

fn config_path(suffix: &str) -> String {
    format!("/api/fmc_config/v1/domain/{DOMAIN}/{suffix}")
}

fn page(items: Value) -> ResponseTemplate {
    let count = items.as_array().map_or(0, Vec::len);
    ResponseTemplate::new(200).set_body_json(json!({ "items": items, "paging": { "count": count } }))
}

async fn mount_list(server: &MockServer, suffix: &str, items: Value) {
    Mock::given(method("GET"))
        .and(path(config_path(suffix)))
        .respond_with(page(items))
        .mount(server)
        .await;
}

fn scope() -> ScopeIds {
    ScopeIds {
        primary: Some("dev-1".into()),
        secondary: Some("dev-2".into()),
        ha: Some("ha-1".into()),
    }
}

fn inside_net() -> ObjectSpec {
    ObjectSpec {
        kind: ObjectKind::Network,
        name: "INSIDE_NET".into(),
        payload: json!({ "name": "INSIDE_NET", "value": "10.10.0.0/24", "type": "Network" }),
        parent: None,
        depends_on: Vec::new(),
    }
}

fn route_via_inside_net() -> ObjectSpec {
    ObjectSpec {
        kind: ObjectKind::Route,
        name: "inside_route".into(),
        payload: json!({
            "type": "IPv4StaticRoute",
            "interfaceName": "outside",
            "selectedNetworks": [{ "$ref": "network:INSIDE_NET", "type": "Network" }],
            "metricValue": 1
        }),
        parent: None,
        depends_on: Vec::new(),
    }
}

const ROUTES: &str = "devices/devicerecords/dev-1/routing/ipv4staticroutes";

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_created_uuid_flows_into_dependent_payload() {
    let (server, mut client) = setup().await;
    mount_list(&server, "object/networks", json!([])).await;
    Mock::given(method("POST"))
        .and(path(config_path("object/networks")))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "id": "uuid-123", "name": "INSIDE_NET" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_list(&server, ROUTES, json!([])).await;
    Mock::given(method("POST"))
        .and(path(config_path(ROUTES)))
        .and(body_partial_json(json!({
            "selectedNetworks": [{ "id": "uuid-123" }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "route-1" })))
        .expect(1)
        .mount(&server)
        .await;

    // Declared out of order on purpose; layers decide.
    let reports = reconcile(&mut client, &[route_via_inside_net(), inside_net()], &scope())
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].logical_name, "INSIDE_NET");
    assert_eq!(reports[0].outcome, Outcome::Created);
    assert_eq!(reports[0].remote_uuid.as_deref(), Some("uuid-123"));
    assert!(!reports[0].existed_before);
    assert_eq!(reports[1].outcome, Outcome::Created);
    assert_eq!(reports[1].remote_uuid.as_deref(), Some("route-1"));
}

#[tokio::test]
async fn test_matching_objects_are_left_alone() {
    let (server, mut client) = setup().await;
    mount_list(
        &server,
        "object/networks",
        json!([{
            "id": "net-1",
            "name": "INSIDE_NET",
            "value": "10.10.0.0/24",
            "type": "Network",
            "overridable": false,
            "links": { "self": "https://fmc/net-1" },
            "metadata": { "lastUser": { "name": "admin" } }
        }]),
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let first = reconcile(&mut client, &[inside_net()], &scope()).await.unwrap();
    let second = reconcile(&mut client, &[inside_net()], &scope()).await.unwrap();

    for reports in [first, second] {
        assert_eq!(reports[0].outcome, Outcome::Unchanged);
        assert!(reports[0].existed_before);
        assert_eq!(reports[0].remote_uuid.as_deref(), Some("net-1"));
    }
}

#[tokio::test]
async fn test_drifted_object_is_updated_in_place() {
    let (server, mut client) = setup().await;
    mount_list(
        &server,
        "object/networks",
        json!([{
            "id": "net-1",
            "name": "INSIDE_NET",
            "value": "10.99.0.0/24",
            "type": "Network",
            "links": { "self": "https://fmc/net-1" }
        }]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path(config_path("object/networks/net-1")))
        .and(body_partial_json(json!({ "id": "net-1", "value": "10.10.0.0/24" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "net-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let reports = reconcile(&mut client, &[inside_net()], &scope()).await.unwrap();
    assert_eq!(reports[0].outcome, Outcome::Updated);
    assert!(reports[0].existed_before);
}

#[tokio::test]
async fn test_failed_object_blocks_dependents() {
    let (server, mut client) = setup().await;
    mount_list(&server, "object/networks", json!([])).await;
    mount_list(&server, "object/hosts", json!([])).await;
    Mock::given(method("POST"))
        .and(path(config_path("object/networks")))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "error": { "messages": [{ "description": "Invalid IP address" }] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(config_path("object/hosts")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "host-1" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(config_path(ROUTES)))
        .respond_with(page(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = ObjectSpec {
        kind: ObjectKind::Host,
        name: "gw".into(),
        payload: json!({ "name": "gw", "value": "203.0.113.1", "type": "Host" }),
        parent: None,
        depends_on: Vec::new(),
    };
    let reports = reconcile(
        &mut client,
        &[inside_net(), gateway, route_via_inside_net()],
        &scope(),
    )
    .await
    .unwrap();

    assert!(matches!(
        &reports[0].outcome,
        Outcome::Failed { reason } if reason.contains("Invalid IP address")
    ));
    assert_eq!(reports[1].outcome, Outcome::Created);
    assert_eq!(
        reports[2].outcome,
        Outcome::Blocked {
            dependency: "network:INSIDE_NET".into()
        }
    );
    assert!(reports[2].remote_uuid.is_none());
}

#[tokio::test]
async fn test_unknown_external_reference_fails_object() {
    let (server, mut client) = setup().await;
    mount_list(&server, "object/networks", json!([])).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let route = ObjectSpec {
        kind: ObjectKind::Route,
        name: "default_route".into(),
        payload: json!({
            "interfaceName": "outside",
            "selectedNetworks": [{ "$ref": "network:any-ipv4", "type": "Network" }]
        }),
        parent: None,
        depends_on: Vec::new(),
    };
    let reports = reconcile(&mut client, &[route], &scope()).await.unwrap();
    assert!(matches!(
        &reports[0].outcome,
        Outcome::Failed { reason } if reason.contains("network:any-ipv4")
    ));
}

#[tokio::test]
async fn test_missing_physical_interface_is_not_created() {
    let (server, mut client) = setup().await;
    mount_list(
        &server,
        "devices/devicerecords/dev-1/physicalinterfaces",
        json!([{ "id": "if-0", "name": "GigabitEthernet0/0" }]),
    )
    .await;

    let iface = ObjectSpec {
        kind: ObjectKind::Interface,
        name: "GigabitEthernet0/7".into(),
        payload: json!({ "ifname": "inside", "enabled": true }),
        parent: None,
        depends_on: Vec::new(),
    };
    let reports = reconcile(&mut client, &[iface], &scope()).await.unwrap();
    assert!(matches!(reports[0].outcome, Outcome::Failed { .. }));
    assert!(!reports[0].existed_before);
}

#[tokio::test]
async fn test_invalid_plan_sends_nothing() {
    let (server, mut client) = setup().await;

    let err = reconcile(&mut client, &[inside_net(), inside_net()], &scope())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Plan { .. }));

    let requests = server.received_requests().await.unwrap();
    assert!(
        requests
            .iter()
            .all(|r| r.url.path().starts_with("/api/fmc_platform"))
    );
}
