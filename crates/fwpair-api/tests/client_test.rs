#![allow(clippy::unwrap_used)]
// Integration tests for `FmcClient` using wiremock.

use chrono::TimeDelta;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fwpair_api::models::DeploymentRequest;
use fwpair_api::{Error, FmcClient, Method, TransportConfig};

const DOMAIN: &str = "e276abec-e0f2-11e3-8169-6d9ed49b625f";

// ── Helpers ─────────────────────────────────────────────────────────

fn token_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(204)
        .insert_header("X-auth-access-token", token)
        .insert_header("X-auth-refresh-token", "refresh-1")
        .insert_header("DOMAIN_UUID", DOMAIN)
}

async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/generatetoken"))
        .respond_with(token_response(token))
        .mount(server)
        .await;
}

async fn setup() -> (MockServer, FmcClient) {
    let server = MockServer::start().await;
    mount_token(&server, "token-1").await;
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

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_reads_domain_from_headers() {
    let (_server, client) = setup().await;
    assert_eq!(client.domain_uuid(), DOMAIN);
}

#[tokio::test]
async fn test_authenticate_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/generatetoken"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = FmcClient::authenticate(
        &server.uri(),
        "admin",
        SecretString::from("wrong".to_owned()),
        &TransportConfig::default(),
    )
    .await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_authenticate_failure_with_multibyte_body() {
    let server = MockServer::start().await;
    let body = format!("{}é and more", "a".repeat(199));
    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/generatetoken"))
        .respond_with(ResponseTemplate::new(401).set_body_string(body))
        .mount(&server)
        .await;

    let result = FmcClient::authenticate(
        &server.uri(),
        "admin",
        SecretString::from("wrong".to_owned()),
        &TransportConfig::default(),
    )
    .await;

    match result {
        Err(Error::Authentication { message }) => {
            assert!(message.ends_with('é'), "{message}");
            assert!(!message.contains("and more"));
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_authenticate_without_token_header_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/generatetoken"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let result = FmcClient::authenticate(
        &server.uri(),
        "admin",
        SecretString::from("hunter2".to_owned()),
        &TransportConfig::default(),
    )
    .await;

    assert!(matches!(result, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn test_401_triggers_one_reauth_and_retry() {
    let (server, mut client) = setup().await;

    // Re-authentication hands out a new token.
    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/generatetoken"))
        .respond_with(token_response("token-2"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(config_path("object/hosts/h1")))
        .and(header("X-auth-access-token", "token-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(config_path("object/hosts/h1")))
        .and(header("X-auth-access-token", "token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "h1", "name": "GW"})))
        .expect(1)
        .mount(&server)
        .await;

    let value = client.get("object/hosts/h1").await.unwrap();
    assert_eq!(value["id"], "h1");
}

#[tokio::test]
async fn test_second_401_is_fatal() {
    let (server, mut client) = setup().await;

    Mock::given(method("GET"))
        .and(path(config_path("object/hosts")))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let result = client.invoke(Method::GET, "object/hosts", None).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

// ── Proactive renewal ───────────────────────────────────────────────

/// A client whose token is already inside the renewal margin.
async fn expiring_client(server: &MockServer) -> FmcClient {
    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/generatetoken"))
        .respond_with(token_response("token-1"))
        .up_to_n_times(1)
        .mount(server)
        .await;
    FmcClient::authenticate_with_lifetime(
        &server.uri(),
        "admin",
        SecretString::from("hunter2".to_owned()),
        &TransportConfig::default(),
        TimeDelta::seconds(30),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_expiring_token_is_refreshed_before_the_call() {
    let server = MockServer::start().await;
    let mut client = expiring_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/refreshtoken"))
        .and(header("X-auth-access-token", "token-1"))
        .and(header("X-auth-refresh-token", "refresh-1"))
        .respond_with(token_response("token-2"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(config_path("object/hosts/h1")))
        .and(header("X-auth-access-token", "token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "h1"})))
        .expect(1)
        .mount(&server)
        .await;

    let value = client.get("object/hosts/h1").await.unwrap();
    assert_eq!(value["id"], "h1");
}

#[tokio::test]
async fn test_failed_refresh_falls_back_to_new_token() {
    let server = MockServer::start().await;
    let mut client = expiring_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/refreshtoken"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/generatetoken"))
        .respond_with(token_response("token-3"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(config_path("object/hosts/h1")))
        .and(header("X-auth-access-token", "token-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "h1"})))
        .expect(1)
        .mount(&server)
        .await;

    let value = client.get("object/hosts/h1").await.unwrap();
    assert_eq!(value["id"], "h1");
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_api_error_carries_description() {
    let (server, mut client) = setup().await;

    Mock::given(method("POST"))
        .and(path(config_path("object/networks")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "category": "FRAMEWORK",
                "messages": [{ "description": "The object name already exists." }],
                "severity": "ERROR"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .post("object/networks", &json!({"name": "INSIDE_NETWORK"}))
        .await
        .unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "The object name already exists.");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

// ── Pagination ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_all_requests_expanded_pages() {
    let (server, mut client) = setup().await;

    Mock::given(method("GET"))
        .and(path(config_path("object/hosts")))
        .and(query_param("expanded", "true"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": "h1", "name": "GW", "value": "10.0.0.1" },
                { "id": "h2", "name": "DNS", "value": "10.0.0.53" }
            ],
            "paging": { "offset": 0, "limit": 1000, "count": 2, "pages": 1 }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let hosts = client.list_all("object/hosts").await.unwrap();
    assert_eq!(hosts.len(), 2);

    let found = client.find_by_name("object/hosts", "DNS").await.unwrap();
    assert_eq!(found.unwrap()["id"], "h2");
}

#[tokio::test]
async fn test_list_all_empty_collection() {
    let (server, mut client) = setup().await;

    Mock::given(method("GET"))
        .and(path(config_path("devicehapairs/ftddevicehapairs")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "links": {},
            "paging": { "offset": 0, "limit": 0, "count": 0, "pages": 0 }
        })))
        .mount(&server)
        .await;

    let pairs = client.list_ha_pairs().await.unwrap();
    assert!(pairs.is_empty());
}

// ── Endpoints ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_find_device_record_by_name() {
    let (server, mut client) = setup().await;

    Mock::given(method("GET"))
        .and(path(config_path("devices/devicerecords")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "dev-1",
                "name": "fw-01",
                "hostName": "192.0.2.11",
                "healthStatus": "green",
                "deploymentStatus": "DEPLOYED"
            }],
            "paging": { "count": 1 }
        })))
        .mount(&server)
        .await;

    let device = client.find_device_record("fw-01").await.unwrap().unwrap();
    assert_eq!(device.id, "dev-1");
    assert!(device.is_ready());
    assert!(client.find_device_record("fw-02").await.unwrap().is_none());
}

#[tokio::test]
async fn test_submit_deployment_returns_task_id() {
    let (server, mut client) = setup().await;

    Mock::given(method("POST"))
        .and(path(config_path("deployment/deploymentrequests")))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "type": "DeploymentRequest",
            "version": "1700000000",
            "metadata": { "task": { "id": "task-42", "taskType": "DEVICE_DEPLOYMENT" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let accepted = client
        .submit_deployment(&DeploymentRequest::new(
            "1700000000".into(),
            vec!["dev-1".into(), "dev-2".into()],
            "fwpair",
        ))
        .await
        .unwrap();
    assert_eq!(accepted.task_id(), Some("task-42"));
}

#[tokio::test]
async fn test_revoke_posts_current_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/revokeaccess"))
        .and(header("X-auth-access-token", "token-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.revoke().await.unwrap();
}
