#![cfg(feature = "online")]

mod common;

use common::{init_tracing, pro_info, Sandbox};
use keyward_license::{
    FingerprintProvider, HttpAuthority, LicenseAuthority, LicenseConfig, LicenseError,
    LicenseManager, LicenseStatus, StaticFingerprint, ACTIVATE_PATH, VALIDATE_PATH,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// The blocking client must not run on an async worker thread.
async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

fn authority(uri: String) -> HttpAuthority {
    HttpAuthority::new(uri, Duration::from_secs(5)).unwrap()
}

fn fingerprint() -> keyward_license::HardwareFingerprint {
    StaticFingerprint::new("hwid-1").fingerprint()
}

async fn mount(server: &MockServer, endpoint: &str, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

// ── Construction ────────────────────────────────────────────────

#[test]
fn base_url_trailing_slash_trimmed() {
    let authority = authority("https://licenses.example.com/".to_string());
    assert_eq!(authority.base_url(), "https://licenses.example.com");
}

#[test]
fn from_config_rejects_invalid_config() {
    let cfg = LicenseConfig::new("not a url");
    assert!(matches!(
        HttpAuthority::from_config(&cfg),
        Err(LicenseError::Config(_))
    ));
}

// ── Activate ────────────────────────────────────────────────────

#[tokio::test]
async fn activate_posts_key_and_hardware_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ACTIVATE_PATH))
        .and(header_exists("user-agent"))
        .and(body_json(json!({ "key": "KEY-1", "hardwareId": "hwid-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = blocking(move || authority(uri).activate("KEY-1", &fingerprint())).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn activate_error_field_is_reported() {
    let server = MockServer::start().await;
    mount(
        &server,
        ACTIVATE_PATH,
        200,
        json!({ "success": false, "error": "seat limit reached" }),
    )
    .await;

    let uri = server.uri();
    let result = blocking(move || authority(uri).activate("KEY-1", &fingerprint())).await;
    assert!(matches!(result, Err(LicenseError::Rejected(m)) if m == "seat limit reached"));
}

#[tokio::test]
async fn activate_non_200_is_rejection() {
    let server = MockServer::start().await;
    mount(
        &server,
        ACTIVATE_PATH,
        403,
        json!({ "message": "This license does not belong to you" }),
    )
    .await;

    let uri = server.uri();
    let result = blocking(move || authority(uri).activate("KEY-1", &fingerprint())).await;
    assert!(
        matches!(result, Err(LicenseError::Rejected(m)) if m == "This license does not belong to you")
    );
}

#[tokio::test]
async fn success_flag_with_non_200_is_rejection() {
    let server = MockServer::start().await;
    mount(&server, ACTIVATE_PATH, 202, json!({ "success": true })).await;

    let uri = server.uri();
    let result = blocking(move || authority(uri).activate("KEY-1", &fingerprint())).await;
    assert!(matches!(result, Err(LicenseError::Rejected(_))));
}

// ── Validate ────────────────────────────────────────────────────

#[tokio::test]
async fn validate_returns_data() {
    let server = MockServer::start().await;
    mount(
        &server,
        VALIDATE_PATH,
        200,
        json!({ "success": true, "message": "License is valid", "data": { "plan": "pro" } }),
    )
    .await;

    let uri = server.uri();
    let info = blocking(move || authority(uri).validate("KEY-1", &fingerprint()))
        .await
        .unwrap();
    assert_eq!(info, Some(pro_info()));
}

#[tokio::test]
async fn validate_null_data_is_no_info() {
    let server = MockServer::start().await;
    mount(
        &server,
        VALIDATE_PATH,
        200,
        json!({ "success": true, "message": "License is valid", "data": null }),
    )
    .await;

    let uri = server.uri();
    let info = blocking(move || authority(uri).validate("KEY-1", &fingerprint()))
        .await
        .unwrap();
    assert_eq!(info, None);
}

#[tokio::test]
async fn validate_message_is_reported() {
    let server = MockServer::start().await;
    mount(
        &server,
        VALIDATE_PATH,
        200,
        json!({ "success": false, "message": "revoked" }),
    )
    .await;

    let uri = server.uri();
    let result = blocking(move || authority(uri).validate("KEY-1", &fingerprint())).await;
    assert!(matches!(result, Err(LicenseError::Rejected(m)) if m == "revoked"));
}

#[tokio::test]
async fn validate_malformed_body_is_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VALIDATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = blocking(move || authority(uri).validate("KEY-1", &fingerprint())).await;
    let err = result.unwrap_err();
    assert!(!err.is_transport());
}

// ── Transport failures ──────────────────────────────────────────

#[tokio::test]
async fn timeout_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VALIDATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = blocking(move || {
        HttpAuthority::new(uri, Duration::from_millis(200))
            .unwrap()
            .validate("KEY-1", &fingerprint())
    })
    .await;
    assert!(result.unwrap_err().is_transport());
}

#[tokio::test]
async fn refused_connection_is_transport_failure() {
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let result = blocking(move || authority(uri).activate("KEY-1", &fingerprint())).await;
    assert!(matches!(result, Err(LicenseError::Network(_))));
}

// ── Manager over HTTP ───────────────────────────────────────────

#[tokio::test]
async fn manager_end_to_end_over_http() {
    init_tracing();
    let server = MockServer::start().await;
    let sandbox = Sandbox::new();
    let config = LicenseConfig::new(server.uri()).with_license_file(sandbox.license_file());

    mount(&server, ACTIVATE_PATH, 200, json!({ "success": true })).await;
    let (mut manager, outcome) = blocking(move || {
        let mut manager = LicenseManager::new(&config).unwrap();
        let outcome = manager.activate("KEY-1");
        (manager, outcome)
    })
    .await;
    assert!(outcome.ok);
    assert!(sandbox.license_file().exists());

    mount(
        &server,
        VALIDATE_PATH,
        200,
        json!({ "success": true, "data": { "plan": "pro" } }),
    )
    .await;
    let (mut manager, outcome) = blocking(move || {
        let outcome = manager.validate();
        (manager, outcome)
    })
    .await;
    assert!(outcome.ok);
    assert_eq!(outcome.info, Some(pro_info()));

    server.reset().await;
    mount(
        &server,
        VALIDATE_PATH,
        200,
        json!({ "success": false, "message": "revoked" }),
    )
    .await;
    let (manager, outcome) = blocking(move || {
        let outcome = manager.validate();
        (manager, outcome)
    })
    .await;
    assert!(!outcome.ok);
    assert_eq!(outcome.message, "revoked");
    assert_eq!(manager.status(), LicenseStatus::Invalid);
    blocking(move || drop(manager)).await;
}
