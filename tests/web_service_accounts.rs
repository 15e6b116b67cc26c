//! Service account API and HTTP Basic tests.

mod common;

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, COOKIE, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use common::{basic, Harness, ADMIN_NAME, ADMIN_PASSWORD, USER_NAME, USER_PASSWORD};
use gatehouse::auth::{hash_secret, CombinedCredentialValidator, ANONYMOUS_ID};
use gatehouse::web::middleware::AuthFilter;
use gatehouse::web::providers::BasicAuthProvider;
use gatehouse::web::create_router_with_filter;

// ============================================================================
// Admin API Tests
// ============================================================================

#[tokio::test]
async fn test_create_and_list_service_accounts() {
    let h = Harness::new();
    let cookie = h.login(ADMIN_NAME, ADMIN_PASSWORD).await;

    let response = h
        .server
        .post("/api/service-accounts")
        .add_header(COOKIE, cookie.clone())
        .json(&json!({ "name": "ci", "password": "ci-secret-1" }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "serviceaccount.ci");

    h.create_service_account("backup", "backup-secret");

    let response = h
        .server
        .get("/api/service-accounts")
        .add_header(COOKIE, cookie)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let names: Vec<&str> = body["data"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|a| a["name"].as_str())
        .collect();
    assert_eq!(names, ["serviceaccount.backup", "serviceaccount.ci"]);
}

#[tokio::test]
async fn test_create_from_hash() {
    let h = Harness::new();
    let cookie = h.login(ADMIN_NAME, ADMIN_PASSWORD).await;
    let hash = hash_secret("deploy-secret").unwrap();

    let response = h
        .server
        .post("/api/service-accounts")
        .add_header(COOKIE, cookie)
        .form(&[("name", "serviceaccount.deploy"), ("password_hash", hash.as_str())])
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = h
        .server
        .get("/whoami")
        .add_header(AUTHORIZATION, basic("serviceaccount.deploy", "deploy-secret"))
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"]["display_name"], "serviceaccount.deploy");
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let h = Harness::new();
    let cookie = h.login(ADMIN_NAME, ADMIN_PASSWORD).await;

    let both = h
        .server
        .post("/api/service-accounts")
        .add_header(COOKIE, cookie.clone())
        .json(&json!({ "name": "ci", "password": "ci-secret-1", "password_hash": "y" }))
        .await;
    both.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = both.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["error"]["details"]["__all__"][0],
        "Exactly one of password and password_hash is required"
    );

    let neither = h
        .server
        .post("/api/service-accounts")
        .add_header(COOKIE, cookie.clone())
        .json(&json!({ "name": "ci" }))
        .await;
    neither.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let blank = h
        .server
        .post("/api/service-accounts")
        .add_header(COOKIE, cookie.clone())
        .json(&json!({ "name": "  ", "password": "ci-secret-1" }))
        .await;
    blank.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = blank.json();
    assert_eq!(body["error"]["details"]["name"][0], "Must not be empty");

    let short = h
        .server
        .post("/api/service-accounts")
        .add_header(COOKIE, cookie.clone())
        .json(&json!({ "name": "ci", "password": "x" }))
        .await;
    short.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let not_a_hash = h
        .server
        .post("/api/service-accounts")
        .add_header(COOKIE, cookie)
        .json(&json!({ "name": "ci", "password_hash": "plaintext" }))
        .await;
    not_a_hash.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(h.state.service_accounts.list().is_empty());
}

#[tokio::test]
async fn test_create_duplicate_is_conflict() {
    let h = Harness::new();
    let cookie = h.login(ADMIN_NAME, ADMIN_PASSWORD).await;
    h.create_service_account("ci", "ci-secret-1");

    let response = h
        .server
        .post("/api/service-accounts")
        .add_header(COOKIE, cookie)
        .json(&json!({ "name": "ci", "password": "other-secret" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_delete_service_account() {
    let h = Harness::new();
    let cookie = h.login(ADMIN_NAME, ADMIN_PASSWORD).await;
    h.create_service_account("ci", "ci-secret-1");

    let response = h
        .server
        .delete("/api/service-accounts/ci")
        .add_header(COOKIE, cookie.clone())
        .await;
    response.assert_status(StatusCode::NO_CONTENT);
    assert!(h.state.service_accounts.list().is_empty());

    let response = h
        .server
        .delete("/api/service-accounts/serviceaccount.ci")
        .add_header(COOKIE, cookie)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = h
        .server
        .get("/whoami")
        .add_header(AUTHORIZATION, basic("serviceaccount.ci", "ci-secret-1"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_without_grant_is_forbidden() {
    let h = Harness::new();
    let cookie = h.login(USER_NAME, USER_PASSWORD).await;

    let response = h
        .server
        .get("/api/service-accounts")
        .add_header(COOKIE, cookie)
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Insufficient permissions");
}

// ============================================================================
// HTTP Basic Tests
// ============================================================================

#[tokio::test]
async fn test_basic_auth_uses_group_grants() {
    let h = Harness::new();
    let id = h.create_service_account("ci", "ci-secret-1");
    let header = basic("serviceaccount.ci", "ci-secret-1");

    let response = h
        .server
        .get("/whoami")
        .add_header(AUTHORIZATION, header.clone())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["id"], id.to_string());
    assert_eq!(body["data"]["anonymous"], false);

    // SERVICE_ACCOUNT may list, but not create.
    h.server
        .get("/api/service-accounts")
        .add_header(AUTHORIZATION, header.clone())
        .await
        .assert_status_ok();

    h.server
        .post("/api/service-accounts")
        .add_header(AUTHORIZATION, header)
        .json(&json!({ "name": "other", "password": "other-secret" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_basic_auth_by_id() {
    let h = Harness::new();
    let id = h.create_service_account("ci", "ci-secret-1");

    let response = h
        .server
        .get("/whoami")
        .add_header(AUTHORIZATION, basic(&id.to_string(), "ci-secret-1"))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["id"], id.to_string());
}

#[tokio::test]
async fn test_basic_auth_wrong_secret_is_rejected() {
    let h = Harness::new();
    h.create_service_account("ci", "ci-secret-1");

    let response = h
        .server
        .get("/whoami")
        .add_header(AUTHORIZATION, basic("serviceaccount.ci", "nope"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_basic_auth_does_not_cover_player_accounts() {
    let h = Harness::new();

    let response = h
        .server
        .get("/whoami")
        .add_header(AUTHORIZATION, basic(ADMIN_NAME, ADMIN_PASSWORD))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_basic_auth_as_anonymous_id_is_rejected() {
    let h = Harness::new();

    let response = h
        .server
        .get("/whoami")
        .add_header(AUTHORIZATION, basic(&ANONYMOUS_ID.to_string(), ""))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_basic_only_chain_challenges_with_www_authenticate() {
    let h = Harness::new();
    h.create_service_account("ci", "ci-secret-1");

    let validator =
        CombinedCredentialValidator::new().with(h.state.service_accounts.store().clone());
    let filter = AuthFilter::new(h.state.resolver.clone()).with_provider(Arc::new(
        BasicAuthProvider::new(Arc::new(validator), h.state.resolver.clone()),
    ));
    let server = TestServer::new(create_router_with_filter(h.state.clone(), filter))
        .expect("Failed to create test server");

    let response = server.get("/api/service-accounts").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[WWW_AUTHENTICATE], "Basic");

    server
        .get("/api/service-accounts")
        .add_header(AUTHORIZATION, basic("serviceaccount.ci", "ci-secret-1"))
        .await
        .assert_status_ok();
}

// ============================================================================
// Provisioning Tests
// ============================================================================

#[tokio::test]
async fn test_provisioned_account_can_authenticate() {
    let h = Harness::new();
    let dir = TempDir::new().unwrap();
    let hash = hash_secret("provisioned-secret").unwrap();
    std::fs::write(
        dir.path().join("metrics.serviceaccount.json"),
        json!({
            "Name": "metrics",
            "Enabled": true,
            "PasswordHash": hash,
            "Permissions": ["gatehouse.logincode.create"]
        })
        .to_string(),
    )
    .unwrap();

    let report = h
        .state
        .service_accounts
        .import_provisioning_dir(dir.path())
        .unwrap();
    assert_eq!(report.provisioned.len(), 1);
    assert!(report.failed.is_empty());

    let header = basic("serviceaccount.metrics", "provisioned-secret");
    h.server
        .post("/api/login-codes")
        .add_header(AUTHORIZATION, header)
        .await
        .assert_status_ok();
}
