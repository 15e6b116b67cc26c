//! Test helpers for the HTTP integration tests.
//!
//! Builds a full router over in-memory stores with a small permission setup:
//! an admin allowed everything under `gatehouse.`, a plain user with no
//! grants, and service accounts allowed to list service accounts.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::SET_COOKIE;
use axum_test::{TestResponse, TestServer};
use base64::{engine::general_purpose::STANDARD, Engine};
use uuid::Uuid;

use gatehouse::auth::{
    MemoryBackend, PasswordStore, ServiceAccountManager, StaticPermissionResolver,
    SERVICE_ACCOUNT_GROUP,
};
use gatehouse::web::{create_router, AppState, SessionStore};

/// Session cookie name used by the harness.
pub const COOKIE_NAME: &str = "gatehouse_session";

pub const ADMIN_NAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const USER_NAME: &str = "bob";
pub const USER_PASSWORD: &str = "bob-password";

/// A running router plus handles to everything behind it.
pub struct Harness {
    pub server: TestServer,
    pub state: AppState,
    pub resolver: Arc<StaticPermissionResolver>,
    pub admin_id: Uuid,
    pub user_id: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        let (state, resolver, admin_id, user_id) = build_state();
        let server =
            TestServer::new(create_router(state.clone())).expect("Failed to create test server");

        Self {
            server,
            state,
            resolver,
            admin_id,
            user_id,
        }
    }

    /// Log in with a password and return the session cookie header value.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .server
            .post("/login")
            .form(&[
                ("method", "password"),
                ("username", username),
                ("password", password),
            ])
            .await;
        response.assert_status(axum::http::StatusCode::SEE_OTHER);
        session_cookie(&response).expect("login did not set a session cookie")
    }

    /// Create a service account directly through the manager.
    pub fn create_service_account(&self, name: &str, secret: &str) -> Uuid {
        self.state
            .service_accounts
            .create(name, secret)
            .expect("Failed to create service account")
            .id
    }
}

fn build_state() -> (AppState, Arc<StaticPermissionResolver>, Uuid, Uuid) {
    let admin_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    let resolver = Arc::new(
        StaticPermissionResolver::new()
            .with_user_permissions(admin_id, ["gatehouse.*"])
            .with_group(SERVICE_ACCOUNT_GROUP, ["gatehouse.serviceaccount.list"]),
    );

    let users = Arc::new(PasswordStore::new(MemoryBackend::new()));
    users
        .set_credential(admin_id, Some(ADMIN_NAME), ADMIN_PASSWORD)
        .expect("Failed to store admin credential");
    users
        .set_credential(user_id, Some(USER_NAME), USER_PASSWORD)
        .expect("Failed to store user credential");

    let service_accounts = Arc::new(
        ServiceAccountManager::new(Arc::new(PasswordStore::new(MemoryBackend::new())))
            .with_resolver(resolver.clone()),
    );
    let sessions = Arc::new(SessionStore::new(COOKIE_NAME, Duration::from_secs(600)));

    let state = AppState::new(users, service_accounts, sessions, resolver.clone());
    (state, resolver, admin_id, user_id)
}

/// The `name=token` pair of the session cookie set by a response, if any.
pub fn session_cookie(response: &TestResponse) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| {
            pair.strip_prefix(COOKIE_NAME)
                .and_then(|rest| rest.strip_prefix('='))
                .is_some_and(|token| !token.is_empty())
        })
        .map(str::to_string)
}

/// Location header of a redirect.
pub fn location(response: &TestResponse) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Value for an HTTP Basic `Authorization` header.
pub fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}
