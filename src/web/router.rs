//! Router configuration for the Gatehouse HTTP surface.

use std::sync::Arc;

use axum::{
    http::Method,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_login_code, create_service_account, delete_service_account, list_service_accounts,
    login, login_page, logout, whoami, AppState,
};
use super::middleware::{auth_filter, require_operation_permissions, AuthFilter, OperationPermissions};
use super::providers::{BasicAuthProvider, SessionAuthProvider};
use crate::auth::CombinedCredentialValidator;

/// Permission to list service accounts.
pub const PERM_SERVICE_ACCOUNT_LIST: &str = "gatehouse.serviceaccount.list";
/// Permission to create service accounts.
pub const PERM_SERVICE_ACCOUNT_CREATE: &str = "gatehouse.serviceaccount.create";
/// Permission to delete service accounts.
pub const PERM_SERVICE_ACCOUNT_DELETE: &str = "gatehouse.serviceaccount.delete";
/// Permission to issue login codes.
pub const PERM_LOGIN_CODE_CREATE: &str = "gatehouse.logincode.create";

/// The default provider chain: browser sessions, then Basic auth for
/// service accounts.
pub fn default_auth_filter(state: &AppState) -> AuthFilter {
    let service_accounts =
        CombinedCredentialValidator::new().with(state.service_accounts.store().clone());

    AuthFilter::new(state.resolver.clone())
        .with_provider(Arc::new(SessionAuthProvider::new(
            state.sessions.clone(),
            state.resolver.clone(),
        )))
        .with_provider(Arc::new(BasicAuthProvider::new(
            Arc::new(service_accounts),
            state.resolver.clone(),
        )))
}

/// Create the main router with the default provider chain.
pub fn create_router(state: AppState) -> Router {
    let filter = default_auth_filter(&state);
    create_router_with_filter(state, filter)
}

/// Create the main router with a custom provider chain.
pub fn create_router_with_filter(state: AppState, filter: AuthFilter) -> Router {
    let service_accounts = OperationPermissions::new()
        .require_all(Method::GET, [PERM_SERVICE_ACCOUNT_LIST])
        .require_all(Method::POST, [PERM_SERVICE_ACCOUNT_CREATE]);
    let service_account = OperationPermissions::new()
        .require_all(Method::DELETE, [PERM_SERVICE_ACCOUNT_DELETE]);
    let login_codes =
        OperationPermissions::new().require_all(Method::POST, [PERM_LOGIN_CODE_CREATE]);

    let api_routes = Router::new()
        .route(
            "/service-accounts",
            get(list_service_accounts)
                .post(create_service_account)
                .layer(middleware::from_fn_with_state(
                    service_accounts,
                    require_operation_permissions,
                )),
        )
        .route(
            "/service-accounts/:name",
            delete(delete_service_account).layer(middleware::from_fn_with_state(
                service_account,
                require_operation_permissions,
            )),
        )
        .route(
            "/login-codes",
            post(create_login_code).layer(middleware::from_fn_with_state(
                login_codes,
                require_operation_permissions,
            )),
        );

    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout).post(logout))
        .route("/whoami", get(whoami))
        .nest("/api", api_routes)
        .merge(create_health_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(filter, auth_filter)),
        )
        .with_state(state)
}

/// Create a health check router.
pub fn create_health_router<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
