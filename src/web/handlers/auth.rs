//! Login, logout and identity handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    CombinedCredentialValidator, CredentialValidator, LoginCodeStore,
    PasswordStore, PermissionResolver, ServiceAccountManager, UserRef, LOGIN_CODE_VALIDITY_SECS,
};
use crate::web::dto::{
    ApiResponse, FormOrJson, LoginCodeResponse, LoginMethod, LoginPageQuery,
    LoginPageResponse, LoginRequest, WhoAmIResponse,
};
use crate::web::error::ApiError;
use crate::web::middleware::CurrentPrincipal;
use crate::web::providers::is_local_path;
use crate::web::session::{SessionData, SessionStore};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// User (player) credentials.
    pub users: Arc<PasswordStore>,
    /// Service accounts.
    pub service_accounts: Arc<ServiceAccountManager>,
    /// Validator used by `POST /login`: users first, then service accounts.
    pub login_validator: Arc<CombinedCredentialValidator>,
    /// Pending login codes.
    pub login_codes: Arc<LoginCodeStore>,
    /// Browser sessions.
    pub sessions: Arc<SessionStore>,
    /// Permission resolver principals are evaluated against.
    pub resolver: Arc<dyn PermissionResolver>,
}

impl AppState {
    /// Create the application state.
    pub fn new(
        users: Arc<PasswordStore>,
        service_accounts: Arc<ServiceAccountManager>,
        sessions: Arc<SessionStore>,
        resolver: Arc<dyn PermissionResolver>,
    ) -> Self {
        let login_validator = CombinedCredentialValidator::new()
            .with(users.clone())
            .with(service_accounts.store().clone());

        Self {
            users,
            service_accounts,
            login_validator: Arc::new(login_validator),
            login_codes: Arc::new(LoginCodeStore::new()),
            sessions,
            resolver,
        }
    }

    /// Replace the login code store.
    pub fn with_login_codes(mut self, login_codes: Arc<LoginCodeStore>) -> Self {
        self.login_codes = login_codes;
        self
    }
}

/// Methods accepted by `POST /login`.
const LOGIN_METHODS: [&str; 3] = ["code", "password", "password_create"];

fn redirect_target(requested: Option<&str>) -> &str {
    requested.filter(|t| is_local_path(t)).unwrap_or("/")
}

/// `303 See Other` to a local path.
///
/// A target that is not a valid header value falls back to `/`.
fn see_other(target: &str) -> Response {
    let location = HeaderValue::from_str(target).unwrap_or(HeaderValue::from_static("/"));
    (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response()
}

fn take_login_code(state: &AppState, req: &LoginRequest) -> Result<(Uuid, String), ApiError> {
    let entry = state
        .login_codes
        .take_entry(req.login_code())
        .ok_or_else(|| ApiError::unauthorized("Login code invalid or expired"))?;
    Ok((entry.user_id, entry.display_name))
}

/// GET /login - Login page state.
pub async fn login_page(
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<LoginPageQuery>,
) -> Json<ApiResponse<LoginPageResponse>> {
    Json(ApiResponse::new(LoginPageResponse {
        methods: LOGIN_METHODS.to_vec(),
        redirect_url: redirect_target(query.redirect_url.as_deref()).to_string(),
        current: WhoAmIResponse::from_principal(principal.as_ref()),
    }))
}

/// POST /login - Log in with a login code or a password.
///
/// On success a session is started and the client is redirected to
/// `redirect_url` (local paths only) or `/`.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    FormOrJson(req): FormOrJson<LoginRequest>,
) -> Result<(CookieJar, Response), ApiError> {
    let (user_id, display_name) = match req.method {
        LoginMethod::Code => {
            let (id, name) = take_login_code(&state, &req)?;
            (id, Some(name))
        }
        LoginMethod::Password => {
            let validated = state
                .login_validator
                .validate_credential(UserRef::parse(req.username()), req.password())
                .ok_or_else(|| {
                    warn!(method = ?req.method, "Login failed");
                    ApiError::invalid_credentials()
                })?;
            (validated.id, validated.name)
        }
        LoginMethod::PasswordCreate => {
            let (id, name) = take_login_code(&state, &req)?;
            state.users.set_credential(id, Some(&name), req.password())?;
            info!(user_id = %id, "Password set from login code");
            (id, Some(name))
        }
    };

    // A fresh token on every login, so a token planted before login is useless.
    if let Some(old) = state.sessions.token_from_jar(&jar) {
        state.sessions.destroy(&old);
    }
    let token = state.sessions.create(SessionData {
        user_id,
        display_name,
    });
    info!(user_id = %user_id, method = ?req.method, "Login succeeded");

    let target = redirect_target(req.redirect_url.as_deref());
    Ok((jar.add(state.sessions.cookie(token)), see_other(target)))
}

/// POST /logout - End the session.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(token) = state.sessions.token_from_jar(&jar) {
        if state.sessions.destroy(&token) {
            info!("Session ended");
        }
    }
    (jar.remove(state.sessions.removal_cookie()), Redirect::to("/"))
}

/// GET /whoami - The calling identity.
pub async fn whoami(
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Json<ApiResponse<WhoAmIResponse>> {
    Json(ApiResponse::new(WhoAmIResponse::from_principal(
        principal.as_ref(),
    )))
}

/// POST /api/login-codes - Issue a login code for the caller.
pub async fn create_login_code(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<ApiResponse<LoginCodeResponse>>, ApiError> {
    let anonymous = principal
        .as_permission_holder()
        .map_or(true, |h| h.is_anonymous());
    let user_id = principal
        .user_id()
        .filter(|_| !anonymous)
        .ok_or_else(ApiError::authentication_required)?;

    let display_name = principal
        .display_name()
        .map(str::to_string)
        .unwrap_or_else(|| principal.name());
    let code = state.login_codes.create_code(user_id, &display_name);

    Ok(Json(ApiResponse::new(LoginCodeResponse {
        code,
        expires_in: LOGIN_CODE_VALIDITY_SECS,
    })))
}
