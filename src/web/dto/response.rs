//! Response DTOs for the Gatehouse API.

use serde::Serialize;
use uuid::Uuid;

use crate::auth::{RequestPrincipal, ServiceAccount};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// The calling identity (for /whoami).
#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    /// Principal name.
    pub name: String,
    /// User id, if the identity maps to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Whether this is the anonymous identity.
    pub anonymous: bool,
}

impl WhoAmIResponse {
    /// Describe a principal.
    pub fn from_principal(principal: &dyn RequestPrincipal) -> Self {
        Self {
            name: principal.name(),
            id: principal.user_id(),
            display_name: principal.display_name().map(str::to_string),
            anonymous: principal
                .as_permission_holder()
                .is_some_and(|h| h.is_anonymous()),
        }
    }
}

/// Login page state.
#[derive(Debug, Serialize)]
pub struct LoginPageResponse {
    /// Methods accepted by `POST /login`.
    pub methods: Vec<&'static str>,
    /// Sanitized redirect target.
    pub redirect_url: String,
    /// The identity the caller currently has.
    pub current: WhoAmIResponse,
}

/// Service account in responses.
#[derive(Debug, Serialize)]
pub struct ServiceAccountResponse {
    /// Account id.
    pub id: Uuid,
    /// Prefixed account name.
    pub name: String,
}

impl From<ServiceAccount> for ServiceAccountResponse {
    fn from(account: ServiceAccount) -> Self {
        Self {
            id: account.id,
            name: account.name,
        }
    }
}

/// Freshly issued login code.
#[derive(Debug, Serialize)]
pub struct LoginCodeResponse {
    /// The code to type into the login form.
    pub code: String,
    /// Seconds until the code expires.
    pub expires_in: i64,
}
