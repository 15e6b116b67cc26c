//! Gatehouse - request-time authentication and authorization for HTTP servers.
//!
//! The crate resolves who is calling (browser session, HTTP Basic, or the
//! anonymous principal) and checks declared permissions before a handler
//! runs. Credentials live in JSON-backed bcrypt stores.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod web;

pub use auth::{
    CombinedCredentialValidator, CredentialValidator, LoginCodeStore, PasswordStore,
    PermissionRequirement, PermissionResolver, Principal, RequestPrincipal,
    ServiceAccountManager, StaticPermissionResolver, ANONYMOUS_ID,
};
pub use config::Config;
pub use error::{GatehouseError, Result};
pub use web::{create_router, AppState, WebServer};
