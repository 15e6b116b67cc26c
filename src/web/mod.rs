//! HTTP surface for Gatehouse.
//!
//! Every request passes through the [`middleware::auth_filter`], which asks
//! each configured [`middleware::AuthProvider`] in turn who the caller is.
//! Routes then enforce permissions through [`middleware::OperationPermissions`]
//! or [`middleware::PathPermissions`].

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod providers;
pub mod router;
pub mod server;
pub mod session;

pub use error::{ApiError, AuthRequired};
pub use handlers::AppState;
pub use router::{create_router, create_router_with_filter, default_auth_filter};
pub use server::WebServer;
pub use session::{SessionData, SessionStore};
