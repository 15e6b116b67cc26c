//! Middleware for the Gatehouse HTTP surface.

pub mod auth;
pub mod permission;

pub use auth::{auth_filter, AuthFilter, AuthProvider, AuthResult, CurrentPrincipal, RequestHead};
pub use permission::{
    require_operation_permissions, require_path_permissions, OperationPermissions,
    PathPermissions, CHECKED_METHODS,
};
