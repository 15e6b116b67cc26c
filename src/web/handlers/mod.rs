//! API handlers for Gatehouse.

pub mod auth;
pub mod service_account;

pub use auth::*;
pub use service_account::*;
