//! Built-in authentication providers.

mod basic;
mod session;

pub use basic::BasicAuthProvider;
pub use session::{is_local_path, login_redirect, SessionAuthProvider, LOGIN_PATH};
