//! Session cookie provider.

use std::sync::Arc;

use axum::http::{header::LOCATION, HeaderValue, StatusCode};
use axum::response::Response;
use tracing::error;

use crate::auth::{PermissionResolver, Principal};
use crate::web::middleware::{AuthProvider, AuthResult, RequestHead};
use crate::web::session::SessionStore;

/// Path of the login page challenges redirect to.
pub const LOGIN_PATH: &str = "/login";

/// Whether `target` is a path on this server.
///
/// Only paths starting with a single `/` qualify; `//host` and `/\host`
/// are read by browsers as absolute URLs. Control characters disqualify.
pub fn is_local_path(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.starts_with("/\\")
        && !target.chars().any(char::is_control)
}

/// Login URL that returns to `target` afterwards.
///
/// Targets that are not local paths are replaced by `/`.
///
/// # Examples
///
/// ```
/// use gatehouse::web::providers::login_redirect;
///
/// assert_eq!(login_redirect("/admin?tab=1"), "/login?redirect_url=%2Fadmin%3Ftab%3D1");
/// assert_eq!(login_redirect("https://evil.example"), "/login?redirect_url=%2F");
/// ```
pub fn login_redirect(target: &str) -> String {
    let target = if is_local_path(target) { target } else { "/" };
    format!("{LOGIN_PATH}?redirect_url={}", urlencoding::encode(target))
}

/// Authenticates requests carrying a live session cookie.
pub struct SessionAuthProvider {
    sessions: Arc<SessionStore>,
    resolver: Arc<dyn PermissionResolver>,
}

impl SessionAuthProvider {
    /// Create a provider over a session store.
    pub fn new(sessions: Arc<SessionStore>, resolver: Arc<dyn PermissionResolver>) -> Self {
        Self { sessions, resolver }
    }
}

impl AuthProvider for SessionAuthProvider {
    fn name(&self) -> &'static str {
        "session"
    }

    fn authenticate(&self, request: &RequestHead) -> AuthResult {
        match self.sessions.from_headers(&request.headers) {
            Some(session) => AuthResult::Success(
                Principal::new(session.user_id, session.display_name, self.resolver.clone())
                    .into_shared(),
            ),
            None => AuthResult::None,
        }
    }

    fn challenge(&self, request: &RequestHead, response: &mut Response) -> bool {
        let target = request
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let location = match HeaderValue::from_str(&login_redirect(target)) {
            Ok(location) => location,
            Err(e) => {
                error!(error = %e, "Failed to build login redirect");
                return false;
            }
        };

        *response.status_mut() = StatusCode::FOUND;
        response.headers_mut().insert(LOCATION, location);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{StaticPermissionResolver, ANONYMOUS_ID};
    use crate::web::session::SessionData;
    use axum::http::{header::COOKIE, HeaderMap, Method, Uri};
    use axum::response::IntoResponse;
    use std::time::Duration;
    use uuid::Uuid;

    fn provider() -> (SessionAuthProvider, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new("sid", Duration::from_secs(60)));
        (
            SessionAuthProvider::new(sessions.clone(), Arc::new(StaticPermissionResolver::new())),
            sessions,
        )
    }

    fn head(path: &str, cookie: Option<&str>) -> RequestHead {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            headers.insert(COOKIE, cookie.parse().unwrap());
        }
        RequestHead {
            method: Method::GET,
            uri: path.parse::<Uri>().unwrap(),
            headers,
        }
    }

    #[test]
    fn test_no_cookie_is_none() {
        let (provider, _) = provider();
        assert!(matches!(
            provider.authenticate(&head("/", None)),
            AuthResult::None
        ));
    }

    #[test]
    fn test_unknown_session_is_none() {
        let (provider, _) = provider();
        assert!(matches!(
            provider.authenticate(&head("/", Some("sid=bogus"))),
            AuthResult::None
        ));
    }

    #[test]
    fn test_live_session_succeeds() {
        let (provider, sessions) = provider();
        let id = Uuid::new_v4();
        let token = sessions.create(SessionData {
            user_id: id,
            display_name: Some("Bob".to_string()),
        });

        match provider.authenticate(&head("/", Some(&format!("sid={token}")))) {
            AuthResult::Success(principal) => {
                assert_eq!(principal.user_id(), Some(id));
                assert_eq!(principal.display_name(), Some("Bob"));
                assert_ne!(principal.user_id(), Some(ANONYMOUS_ID));
            }
            _ => panic!("expected success"),
        }
    }

    #[test]
    fn test_challenge_redirects_to_login() {
        let (provider, _) = provider();
        let mut response = StatusCode::UNAUTHORIZED.into_response();

        assert!(provider.challenge(&head("/admin/users?page=2", None), &mut response));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[LOCATION],
            "/login?redirect_url=%2Fadmin%2Fusers%3Fpage%3D2"
        );
    }

    #[test]
    fn test_login_redirect_rejects_absolute_targets() {
        assert_eq!(login_redirect("//evil"), "/login?redirect_url=%2F");
        assert_eq!(login_redirect("/\\evil"), "/login?redirect_url=%2F");
        assert_eq!(login_redirect("evil"), "/login?redirect_url=%2F");
        assert_eq!(login_redirect(""), "/login?redirect_url=%2F");
    }

    #[test]
    fn test_is_local_path_rejects_control_chars() {
        assert!(is_local_path("/admin?tab=1"));
        assert!(!is_local_path("/ok\nX-Evil: 1"));
        assert!(!is_local_path("/ok\r"));
        assert!(!is_local_path("/\t/evil"));
    }
}
