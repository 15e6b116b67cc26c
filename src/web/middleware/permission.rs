//! Permission enforcement middleware.
//!
//! Two layers share [`check_permissions`]:
//!
//! - [`PathPermissions`] guards everything below a route with a fixed list
//!   of requirements;
//! - [`OperationPermissions`] is a table from HTTP method to requirements,
//!   filled in when routes are registered.
//!
//! Both must run inside [`super::auth_filter`] so that a principal is
//! attached. A denial for the anonymous principal is a 401 tagged with
//! [`AuthRequired`](crate::web::error::AuthRequired), which the auth filter
//! then turns into a challenge.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::auth::CurrentPrincipal;
use crate::auth::{check_permissions, PermissionError, PermissionRequirement, RequestPrincipal};
use crate::web::error::ApiError;

/// Methods the per-operation table can hold requirements for.
pub const CHECKED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
    Method::TRACE,
];

fn principal_of(request: &Request<Body>) -> Option<&dyn RequestPrincipal> {
    request
        .extensions()
        .get::<CurrentPrincipal>()
        .map(|p| p.0.as_ref())
}

fn deny(request: &Request<Body>, err: PermissionError) -> Response {
    debug!(method = %request.method(), path = %request.uri().path(), error = %err, "Request denied");
    ApiError::from(err).into_response()
}

/// Fixed requirements for a whole route tree.
#[derive(Debug, Clone, Default)]
pub struct PathPermissions {
    requirements: Arc<Vec<PermissionRequirement>>,
}

impl PathPermissions {
    /// Guard with a list of requirements, all of which must hold.
    pub fn new(requirements: Vec<PermissionRequirement>) -> Self {
        Self {
            requirements: Arc::new(requirements),
        }
    }

    /// Guard requiring every listed permission.
    pub fn all<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(vec![PermissionRequirement::all(permissions)])
    }

    /// Guard requiring at least one listed permission.
    pub fn any<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(vec![PermissionRequirement::any(permissions)])
    }

    /// Check a principal.
    pub fn check(&self, principal: Option<&dyn RequestPrincipal>) -> Result<(), PermissionError> {
        check_permissions(principal, &self.requirements)
    }
}

/// Middleware for [`PathPermissions`], for use with `middleware::from_fn_with_state`.
pub async fn require_path_permissions(
    State(guard): State<PathPermissions>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Err(err) = guard.check(principal_of(&request)) {
        return deny(&request, err);
    }
    next.run(request).await
}

/// Requirements per HTTP method for one route.
///
/// A method without an entry passes unchecked, as does any method outside
/// [`CHECKED_METHODS`].
#[derive(Debug, Clone, Default)]
pub struct OperationPermissions {
    table: Arc<HashMap<Method, Vec<PermissionRequirement>>>,
}

impl OperationPermissions {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a requirement for a method. Several requirements for the same
    /// method must all hold.
    pub fn require(mut self, method: Method, requirement: PermissionRequirement) -> Self {
        if !CHECKED_METHODS.contains(&method) {
            warn!(method = %method, "Ignoring permission requirement for unchecked method");
            return self;
        }
        Arc::make_mut(&mut self.table)
            .entry(method)
            .or_default()
            .push(requirement);
        self
    }

    /// Shorthand for an `All` requirement.
    pub fn require_all<I, S>(self, method: Method, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require(method, PermissionRequirement::all(permissions))
    }

    /// Shorthand for an `Any` requirement.
    pub fn require_any<I, S>(self, method: Method, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require(method, PermissionRequirement::any(permissions))
    }

    /// Requirements registered for a method.
    pub fn requirements_for(&self, method: &Method) -> &[PermissionRequirement] {
        self.table.get(method).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check a principal for a method.
    pub fn check(
        &self,
        method: &Method,
        principal: Option<&dyn RequestPrincipal>,
    ) -> Result<(), PermissionError> {
        check_permissions(principal, self.requirements_for(method))
    }
}

/// Middleware for [`OperationPermissions`], for use with `middleware::from_fn_with_state`.
pub async fn require_operation_permissions(
    State(table): State<OperationPermissions>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Err(err) = table.check(request.method(), principal_of(&request)) {
        return deny(&request, err);
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Principal, StaticPermissionResolver, ANONYMOUS_GROUP};
    use crate::web::error::AuthRequired;
    use axum::{
        http::StatusCode,
        middleware,
        routing::{get, MethodRouter},
        Router,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    fn resolver(user: Uuid) -> Arc<StaticPermissionResolver> {
        Arc::new(
            StaticPermissionResolver::new()
                .with_user_permissions(user, ["a", "b"])
                .with_group(ANONYMOUS_GROUP, ["public"]),
        )
    }

    /// Attach a fixed principal, standing in for the auth filter.
    fn with_principal(router: Router, principal: Option<Principal>) -> Router {
        router.layer(middleware::from_fn(
            move |mut request: Request<Body>, next: Next| {
                let principal = principal.clone();
                async move {
                    if let Some(p) = principal {
                        request
                            .extensions_mut()
                            .insert(CurrentPrincipal(p.into_shared()));
                    }
                    next.run(request).await
                }
            },
        ))
    }

    fn user() -> Principal {
        let id = Uuid::new_v4();
        Principal::new(id, None, resolver(id))
    }

    fn anonymous() -> Principal {
        Principal::anonymous(resolver(Uuid::new_v4()))
    }

    fn path_app(guard: PathPermissions, principal: Option<Principal>) -> Router {
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(guard, require_path_permissions));
        with_principal(router, principal)
    }

    fn operation_app(
        table: OperationPermissions,
        route: MethodRouter,
        principal: Option<Principal>,
    ) -> Router {
        let router = Router::new().route(
            "/",
            route.layer(middleware::from_fn_with_state(
                table,
                require_operation_permissions,
            )),
        );
        with_principal(router, principal)
    }

    async fn status(app: Router, method: Method) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_path_all_denied_for_user_is_forbidden() {
        let app = path_app(PathPermissions::all(["a", "b", "c"]), Some(user()));
        assert_eq!(status(app, Method::GET).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_path_all_denied_for_anonymous_is_unauthorized() {
        let app = path_app(PathPermissions::all(["a", "b", "c"]), Some(anonymous()));
        assert_eq!(status(app, Method::GET).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_denial_for_anonymous_asks_for_authentication() {
        let app = path_app(PathPermissions::all(["a"]), Some(anonymous()));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<AuthRequired>().is_some());
    }

    #[tokio::test]
    async fn test_forbidden_does_not_ask_for_authentication() {
        let app = path_app(PathPermissions::all(["c"]), Some(user()));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.extensions().get::<AuthRequired>().is_none());
    }

    #[tokio::test]
    async fn test_path_any_allowed() {
        let app = path_app(PathPermissions::any(["c", "b"]), Some(user()));
        assert_eq!(status(app, Method::GET).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_path_anonymous_group_grant() {
        let app = path_app(PathPermissions::all(["public"]), Some(anonymous()));
        assert_eq!(status(app, Method::GET).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_path_empty_any_allows_anonymous() {
        let app = path_app(
            PathPermissions::any(Vec::<String>::new()),
            Some(anonymous()),
        );
        assert_eq!(status(app, Method::GET).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_path_without_principal_is_unauthorized() {
        let app = path_app(PathPermissions::any(Vec::<String>::new()), None);
        assert_eq!(status(app, Method::GET).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_operation_table_per_method() {
        let table = OperationPermissions::new()
            .require_all(Method::GET, ["a"])
            .require_all(Method::POST, ["c"]);
        let route = get(|| async { "read" }).post(|| async { "write" });

        let app = operation_app(table.clone(), route.clone(), Some(user()));
        assert_eq!(status(app, Method::GET).await, StatusCode::OK);

        let app = operation_app(table, route, Some(user()));
        assert_eq!(status(app, Method::POST).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_operation_without_entry_passes() {
        let table = OperationPermissions::new().require_all(Method::POST, ["c"]);
        let app = operation_app(table, get(|| async { "read" }), Some(anonymous()));

        assert_eq!(status(app, Method::GET).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_operation_multiple_requirements_must_all_hold() {
        let table = OperationPermissions::new()
            .require_any(Method::GET, ["a", "x"])
            .require_all(Method::GET, ["z"]);
        let app = operation_app(table, get(|| async { "read" }), Some(user()));

        assert_eq!(status(app, Method::GET).await, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_unchecked_method_is_ignored() {
        let table = OperationPermissions::new().require_all(Method::PATCH, ["a"]);

        assert!(table.requirements_for(&Method::PATCH).is_empty());
        assert!(table.check(&Method::PATCH, None).is_ok());
    }

    #[test]
    fn test_requirements_for() {
        let table = OperationPermissions::new()
            .require_all(Method::DELETE, ["x"])
            .require_any(Method::DELETE, ["y"]);

        assert_eq!(table.requirements_for(&Method::DELETE).len(), 2);
        assert!(table.requirements_for(&Method::GET).is_empty());
    }
}
