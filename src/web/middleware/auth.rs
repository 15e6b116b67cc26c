//! Authentication provider chain.
//!
//! Every request passes through [`AuthFilter`], which asks each
//! [`AuthProvider`] in order who the caller is. The first provider with an
//! opinion decides. A request without usable credentials still goes through
//! as the anonymous principal; it is up to permission enforcement to reject
//! it, after which the providers get a chance to challenge the client.

use std::sync::Arc;

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Method, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::auth::{PermissionResolver, Principal, SharedPrincipal};
use crate::web::error::{ApiError, AuthRequired};

/// The parts of a request providers look at.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// Request method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
}

impl RequestHead {
    /// Snapshot the head of a request.
    pub fn of(request: &Request<Body>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        }
    }
}

/// Outcome of a single provider.
pub enum AuthResult {
    /// No credentials for this provider; ask the next one.
    None,
    /// Authenticated.
    Success(SharedPrincipal),
    /// Credentials were presented but rejected.
    Failure,
    /// The provider answered the request itself.
    Challenge(Response),
}

/// A credential channel, such as a session cookie or HTTP Basic.
pub trait AuthProvider: Send + Sync {
    /// Short name used in log events.
    fn name(&self) -> &'static str;

    /// Try to authenticate a request.
    fn authenticate(&self, request: &RequestHead) -> AuthResult;

    /// Turn a 401 [`AuthRequired`] response into a challenge for this channel.
    ///
    /// Returns whether the response was changed. Providers must leave the
    /// response alone when they return `false`.
    fn challenge(&self, request: &RequestHead, response: &mut Response) -> bool;
}

/// The principal attached to a request.
///
/// Every request that went through [`AuthFilter`] carries one, so handlers
/// can use this as an extractor.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub SharedPrincipal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentPrincipal>()
            .cloned()
            .ok_or_else(ApiError::authentication_required)
    }
}

/// Ordered provider chain.
#[derive(Clone)]
pub struct AuthFilter {
    providers: Arc<Vec<Arc<dyn AuthProvider>>>,
    anonymous: SharedPrincipal,
}

impl AuthFilter {
    /// Create a filter without providers.
    pub fn new(resolver: Arc<dyn PermissionResolver>) -> Self {
        Self {
            providers: Arc::new(Vec::new()),
            anonymous: Principal::anonymous(resolver).into_shared(),
        }
    }

    /// Append a provider with the lowest priority so far.
    pub fn with_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        Arc::make_mut(&mut self.providers).push(provider);
        self
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Run the chain for a request.
    pub async fn run(&self, mut request: Request<Body>, next: Next) -> Response {
        let head = RequestHead::of(&request);

        for provider in self.providers.iter() {
            match provider.authenticate(&head) {
                AuthResult::None => continue,
                AuthResult::Success(principal) => {
                    debug!(provider = provider.name(), principal = %principal.name(), "Authenticated");
                    request.extensions_mut().insert(CurrentPrincipal(principal));
                    return next.run(request).await;
                }
                AuthResult::Failure => {
                    warn!(provider = provider.name(), path = %head.uri.path(), "Authentication failed");
                    return ApiError::invalid_credentials().into_response();
                }
                AuthResult::Challenge(response) => {
                    debug!(provider = provider.name(), "Provider answered with a challenge");
                    return response;
                }
            }
        }

        request
            .extensions_mut()
            .insert(CurrentPrincipal(self.anonymous.clone()));
        let mut response = next.run(request).await;

        if response.status() == StatusCode::UNAUTHORIZED
            && response.extensions().get::<AuthRequired>().is_some()
        {
            for provider in self.providers.iter() {
                if provider.challenge(&head, &mut response) {
                    debug!(provider = provider.name(), "Challenge issued");
                    break;
                }
            }
        }

        response
    }
}

/// Middleware entry point, for use with `middleware::from_fn_with_state`.
pub async fn auth_filter(
    State(filter): State<AuthFilter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    filter.run(request, next).await
}
