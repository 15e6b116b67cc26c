//! HTTP Basic provider.

use std::sync::Arc;

use axum::http::{
    header::{AUTHORIZATION, WWW_AUTHENTICATE},
    HeaderValue,
};
use axum::response::Response;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use crate::auth::{CredentialValidator, PermissionResolver, Principal, UserRef};
use crate::web::middleware::{AuthProvider, AuthResult, RequestHead};

const BASIC_PREFIX: &str = "Basic ";

/// Authenticates `Authorization: Basic` headers against a validator.
///
/// A username that parses as a UUID is looked up by id, anything else by
/// name.
pub struct BasicAuthProvider {
    validator: Arc<dyn CredentialValidator>,
    resolver: Arc<dyn PermissionResolver>,
}

impl BasicAuthProvider {
    /// Create a provider over a validator.
    pub fn new(
        validator: Arc<dyn CredentialValidator>,
        resolver: Arc<dyn PermissionResolver>,
    ) -> Self {
        Self {
            validator,
            resolver,
        }
    }
}

/// Split a Basic credential into username and password.
fn decode_credentials(encoded: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

impl AuthProvider for BasicAuthProvider {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn authenticate(&self, request: &RequestHead) -> AuthResult {
        let Some(header) = request.headers.get(AUTHORIZATION) else {
            return AuthResult::None;
        };
        let Some(encoded) = header
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix(BASIC_PREFIX))
        else {
            return AuthResult::None;
        };

        let Some((user, password)) = decode_credentials(encoded) else {
            debug!("Malformed Basic credentials");
            return AuthResult::Failure;
        };

        match self
            .validator
            .validate_credential(UserRef::parse(&user), &password)
        {
            Some(validated) => AuthResult::Success(
                Principal::new(validated.id, validated.name, self.resolver.clone()).into_shared(),
            ),
            None => AuthResult::Failure,
        }
    }

    fn challenge(&self, _request: &RequestHead, response: &mut Response) -> bool {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
        true
    }
}
