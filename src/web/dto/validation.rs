//! Validation utilities for Gatehouse API DTOs.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::web::error::ApiError;

/// A validated body that may be sent as JSON or as an HTML form.
///
/// Requests with a JSON content type are parsed as JSON, everything else as
/// `application/x-www-form-urlencoded`, so a plain browser form and an API
/// client can use the same endpoint. The value is then checked with the
/// `validator` crate; failures become a 422 with field-level details.
pub struct FormOrJson<T>(pub T);

fn is_json(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime == "application/json" || mime.ends_with("+json")
        })
}

#[async_trait]
impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value = if is_json(&req) {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")))?;
            value
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid form: {e}")))?;
            value
        };

        value.validate().map_err(ApiError::from_validation_errors)?;

        Ok(FormOrJson(value))
    }
}

// ============================================================================
// Custom Validators
// ============================================================================

/// Validate that a single-line value has no control characters at all.
pub fn no_control_chars(value: &str) -> Result<(), validator::ValidationError> {
    if value.chars().any(char::is_control) {
        return Err(validator::ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

/// Validate that a string is not empty after trimming whitespace.
pub fn not_empty_trimmed(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("not_empty_trimmed")
            .with_message("Must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate, PartialEq)]
    struct Payload {
        #[validate(custom(function = "not_empty_trimmed"))]
        name: String,
    }

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<Payload, ApiError> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        let req = builder.body(Body::from(body)).unwrap();
        FormOrJson::<Payload>::from_request(req, &())
            .await
            .map(|FormOrJson(p)| p)
    }

    #[tokio::test]
    async fn test_json_body() {
        let payload = extract(Some("application/json; charset=utf-8"), r#"{"name":"ci"}"#)
            .await
            .unwrap();
        assert_eq!(payload.name, "ci");
    }

    #[tokio::test]
    async fn test_form_body() {
        let payload = extract(Some("application/x-www-form-urlencoded"), "name=ci%2Fbot")
            .await
            .unwrap();
        assert_eq!(payload.name, "ci/bot");
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let err = extract(Some("application/json"), "{").await.unwrap_err();
        assert!(err.message().starts_with("Invalid JSON"));
    }

    #[tokio::test]
    async fn test_validation_failure_has_details() {
        let err = extract(Some("application/json"), r#"{"name":"  "}"#)
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::web::error::ErrorCode::ValidationError);
        assert_eq!(
            err.details().and_then(|d| d.get("name")),
            Some(&vec!["Must not be empty".to_string()])
        );
    }

    #[test]
    fn test_no_control_chars() {
        assert!(no_control_chars("/admin?tab=1").is_ok());
        assert!(no_control_chars("/ok\nX-Evil: 1").is_err());
        assert!(no_control_chars("/ok\r").is_err());
        assert!(no_control_chars("tab\there").is_err());
        assert!(no_control_chars("nul\x00").is_err());
    }

    #[test]
    fn test_not_empty_trimmed() {
        assert!(not_empty_trimmed("  Hello  ").is_ok());
        assert!(not_empty_trimmed("").is_err());
        assert!(not_empty_trimmed("\t\n").is_err());
    }
}
