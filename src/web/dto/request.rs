//! Request DTOs for the Gatehouse API.

use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::validation::{no_control_chars, not_empty_trimmed};
use crate::auth::validate_password;

/// How a login form authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    /// Consume a login code.
    Code,
    /// Username (or user id) and password.
    Password,
    /// Consume a login code and set a password at the same time.
    #[serde(alias = "passwordCreate")]
    PasswordCreate,
}

/// Login request, sent as a form or as JSON.
///
/// Which fields are required depends on `method`; that is checked as a
/// whole-struct rule and reported under `__all__`.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_login_fields", skip_on_field_errors = false))]
pub struct LoginRequest {
    /// Login method.
    pub method: LoginMethod,
    /// Login code (`code` and `password_create`).
    #[serde(default, alias = "loginCode")]
    #[validate(length(max = 32, message = "Login code is too long"))]
    pub login_code: Option<String>,
    /// Username or user id (`password`).
    #[serde(default)]
    #[validate(
        length(max = 128, message = "Username is too long"),
        custom(function = "no_control_chars")
    )]
    pub username: Option<String>,
    /// Password (`password` and `password_create`).
    #[serde(default)]
    #[validate(length(max = 256, message = "Password is too long"))]
    pub password: Option<String>,
    /// Where to go after logging in.
    #[serde(default)]
    #[validate(
        length(max = 2048, message = "Redirect URL is too long"),
        custom(function = "no_control_chars")
    )]
    pub redirect_url: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn validate_login_fields(req: &LoginRequest) -> Result<(), ValidationError> {
    let missing = || {
        ValidationError::new("missing_fields")
            .with_message("Missing required fields for this login method".into())
    };

    match req.method {
        LoginMethod::Code if !present(&req.login_code) => Err(missing()),
        LoginMethod::Password if !present(&req.username) || !present(&req.password) => {
            Err(missing())
        }
        LoginMethod::PasswordCreate => {
            if !present(&req.login_code) || !present(&req.password) {
                return Err(missing());
            }
            // The code must survive a rejected password, so this runs before
            // the handler consumes it.
            validate_password(req.password.as_deref().unwrap_or_default()).map_err(|e| {
                ValidationError::new("password_too_short").with_message(e.to_string().into())
            })
        }
        _ => Ok(()),
    }
}

impl LoginRequest {
    /// Login code, after validation.
    pub fn login_code(&self) -> &str {
        self.login_code.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Username, after validation.
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    /// Password, after validation.
    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or_default()
    }
}

/// Query of the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    /// Where to go after logging in.
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Service account creation request.
///
/// Exactly one of `password` and `password_hash` must be given.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_secret_choice", skip_on_field_errors = false))]
pub struct CreateServiceAccountRequest {
    /// Account name, with or without the `serviceaccount.` prefix.
    #[validate(
        length(max = 64, message = "Name must be at most 64 characters"),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub name: String,
    /// Raw secret to hash.
    #[serde(default)]
    #[validate(length(
        min = 8,
        max = 256,
        message = "Password must be between 8 and 256 characters"
    ))]
    pub password: Option<String>,
    /// Pre-computed bcrypt hash.
    #[serde(default)]
    pub password_hash: Option<String>,
}

fn validate_secret_choice(req: &CreateServiceAccountRequest) -> Result<(), ValidationError> {
    if req.password.is_some() == req.password_hash.is_some() {
        return Err(ValidationError::new("secret_choice")
            .with_message("Exactly one of password and password_hash is required".into()));
    }
    Ok(())
}
