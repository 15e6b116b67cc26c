//! Permission checking for Gatehouse.
//!
//! Both enforcement points (the path-scoped filter and the per-operation
//! table in `web::middleware::permission`) go through
//! [`check_permissions`], which tells "not authenticated" apart from
//! "authenticated but not allowed".

use thiserror::Error;

use super::principal::{PermissionHolder, RequestPrincipal};

/// Permission-related errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionError {
    /// No identity, or the anonymous identity lacks the permission.
    #[error("authentication required")]
    NotAuthenticated,

    /// An authenticated identity lacks the permission.
    #[error("insufficient permissions")]
    Forbidden,
}

/// How a list of permissions is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionMode {
    /// Every permission must be held.
    #[default]
    All,
    /// At least one permission must be held. An empty list is satisfied.
    Any,
}

/// A declared permission requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequirement {
    mode: PermissionMode,
    permissions: Vec<String>,
}

impl PermissionRequirement {
    /// Create a requirement.
    pub fn new<I, S>(mode: PermissionMode, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode,
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// Require every listed permission.
    pub fn all<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PermissionMode::All, permissions)
    }

    /// Require at least one listed permission.
    pub fn any<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PermissionMode::Any, permissions)
    }

    /// Evaluation mode.
    pub fn mode(&self) -> PermissionMode {
        self.mode
    }

    /// Listed permissions.
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    /// Evaluate against a holder.
    ///
    /// `All` stops at the first missing permission, `Any` at the first held
    /// one.
    pub fn is_satisfied_by(&self, holder: &dyn PermissionHolder) -> bool {
        match self.mode {
            PermissionMode::All => self.permissions.iter().all(|p| holder.has_permission(p)),
            PermissionMode::Any => {
                self.permissions.is_empty()
                    || self.permissions.iter().any(|p| holder.has_permission(p))
            }
        }
    }
}

/// Check a principal against a set of requirements, all of which must hold.
///
/// An empty set of requirements allows every request, attached principal
/// or not. Otherwise:
///
/// 1. no principal is `NotAuthenticated`;
/// 2. a principal that cannot be evaluated for permissions is `Forbidden`;
/// 3. a failed requirement is `NotAuthenticated` for the anonymous identity
///    and `Forbidden` for everyone else.
///
/// # Examples
///
/// ```
/// use gatehouse::auth::{check_permissions, PermissionError, PermissionRequirement};
///
/// let required = [PermissionRequirement::all(["web.read"])];
/// assert_eq!(
///     check_permissions(None, &required),
///     Err(PermissionError::NotAuthenticated)
/// );
/// assert!(check_permissions(None, &[]).is_ok());
/// ```
pub fn check_permissions(
    principal: Option<&dyn RequestPrincipal>,
    requirements: &[PermissionRequirement],
) -> Result<(), PermissionError> {
    if requirements.is_empty() {
        return Ok(());
    }

    let principal = principal.ok_or(PermissionError::NotAuthenticated)?;
    let holder = principal
        .as_permission_holder()
        .ok_or(PermissionError::Forbidden)?;

    if requirements.iter().all(|r| r.is_satisfied_by(holder)) {
        return Ok(());
    }

    if holder.is_anonymous() {
        Err(PermissionError::NotAuthenticated)
    } else {
        Err(PermissionError::Forbidden)
    }
}
