//! Request principals.
//!
//! A principal is the identity attached to a request after authentication.
//! Every request ends up with one: either an authenticated user or the
//! anonymous principal with the all-zero id.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::resolver::{evaluate_nodes, PermissionResolver};

/// Reserved id of the anonymous identity.
pub const ANONYMOUS_ID: Uuid = Uuid::nil();

/// Permission group whose nodes apply to anonymous requests.
pub const ANONYMOUS_GROUP: &str = "ANONYMOUS";

/// Something that can be asked for permissions.
pub trait PermissionHolder: Send + Sync {
    /// Check a permission, using `default` when nothing decides.
    fn has_permission_or(&self, permission: &str, default: bool) -> bool;

    /// Check a permission, denying when nothing decides.
    fn has_permission(&self, permission: &str) -> bool {
        self.has_permission_or(permission, false)
    }

    /// Whether this holder is the anonymous identity.
    fn is_anonymous(&self) -> bool {
        false
    }
}

/// Identity attached to a request by an authentication provider.
///
/// Custom providers may attach identities that cannot be evaluated for
/// permissions at all; enforcement rejects those with 403.
pub trait RequestPrincipal: Send + Sync + fmt::Debug {
    /// Stable name of the identity.
    fn name(&self) -> String;

    /// User id, for identities that map to a stored user.
    fn user_id(&self) -> Option<Uuid> {
        None
    }

    /// Human readable name, if the provider knows one.
    fn display_name(&self) -> Option<&str> {
        None
    }

    /// Permission view of this identity, if it has one.
    fn as_permission_holder(&self) -> Option<&dyn PermissionHolder> {
        None
    }
}

/// Shared handle stored in request extensions.
pub type SharedPrincipal = Arc<dyn RequestPrincipal>;

/// A user identity backed by a [`PermissionResolver`].
#[derive(Clone)]
pub struct Principal {
    id: Uuid,
    display_name: Option<String>,
    resolver: Arc<dyn PermissionResolver>,
}

impl Principal {
    /// Create a principal for a user id.
    pub fn new(
        id: Uuid,
        display_name: Option<String>,
        resolver: Arc<dyn PermissionResolver>,
    ) -> Self {
        Self {
            id,
            display_name,
            resolver,
        }
    }

    /// Create the anonymous principal.
    pub fn anonymous(resolver: Arc<dyn PermissionResolver>) -> Self {
        Self::new(ANONYMOUS_ID, None, resolver)
    }

    /// User id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Display name, if known.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Whether this is the anonymous identity. Depends on the id only.
    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_ID
    }

    /// Wrap into the shared handle stored on requests.
    pub fn into_shared(self) -> SharedPrincipal {
        Arc::new(self)
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

impl PermissionHolder for Principal {
    fn has_permission_or(&self, permission: &str, default: bool) -> bool {
        if self.is_anonymous() {
            // Anonymous identities have no individual grants.
            let nodes = self.resolver.group_permission_nodes(ANONYMOUS_GROUP);
            return evaluate_nodes(&nodes, permission).unwrap_or(default);
        }

        self.resolver.has_permission(self.id, permission, default)
    }

    fn is_anonymous(&self) -> bool {
        Principal::is_anonymous(self)
    }
}

impl RequestPrincipal for Principal {
    fn name(&self) -> String {
        self.id.to_string()
    }

    fn user_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    fn as_permission_holder(&self) -> Option<&dyn PermissionHolder> {
        Some(self)
    }
}
