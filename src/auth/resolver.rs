//! Permission resolution.
//!
//! The permission-group membership store belongs to the host application.
//! Gatehouse only consumes it through [`PermissionResolver`], which is
//! injected into every [`Principal`](super::Principal) instead of being
//! looked up from a process-wide singleton.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::PermissionsConfig;
use crate::{GatehouseError, Result};

/// Capability for answering permission questions about a user.
pub trait PermissionResolver: Send + Sync {
    /// Check whether `user_id` holds `permission`, falling back to `default`
    /// when no rule decides.
    fn has_permission(&self, user_id: Uuid, permission: &str, default: bool) -> bool;

    /// Permission nodes granted to a group.
    fn group_permission_nodes(&self, group: &str) -> HashSet<String>;
}

/// Check whether a single node covers a permission.
///
/// `*` covers everything and `a.b.*` covers every permission below `a.b.`.
fn node_matches(node: &str, permission: &str) -> bool {
    if node == "*" || node == permission {
        return true;
    }

    match node.strip_suffix('*') {
        Some(prefix) if prefix.ends_with('.') => permission.starts_with(prefix),
        _ => false,
    }
}

/// Evaluate a set of permission nodes against a permission.
///
/// Returns `Some(false)` if a negated node (`-node`) matches, `Some(true)` if
/// a granting node matches, and `None` if the set says nothing about it.
/// Negation wins over any grant in the same set.
///
/// # Examples
///
/// ```
/// use gatehouse::auth::evaluate_nodes;
///
/// let nodes = ["web.*".to_string(), "-web.admin".to_string()];
/// assert_eq!(evaluate_nodes(&nodes, "web.read"), Some(true));
/// assert_eq!(evaluate_nodes(&nodes, "web.admin"), Some(false));
/// assert_eq!(evaluate_nodes(&nodes, "chat.read"), None);
/// ```
pub fn evaluate_nodes<'a, I>(nodes: I, permission: &str) -> Option<bool>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut granted = false;

    for node in nodes {
        if let Some(negated) = node.strip_prefix('-') {
            if node_matches(negated, permission) {
                return Some(false);
            }
        } else if node_matches(node, permission) {
            granted = true;
        }
    }

    granted.then_some(true)
}

#[derive(Debug, Default)]
struct ResolverTables {
    groups: HashMap<String, HashSet<String>>,
    user_permissions: HashMap<Uuid, HashSet<String>>,
    user_groups: HashMap<Uuid, HashSet<String>>,
}

/// In-memory permission resolver.
///
/// Used by the bundled binary (populated from the `[permissions]` config
/// section) and by tests. Direct user permissions are consulted before
/// group-derived ones.
#[derive(Debug, Default)]
pub struct StaticPermissionResolver {
    tables: RwLock<ResolverTables>,
}

impl StaticPermissionResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a resolver from the `[permissions]` config section.
    pub fn from_config(config: &PermissionsConfig) -> Result<Self> {
        let resolver = Self::new();

        for (group, nodes) in &config.groups {
            resolver.set_group_nodes(group, nodes.iter().cloned());
        }

        for (user, entry) in &config.users {
            let id = Uuid::parse_str(user).map_err(|e| {
                GatehouseError::Config(format!("invalid user id '{user}' in permissions: {e}"))
            })?;
            for group in &entry.groups {
                resolver.add_user_to_group(id, group);
            }
            resolver.add_user_permissions(id, entry.permissions.iter().cloned());
        }

        Ok(resolver)
    }

    /// Builder-style variant of [`Self::set_group_nodes`].
    pub fn with_group<I, S>(self, group: &str, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_group_nodes(group, nodes);
        self
    }

    /// Builder-style variant of [`Self::add_user_permissions`].
    pub fn with_user_permissions<I, S>(self, user_id: Uuid, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_user_permissions(user_id, permissions);
        self
    }

    /// Replace the nodes of a group.
    pub fn set_group_nodes<I, S>(&self, group: &str, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes = nodes.into_iter().map(Into::into).collect();
        self.tables.write().groups.insert(group.to_string(), nodes);
    }

    /// Grant permissions directly to a user.
    pub fn add_user_permissions<I, S>(&self, user_id: Uuid, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .write()
            .user_permissions
            .entry(user_id)
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
    }

    /// Add a user to a group.
    pub fn add_user_to_group(&self, user_id: Uuid, group: &str) {
        self.tables
            .write()
            .user_groups
            .entry(user_id)
            .or_default()
            .insert(group.to_string());
    }

    /// Drop every grant and group membership of a user.
    pub fn remove_user(&self, user_id: Uuid) {
        let mut tables = self.tables.write();
        tables.user_permissions.remove(&user_id);
        tables.user_groups.remove(&user_id);
    }

    /// Groups a user belongs to.
    pub fn groups_for_user(&self, user_id: Uuid) -> HashSet<String> {
        self.tables
            .read()
            .user_groups
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl PermissionResolver for StaticPermissionResolver {
    fn has_permission(&self, user_id: Uuid, permission: &str, default: bool) -> bool {
        let tables = self.tables.read();

        if let Some(decision) = tables
            .user_permissions
            .get(&user_id)
            .and_then(|nodes| evaluate_nodes(nodes, permission))
        {
            return decision;
        }

        let group_nodes = tables
            .user_groups
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|group| tables.groups.get(group))
            .flatten();

        evaluate_nodes(group_nodes, permission).unwrap_or(default)
    }

    fn group_permission_nodes(&self, group: &str) -> HashSet<String> {
        self.tables
            .read()
            .groups
            .get(group)
            .cloned()
            .unwrap_or_default()
    }
}
