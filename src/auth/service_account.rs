//! Service accounts.
//!
//! Service accounts are machine identities kept in their own password store
//! and authenticated over HTTP Basic. Their names always carry the
//! `serviceaccount.` prefix. Accounts can also be provisioned declaratively
//! from `*.serviceaccount.json` files:
//!
//! ```json
//! {
//!   "Name": "ci",
//!   "Enabled": true,
//!   "PasswordHash": "$2b$10$...",
//!   "Groups": ["DEPLOY"],
//!   "Permissions": ["web.deploy"]
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::password::hash_secret;
use super::resolver::StaticPermissionResolver;
use super::store::{PasswordStore, StoreError};
use super::validator::UserRef;

/// Prefix every service account name carries.
pub const SERVICE_ACCOUNT_PREFIX: &str = "serviceaccount.";

/// Group every service account is added to.
pub const SERVICE_ACCOUNT_GROUP: &str = "SERVICE_ACCOUNT";

/// File name suffix of provisioning files.
pub const PROVISIONING_SUFFIX: &str = ".serviceaccount.json";

/// Service account errors.
#[derive(Error, Debug)]
pub enum ServiceAccountError {
    /// Underlying credential store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The name belongs to another account.
    #[error("service account already exists: {0}")]
    AlreadyExists(String),

    /// Provisioning directory could not be read.
    #[error("provisioning I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A provisioning file is malformed.
    #[error("invalid provisioning file {file}: {reason}")]
    InvalidFile {
        /// Offending file.
        file: PathBuf,
        /// What is wrong with it.
        reason: String,
    },
}

/// A stored service account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceAccount {
    /// Account id.
    pub id: Uuid,
    /// Prefixed account name.
    pub name: String,
}

/// Grants carried by a provisioned account, for the host's permission store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAccount {
    /// Account id (reused if the account existed before).
    pub id: Uuid,
    /// Prefixed account name.
    pub name: String,
    /// Groups to add the account to.
    pub groups: Vec<String>,
    /// Permissions to grant directly.
    pub permissions: Vec<String>,
}

/// Outcome of importing a provisioning directory.
#[derive(Debug, Default)]
pub struct ProvisioningReport {
    /// Accounts created or re-created.
    pub provisioned: Vec<ProvisionedAccount>,
    /// Ids whose previous account was removed.
    pub removed: Vec<Uuid>,
    /// Files that failed to import.
    pub failed: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProvisioningFile {
    name: String,
    enabled: bool,
    #[serde(default)]
    password_hash: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

/// Add the service account prefix if it is missing.
///
/// # Examples
///
/// ```
/// use gatehouse::auth::normalize_service_account_name;
///
/// assert_eq!(normalize_service_account_name("ci"), "serviceaccount.ci");
/// assert_eq!(normalize_service_account_name("serviceaccount.ci"), "serviceaccount.ci");
/// ```
pub fn normalize_service_account_name(name: &str) -> String {
    if name.starts_with(SERVICE_ACCOUNT_PREFIX) {
        name.to_string()
    } else {
        format!("{SERVICE_ACCOUNT_PREFIX}{name}")
    }
}

/// Manages service accounts on top of their password store.
pub struct ServiceAccountManager {
    store: Arc<PasswordStore>,
    resolver: Option<Arc<StaticPermissionResolver>>,
}

impl ServiceAccountManager {
    /// Create a manager over the service account store.
    pub fn new(store: Arc<PasswordStore>) -> Self {
        Self {
            store,
            resolver: None,
        }
    }

    /// Keep group memberships and grants in sync with a resolver.
    pub fn with_resolver(mut self, resolver: Arc<StaticPermissionResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<PasswordStore> {
        &self.store
    }

    /// Create an account with a raw secret and a fresh id.
    pub fn create(&self, name: &str, secret: &str) -> Result<ServiceAccount, ServiceAccountError> {
        let hash = hash_secret(secret).map_err(StoreError::from)?;
        self.create_with_hash(None, name, &hash)
    }

    /// Create an account from a bcrypt hash, reusing `id` if given.
    ///
    /// Fails if the name already belongs to a different account.
    pub fn create_with_hash(
        &self,
        id: Option<Uuid>,
        name: &str,
        secret_hash: &str,
    ) -> Result<ServiceAccount, ServiceAccountError> {
        let name = normalize_service_account_name(name);
        let id = id.unwrap_or_else(Uuid::new_v4);

        if self.store.get_id_by_name(&name).is_some_and(|owner| owner != id) {
            return Err(ServiceAccountError::AlreadyExists(name));
        }

        if let Err(e) = self.store.import_credential(id, Some(&name), secret_hash) {
            error!(name = %name, error = %e, "Failed to create service account credentials");
            return Err(e.into());
        }

        if let Some(resolver) = &self.resolver {
            resolver.add_user_to_group(id, SERVICE_ACCOUNT_GROUP);
        }

        info!(name = %name, user_id = %id, "Service account created");
        Ok(ServiceAccount { id, name })
    }

    /// Delete an account by name, returning its id if it existed.
    pub fn delete_by_name(&self, name: &str) -> Result<Option<Uuid>, ServiceAccountError> {
        let name = normalize_service_account_name(name);
        let removed = self.store.delete_credential(UserRef::Name(&name))?;

        if let Some(id) = removed {
            self.revoke_grants(id);
            info!(name = %name, user_id = %id, "Service account deleted");
        }
        Ok(removed)
    }

    /// Delete an account by id.
    pub fn delete(&self, id: Uuid) -> Result<bool, ServiceAccountError> {
        let removed = self.store.delete_credential(UserRef::Id(id))?.is_some();
        if removed {
            self.revoke_grants(id);
            info!(user_id = %id, "Service account deleted");
        }
        Ok(removed)
    }

    fn revoke_grants(&self, id: Uuid) {
        if let Some(resolver) = &self.resolver {
            resolver.remove_user(id);
        }
    }

    /// All named service accounts, sorted by name.
    pub fn list(&self) -> Vec<ServiceAccount> {
        let mut accounts: Vec<_> = self
            .store
            .list_accounts()
            .into_iter()
            .filter_map(|(id, name)| name.map(|name| ServiceAccount { id, name }))
            .collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        accounts
    }

    /// Import every `*.serviceaccount.json` file in a directory.
    ///
    /// The directory is created if missing. Each account named in a file is
    /// deleted first, so its grants are reset, and then re-created under
    /// the same id if the file marks it as enabled. Files that fail are
    /// logged and listed in the report; they do not stop the import.
    pub fn import_provisioning_dir(
        &self,
        dir: &Path,
    ) -> Result<ProvisioningReport, ServiceAccountError> {
        fs::create_dir_all(dir)?;

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(PROVISIONING_SUFFIX))
            })
            .collect();
        files.sort();

        let mut report = ProvisioningReport::default();
        for file in files {
            info!(file = %file.display(), "Importing service account file");
            match self.import_file(&file, &mut report) {
                Ok(()) => {}
                Err(e) => {
                    error!(file = %file.display(), error = %e, "Failed to import service account file");
                    report.failed.push(file);
                }
            }
        }

        Ok(report)
    }

    fn import_file(
        &self,
        file: &Path,
        report: &mut ProvisioningReport,
    ) -> Result<(), ServiceAccountError> {
        let invalid = |reason: String| ServiceAccountError::InvalidFile {
            file: file.to_path_buf(),
            reason,
        };

        let contents = fs::read_to_string(file)?;
        let parsed: ProvisioningFile =
            serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))?;

        let password_hash = match (parsed.enabled, parsed.password_hash.as_deref()) {
            (true, None) => return Err(invalid("enabled account has no PasswordHash".into())),
            (_, hash) => hash,
        };

        let previous = self.delete_by_name(&parsed.name)?;
        report.removed.extend(previous);

        let Some(password_hash) = password_hash.filter(|_| parsed.enabled) else {
            warn!(name = %parsed.name, "Service account disabled, not re-created");
            return Ok(());
        };

        let account = self.create_with_hash(previous, &parsed.name, password_hash)?;

        if let Some(resolver) = &self.resolver {
            for group in &parsed.groups {
                resolver.add_user_to_group(account.id, group);
            }
            resolver.add_user_permissions(account.id, parsed.permissions.iter().cloned());
        }

        report.provisioned.push(ProvisionedAccount {
            id: account.id,
            name: account.name,
            groups: parsed.groups,
            permissions: parsed.permissions,
        });
        Ok(())
    }
}
