//! JSON file backed password store.
//!
//! The store keeps two tables in memory, `name -> id` and `id -> bcrypt
//! hash`, and mirrors them to a JSON document:
//!
//! ```json
//! {
//!   "users": { "alice": "6f1c2d1e-8a5b-4a8e-9a57-1f5b0c3a2d10" },
//!   "credentials": { "6f1c2d1e-8a5b-4a8e-9a57-1f5b0c3a2d10": "$2b$10$..." }
//! }
//! ```
//!
//! Every mutation is applied and persisted under the table write lock. If
//! persisting fails the tables are restored before the lock is released, so
//! readers never observe state that is not on disk.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::password::{hash_secret, is_bcrypt_hash, verify_secret, PasswordError};
use super::validator::{CredentialValidator, UserRef, ValidatedUser};

/// Credential store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A secret passed as already hashed is not a bcrypt hash.
    #[error("credential is not a bcrypt hash")]
    InvalidCredentialFormat,

    /// Reading or writing durable storage failed.
    #[error("credential storage I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The stored document could not be parsed.
    #[error("credential store is corrupt: {0}")]
    Corrupt(String),

    /// Hashing a raw secret failed.
    #[error(transparent)]
    Hash(#[from] PasswordError),
}

/// Durable storage for the serialized store document.
pub trait StorageBackend: Send + Sync {
    /// Read the document, `None` if it does not exist yet.
    fn read(&self) -> io::Result<Option<String>>;

    /// Replace the document.
    fn write(&self, contents: &str) -> io::Result<()>;

    /// Human readable location, for logs.
    fn location(&self) -> String;
}

/// A JSON document on the local filesystem.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    /// Create a backend for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }
}

impl StorageBackend for JsonFile {
    fn read(&self) -> io::Result<Option<String>> {
        self.ensure_parent()?;
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        self.ensure_parent()?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Volatile backend keeping the document in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    contents: Mutex<Option<String>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-seeded with a document.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
        }
    }

    /// Current document, if written.
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self) -> io::Result<Option<String>> {
        Ok(self.contents.lock().clone())
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        *self.contents.lock() = Some(contents.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// On-disk shape of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    users: BTreeMap<String, String>,
    #[serde(default)]
    credentials: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone)]
struct CredentialTables {
    names: HashMap<String, Uuid>,
    secrets: HashMap<Uuid, String>,
}

impl CredentialTables {
    fn name_of(&self, id: Uuid) -> Option<&String> {
        self.names
            .iter()
            .find(|(_, owner)| **owner == id)
            .map(|(name, _)| name)
    }

    fn resolve(&self, user: UserRef<'_>) -> Option<Uuid> {
        match user {
            UserRef::Name(name) => self.names.get(name).copied(),
            UserRef::Id(id) => Some(id),
        }
    }

    fn to_document(&self) -> StoreDocument {
        StoreDocument {
            users: self
                .names
                .iter()
                .map(|(name, id)| (name.clone(), id.to_string()))
                .collect(),
            credentials: self
                .secrets
                .iter()
                .map(|(id, hash)| (id.to_string(), hash.clone()))
                .collect(),
        }
    }
}

/// Persistent password store.
///
/// Cloneable handles are obtained by wrapping the store in an `Arc`.
pub struct PasswordStore {
    backend: Box<dyn StorageBackend>,
    tables: RwLock<CredentialTables>,
}

impl PasswordStore {
    /// Create an empty, unloaded store on top of a backend.
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            tables: RwLock::new(CredentialTables::default()),
        }
    }

    /// Open and load a store from a JSON file.
    ///
    /// A missing file is an empty store; the parent directory is created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(JsonFile::new(path));
        store.load()?;
        Ok(store)
    }

    /// Load the store from its backend, replacing in-memory state.
    ///
    /// Secrets that are not bcrypt hashes are treated as legacy plaintext:
    /// they are hashed and the migrated document is written back once,
    /// before this returns.
    pub fn load(&self) -> Result<(), StoreError> {
        let Some(contents) = self.backend.read()? else {
            debug!(location = %self.backend.location(), "No credential store yet, starting empty");
            *self.tables.write() = CredentialTables::default();
            return Ok(());
        };

        let document: StoreDocument =
            serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let mut loaded = CredentialTables::default();
        for (name, id) in document.users {
            let id = Uuid::parse_str(&id)
                .map_err(|e| StoreError::Corrupt(format!("user '{name}': {e}")))?;
            loaded.names.insert(name, id);
        }

        let mut migrated = 0usize;
        for (id, secret) in document.credentials {
            let id = Uuid::parse_str(&id)
                .map_err(|e| StoreError::Corrupt(format!("credential key '{id}': {e}")))?;
            let hash = if is_bcrypt_hash(&secret) {
                secret
            } else {
                migrated += 1;
                hash_secret(&secret)?
            };
            loaded.secrets.insert(id, hash);
        }

        // The migrated document must be durable before it becomes visible.
        if migrated > 0 {
            self.persist(&loaded)?;
            info!(
                location = %self.backend.location(),
                count = migrated,
                "Migrated plaintext credentials to bcrypt"
            );
        }

        let users = loaded.secrets.len();
        *self.tables.write() = loaded;

        info!(
            location = %self.backend.location(),
            users,
            "Credential store loaded"
        );
        Ok(())
    }

    /// Hash a raw secret and store it.
    pub fn set_credential(
        &self,
        id: Uuid,
        name: Option<&str>,
        secret: &str,
    ) -> Result<(), StoreError> {
        let hash = hash_secret(secret)?;
        self.import_credential(id, name, &hash)
    }

    /// Store an already hashed secret.
    ///
    /// The hash must be in bcrypt format; anything else is rejected before
    /// the store is touched. When `name` is given it now points to `id`, and
    /// any other name that pointed to `id` is dropped.
    pub fn import_credential(
        &self,
        id: Uuid,
        name: Option<&str>,
        secret_hash: &str,
    ) -> Result<(), StoreError> {
        if !is_bcrypt_hash(secret_hash) {
            return Err(StoreError::InvalidCredentialFormat);
        }

        self.mutate(|tables| {
            tables.secrets.insert(id, secret_hash.to_string());
            if let Some(name) = name {
                tables.names.retain(|existing, owner| *owner != id || existing == name);
                tables.names.insert(name.to_string(), id);
            }
        })?;

        debug!(user_id = %id, name = ?name, "Credential stored");
        Ok(())
    }

    /// Delete a credential by name or id.
    ///
    /// Both the name mapping and the hash are removed. Returns the id that
    /// was removed, or `None` if nothing matched (in which case nothing is
    /// written).
    pub fn delete_credential(&self, user: UserRef<'_>) -> Result<Option<Uuid>, StoreError> {
        let removed = self.mutate(|tables| {
            let id = tables.resolve(user)?;
            let had_secret = tables.secrets.remove(&id).is_some();
            let names_before = tables.names.len();
            tables.names.retain(|_, owner| *owner != id);

            (had_secret || tables.names.len() != names_before).then_some(id)
        })?;

        if let Some(id) = removed {
            debug!(user_id = %id, "Credential deleted");
        }
        Ok(removed)
    }

    /// Apply a mutation and persist it, restoring the previous tables if the
    /// write fails. A mutation returning `None` made no change and is not
    /// persisted.
    fn mutate<T, F>(&self, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut CredentialTables) -> T,
        T: MutationOutcome,
    {
        let mut tables = self.tables.write();
        let snapshot = tables.clone();

        let outcome = apply(&mut tables);
        if !outcome.changed() {
            return Ok(outcome);
        }

        if let Err(e) = self.persist(&tables) {
            *tables = snapshot;
            error!(
                location = %self.backend.location(),
                error = %e,
                "Failed to persist credential store, changes rolled back"
            );
            return Err(e);
        }

        Ok(outcome)
    }

    fn persist(&self, tables: &CredentialTables) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&tables.to_document())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.backend.write(&json)?;
        Ok(())
    }

    /// All ids with a stored credential, sorted.
    pub fn list_users(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.tables.read().secrets.keys().copied().collect();
        ids.sort();
        ids
    }

    /// All stored accounts with their names, sorted by id.
    pub fn list_accounts(&self) -> Vec<(Uuid, Option<String>)> {
        let tables = self.tables.read();
        let mut accounts: Vec<_> = tables
            .secrets
            .keys()
            .map(|id| (*id, tables.name_of(*id).cloned()))
            .collect();
        accounts.sort_by_key(|(id, _)| *id);
        accounts
    }

    /// Resolve a name to its id.
    pub fn get_id_by_name(&self, name: &str) -> Option<Uuid> {
        self.tables.read().names.get(name).copied()
    }

    /// Resolve an id to its name. Linear in the number of names.
    pub fn get_name_by_id(&self, id: Uuid) -> Option<String> {
        self.tables.read().name_of(id).cloned()
    }

    /// Location of the backing document.
    pub fn location(&self) -> String {
        self.backend.location()
    }
}

/// Whether a mutation changed anything worth persisting.
trait MutationOutcome {
    fn changed(&self) -> bool;
}

impl MutationOutcome for () {
    fn changed(&self) -> bool {
        true
    }
}

impl MutationOutcome for Option<Uuid> {
    fn changed(&self) -> bool {
        self.is_some()
    }
}

impl CredentialValidator for PasswordStore {
    fn has_user(&self, user: UserRef<'_>) -> bool {
        let tables = self.tables.read();
        tables
            .resolve(user)
            .is_some_and(|id| tables.secrets.contains_key(&id))
    }

    fn validate_credential(&self, user: UserRef<'_>, secret: &str) -> Option<ValidatedUser> {
        // Verification is slow by design of bcrypt, so it runs outside the lock.
        let (id, hash, name) = {
            let tables = self.tables.read();
            let id = tables.resolve(user)?;
            let hash = tables.secrets.get(&id)?.clone();
            (id, hash, tables.name_of(id).cloned())
        };

        verify_secret(secret, &hash).ok()?;
        Some(ValidatedUser { id, name })
    }
}
