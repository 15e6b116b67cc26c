//! Short-lived, single-use login codes.
//!
//! A code is issued out of band (for example by an in-game command) for a
//! known user and typed into the login form within five minutes. Reading a
//! code consumes it whether or not it is still valid.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

/// How long a code stays valid after creation.
pub const LOGIN_CODE_VALIDITY_SECS: i64 = 5 * 60;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_GROUP_LEN: usize = 4;

/// A pending login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCodeEntry {
    /// When the code stops being accepted.
    pub expires_at: DateTime<Utc>,
    /// User the code logs in as.
    pub user_id: Uuid,
    /// Display name to attach to the session.
    pub display_name: String,
}

impl LoginCodeEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Store of pending login codes.
///
/// Lookups go straight to a concurrent map. Creation is serialized so that
/// the "one live code per user" cleanup cannot race with itself.
#[derive(Debug)]
pub struct LoginCodeStore {
    entries: DashMap<String, LoginCodeEntry>,
    create_lock: Mutex<()>,
    validity: TimeDelta,
}

impl Default for LoginCodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginCodeStore {
    /// Create a store with the standard five minute validity.
    pub fn new() -> Self {
        Self::with_validity(TimeDelta::seconds(LOGIN_CODE_VALIDITY_SECS))
    }

    /// Create a store with a custom validity window.
    pub fn with_validity(validity: TimeDelta) -> Self {
        Self {
            entries: DashMap::new(),
            create_lock: Mutex::new(()),
            validity,
        }
    }

    /// Issue a new code for a user.
    ///
    /// Any other code of the same user is revoked and expired codes are
    /// purged before the new one is stored.
    pub fn create_code(&self, user_id: Uuid, display_name: &str) -> String {
        let _guard = self.create_lock.lock();
        let now = Utc::now();

        self.entries
            .retain(|_, entry| !entry.is_expired(now) && entry.user_id != user_id);

        let code = loop {
            let candidate = generate_code();
            if !self.entries.contains_key(&candidate) {
                break candidate;
            }
        };

        self.entries.insert(
            code.clone(),
            LoginCodeEntry {
                expires_at: now + self.validity,
                user_id,
                display_name: display_name.to_string(),
            },
        );

        info!(user_id = %user_id, "Login code issued");
        code
    }

    /// Consume a code.
    ///
    /// The code is removed in every case. `None` is returned both for
    /// unknown and for expired codes.
    pub fn take_entry(&self, code: &str) -> Option<LoginCodeEntry> {
        let (_, entry) = self.entries.remove(code)?;
        if entry.is_expired(Utc::now()) {
            return None;
        }
        Some(entry)
    }

    /// Number of stored codes, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no code is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Generate a code of the form `XXXX-XXXX` from `A-Z0-9`.
fn generate_code() -> String {
    let mut rng = rand::rng();
    let mut code = String::with_capacity(CODE_GROUP_LEN * 2 + 1);

    for i in 0..CODE_GROUP_LEN * 2 {
        if i == CODE_GROUP_LEN {
            code.push('-');
        }
        let idx = rng.random_range(0..CODE_ALPHABET.len());
        code.push(CODE_ALPHABET[idx] as char);
    }

    code
}
