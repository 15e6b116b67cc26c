//! Authentication and authorization core for Gatehouse.
//!
//! This module provides secret hashing, the persistent password stores,
//! credential validation, login codes, principals and permission checks.
//! Nothing in here knows about HTTP; see [`crate::web`] for that.

mod login_code;
mod password;
mod permission;
mod principal;
mod resolver;
mod service_account;
mod store;
mod validator;

pub use login_code::{LoginCodeEntry, LoginCodeStore, LOGIN_CODE_VALIDITY_SECS};
pub use password::{
    hash_secret, is_bcrypt_hash, validate_password, verify_secret, PasswordError, HASH_COST,
    MIN_PASSWORD_LENGTH,
};
pub use permission::{check_permissions, PermissionError, PermissionMode, PermissionRequirement};
pub use principal::{
    PermissionHolder, Principal, RequestPrincipal, SharedPrincipal, ANONYMOUS_GROUP, ANONYMOUS_ID,
};
pub use resolver::{evaluate_nodes, PermissionResolver, StaticPermissionResolver};
pub use service_account::{
    normalize_service_account_name, ProvisionedAccount, ProvisioningReport, ServiceAccount,
    ServiceAccountError, ServiceAccountManager, PROVISIONING_SUFFIX, SERVICE_ACCOUNT_GROUP,
    SERVICE_ACCOUNT_PREFIX,
};
pub use store::{JsonFile, MemoryBackend, PasswordStore, StorageBackend, StoreError};
pub use validator::{CombinedCredentialValidator, CredentialValidator, UserRef, ValidatedUser};
