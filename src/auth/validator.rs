//! Credential validation.
//!
//! A [`CredentialValidator`] answers two questions about a claimed identity:
//! does it own that identity, and does a secret match it.
//! [`CombinedCredentialValidator`] stacks several validators and hands each
//! lookup to the first one that owns the identity.

use std::sync::Arc;

use uuid::Uuid;

/// A claimed identity, either by name or by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRef<'a> {
    /// Lookup by unique name.
    Name(&'a str),
    /// Lookup by id.
    Id(Uuid),
}

impl<'a> UserRef<'a> {
    /// Interpret a username typed by a client.
    ///
    /// Anything that parses as a UUID is treated as an id, everything else
    /// as a name.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse::auth::UserRef;
    ///
    /// assert!(matches!(UserRef::parse("alice"), UserRef::Name("alice")));
    /// assert!(matches!(
    ///     UserRef::parse("6f1c2d1e-8a5b-4a8e-9a57-1f5b0c3a2d10"),
    ///     UserRef::Id(_)
    /// ));
    /// ```
    pub fn parse(input: &'a str) -> Self {
        match Uuid::parse_str(input) {
            Ok(id) => UserRef::Id(id),
            Err(_) => UserRef::Name(input),
        }
    }
}

/// Identity returned by a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUser {
    /// User id.
    pub id: Uuid,
    /// Name the validator knows this user by, if any.
    pub name: Option<String>,
}

/// Capability to check secrets for identities.
pub trait CredentialValidator: Send + Sync {
    /// Whether this validator owns the identity.
    fn has_user(&self, user: UserRef<'_>) -> bool;

    /// Validate a secret, returning the identity on success.
    fn validate_credential(&self, user: UserRef<'_>, secret: &str) -> Option<ValidatedUser>;
}

impl<T: CredentialValidator + ?Sized> CredentialValidator for Arc<T> {
    fn has_user(&self, user: UserRef<'_>) -> bool {
        (**self).has_user(user)
    }

    fn validate_credential(&self, user: UserRef<'_>, secret: &str) -> Option<ValidatedUser> {
        (**self).validate_credential(user, secret)
    }
}

/// Ordered stack of validators.
///
/// Ownership of an identity is exclusive: the first validator reporting
/// `has_user` decides, later ones are never consulted for that lookup. A
/// name present in two validators resolves to the earlier one.
#[derive(Default, Clone)]
pub struct CombinedCredentialValidator {
    validators: Vec<Arc<dyn CredentialValidator>>,
}

impl CombinedCredentialValidator {
    /// Create an empty combined validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator with the lowest priority so far.
    pub fn add(&mut self, validator: Arc<dyn CredentialValidator>) -> &mut Self {
        self.validators.push(validator);
        self
    }

    /// Builder-style variant of [`Self::add`].
    pub fn with(mut self, validator: Arc<dyn CredentialValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether no validator was added.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    fn owner(&self, user: UserRef<'_>) -> Option<&Arc<dyn CredentialValidator>> {
        self.validators.iter().find(|v| v.has_user(user))
    }
}

impl CredentialValidator for CombinedCredentialValidator {
    fn has_user(&self, user: UserRef<'_>) -> bool {
        self.owner(user).is_some()
    }

    fn validate_credential(&self, user: UserRef<'_>, secret: &str) -> Option<ValidatedUser> {
        self.owner(user)?.validate_credential(user, secret)
    }
}
