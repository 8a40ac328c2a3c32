mod array;
mod database;
mod rule;
mod simple;

pub mod config;
pub mod factory;
pub mod query;
pub mod resource;
pub mod union;

use std::collections::BTreeSet;

use thiserror::Error;

pub use array::{ArrayAdapter, KeyPair};
pub use database::DatabaseAdapter;
pub use query::{GroupQuery, GroupsPage};
pub use resource::Resource;
pub use rule::{is_authorized, AccessRule, GroupTable, NewAccessRule, RuleResources, RuleUsers};
pub use simple::SimpleArrayAdapter;
pub use union::UnionAccessControl;

/// Errors raised by access-control adapters.
///
/// Everything except [`AclError::Store`] describes a condition the caller can
/// act on (not found, conflict, bad input). `Store` wraps a failure of the
/// underlying storage and must be treated as a system error.
#[derive(Debug, Error)]
pub enum AclError {
    #[error("public key '{0}' already has a key pair")]
    KeyPairExists(String),

    #[error("public key '{0}' not found")]
    PublicKeyNotFound(String),

    #[error("access rule {1} not found for public key '{0}'")]
    AccessRuleNotFound(String, u64),

    #[error("resource group '{0}' already exists")]
    GroupExists(String),

    #[error("resource group '{0}' not found")]
    GroupNotFound(String),

    #[error("invalid key pair: {0}")]
    InvalidKeyPair(String),

    #[error("invalid access rule: {0}")]
    InvalidRule(String),

    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("access control adapter is immutable")]
    Immutable,

    #[error("access control store: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// A named, reusable set of resources that access rules can reference.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Group {
    pub name: String,
    pub resources: BTreeSet<Resource>,
}

/// Read side of an access-control backend.
///
/// Implementations must be safe for concurrent evaluation, and each
/// `has_access` call must observe one consistent snapshot of keys, rules and
/// groups. Lookup misses deny; they never grant and never surface as errors.
pub trait AccessControl: Send + Sync {
    /// Returns true iff the public key exists and at least one of its rules
    /// covers `resource` for `user`. When `user` is `None` the public key
    /// itself is the user being acted upon.
    fn has_access(
        &self,
        public_key: &str,
        resource: Resource,
        user: Option<&str>,
    ) -> Result<bool, AclError>;

    fn get_private_key(&self, public_key: &str) -> Result<Option<String>, AclError>;

    fn public_key_exists(&self, public_key: &str) -> Result<bool, AclError>;

    /// Rules attached to a public key, ordered by id. Unknown keys yield
    /// [`AclError::PublicKeyNotFound`].
    fn get_access_list(&self, public_key: &str) -> Result<Vec<AccessRule>, AclError>;

    /// One rule of a public key. Unknown keys yield
    /// [`AclError::PublicKeyNotFound`].
    fn get_access_rule(&self, public_key: &str, id: u64) -> Result<Option<AccessRule>, AclError>;

    fn get_groups(&self, query: &GroupQuery) -> Result<GroupsPage, AclError>;

    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>, AclError>;

    fn group_exists(&self, name: &str) -> Result<bool, AclError> {
        Ok(self.get_group(name)?.is_some())
    }
}

/// Write side of an access-control backend, used by administrative resources
/// and provisioning, never by the authorization path.
pub trait MutableAccessControl: AccessControl {
    /// Registers a new key pair. A public key can never hold more than one
    /// private key, so an existing key fails with [`AclError::KeyPairExists`].
    fn add_key_pair(&self, public_key: &str, private_key: &str) -> Result<(), AclError>;

    /// Deletes a public key together with every rule attached to it.
    fn delete_public_key(&self, public_key: &str) -> Result<(), AclError>;

    /// Attaches a rule to a public key and returns the new rule id.
    fn add_access_rule(&self, public_key: &str, rule: NewAccessRule) -> Result<u64, AclError>;

    /// Attaches all rules or none of them, returning the new ids in order.
    fn add_access_rules(
        &self,
        public_key: &str,
        rules: Vec<NewAccessRule>,
    ) -> Result<Vec<u64>, AclError>;

    fn delete_access_rule(&self, public_key: &str, id: u64) -> Result<(), AclError>;

    fn add_resource_group(
        &self,
        name: &str,
        resources: &BTreeSet<Resource>,
    ) -> Result<(), AclError>;

    fn update_resource_group(
        &self,
        name: &str,
        resources: &BTreeSet<Resource>,
    ) -> Result<(), AclError>;

    fn delete_resource_group(&self, name: &str) -> Result<(), AclError>;
}

/// Checks a group definition before it is stored.
fn validate_group(name: &str, resources: &BTreeSet<Resource>) -> Result<(), AclError> {
    if name.is_empty() {
        return Err(AclError::InvalidRule(String::from(
            "resource group name cannot be empty",
        )));
    }
    if resources.is_empty() {
        return Err(AclError::InvalidRule(format!(
            "resource group '{name}' has no resources"
        )));
    }
    Ok(())
}

/// Checks a key pair before it is stored.
fn validate_key_pair(public_key: &str, private_key: &str) -> Result<(), AclError> {
    if public_key.is_empty() {
        return Err(AclError::InvalidKeyPair(String::from(
            "public key cannot be empty",
        )));
    }
    if private_key.is_empty() {
        return Err(AclError::InvalidKeyPair(format!(
            "private key for '{public_key}' cannot be empty"
        )));
    }
    Ok(())
}
