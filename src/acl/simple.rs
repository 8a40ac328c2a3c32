use std::collections::BTreeSet;

use super::array::{ArrayAdapter, KeyPair};
use super::query::{GroupQuery, GroupsPage};
use super::resource::{read_write_resources, Resource};
use super::rule::{AccessRule, GroupTable, NewAccessRule};
use super::{AccessControl, AclError};

/// Static access control from plain `public key -> private key` pairs. Each
/// key may read and write its own images, metadata and short urls, nothing
/// else.
pub struct SimpleArrayAdapter {
    inner: ArrayAdapter,
}

impl SimpleArrayAdapter {
    pub fn new<I>(keys: I) -> Result<Self, AclError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut key_pairs = Vec::new();
        for (public_key, private_key) in keys {
            let rule = NewAccessRule::for_users(read_write_resources(), [public_key.clone()])?;
            key_pairs.push(KeyPair {
                public_key,
                private_key,
                rules: vec![rule],
            });
        }
        let inner = ArrayAdapter::new(key_pairs, GroupTable::new())?;
        Ok(Self { inner })
    }
}

impl AccessControl for SimpleArrayAdapter {
    fn has_access(
        &self,
        public_key: &str,
        resource: Resource,
        user: Option<&str>,
    ) -> Result<bool, AclError> {
        self.inner.has_access(public_key, resource, user)
    }

    fn get_private_key(&self, public_key: &str) -> Result<Option<String>, AclError> {
        self.inner.get_private_key(public_key)
    }

    fn public_key_exists(&self, public_key: &str) -> Result<bool, AclError> {
        self.inner.public_key_exists(public_key)
    }

    fn get_access_list(&self, public_key: &str) -> Result<Vec<AccessRule>, AclError> {
        self.inner.get_access_list(public_key)
    }

    fn get_access_rule(&self, public_key: &str, id: u64) -> Result<Option<AccessRule>, AclError> {
        self.inner.get_access_rule(public_key, id)
    }

    fn get_groups(&self, query: &GroupQuery) -> Result<GroupsPage, AclError> {
        self.inner.get_groups(query)
    }

    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>, AclError> {
        self.inner.get_group(name)
    }
}
