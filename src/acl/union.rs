use std::collections::BTreeSet;

use super::query::{GroupQuery, GroupsPage};
use super::resource::Resource;
use super::rule::{AccessRule, NewAccessRule};
use super::{
    AccessControl, AclError, ArrayAdapter, DatabaseAdapter, MutableAccessControl,
    SimpleArrayAdapter,
};

pub enum UnionAccessControl {
    Simple(SimpleArrayAdapter),
    Array(ArrayAdapter),
    Database(DatabaseAdapter),
}

impl UnionAccessControl {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Simple(_) => "simple",
            Self::Array(_) => "array",
            Self::Database(_) => "database",
        }
    }

    /// Whether mutations are supported. Static adapters reject every
    /// mutation with [`AclError::Immutable`].
    pub fn is_mutable(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    fn mutable(&self) -> Result<&dyn MutableAccessControl, AclError> {
        match self {
            Self::Database(adapter) => Ok(adapter),
            Self::Simple(_) | Self::Array(_) => Err(AclError::Immutable),
        }
    }
}

impl AccessControl for UnionAccessControl {
    fn has_access(
        &self,
        public_key: &str,
        resource: Resource,
        user: Option<&str>,
    ) -> Result<bool, AclError> {
        match self {
            Self::Simple(adapter) => adapter.has_access(public_key, resource, user),
            Self::Array(adapter) => adapter.has_access(public_key, resource, user),
            Self::Database(adapter) => adapter.has_access(public_key, resource, user),
        }
    }

    fn get_private_key(&self, public_key: &str) -> Result<Option<String>, AclError> {
        match self {
            Self::Simple(adapter) => adapter.get_private_key(public_key),
            Self::Array(adapter) => adapter.get_private_key(public_key),
            Self::Database(adapter) => adapter.get_private_key(public_key),
        }
    }

    fn public_key_exists(&self, public_key: &str) -> Result<bool, AclError> {
        match self {
            Self::Simple(adapter) => adapter.public_key_exists(public_key),
            Self::Array(adapter) => adapter.public_key_exists(public_key),
            Self::Database(adapter) => adapter.public_key_exists(public_key),
        }
    }

    fn get_access_list(&self, public_key: &str) -> Result<Vec<AccessRule>, AclError> {
        match self {
            Self::Simple(adapter) => adapter.get_access_list(public_key),
            Self::Array(adapter) => adapter.get_access_list(public_key),
            Self::Database(adapter) => adapter.get_access_list(public_key),
        }
    }

    fn get_access_rule(&self, public_key: &str, id: u64) -> Result<Option<AccessRule>, AclError> {
        match self {
            Self::Simple(adapter) => adapter.get_access_rule(public_key, id),
            Self::Array(adapter) => adapter.get_access_rule(public_key, id),
            Self::Database(adapter) => adapter.get_access_rule(public_key, id),
        }
    }

    fn get_groups(&self, query: &GroupQuery) -> Result<GroupsPage, AclError> {
        match self {
            Self::Simple(adapter) => adapter.get_groups(query),
            Self::Array(adapter) => adapter.get_groups(query),
            Self::Database(adapter) => adapter.get_groups(query),
        }
    }

    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>, AclError> {
        match self {
            Self::Simple(adapter) => adapter.get_group(name),
            Self::Array(adapter) => adapter.get_group(name),
            Self::Database(adapter) => adapter.get_group(name),
        }
    }
}

impl MutableAccessControl for UnionAccessControl {
    fn add_key_pair(&self, public_key: &str, private_key: &str) -> Result<(), AclError> {
        self.mutable()?.add_key_pair(public_key, private_key)
    }

    fn delete_public_key(&self, public_key: &str) -> Result<(), AclError> {
        self.mutable()?.delete_public_key(public_key)
    }

    fn add_access_rule(&self, public_key: &str, rule: NewAccessRule) -> Result<u64, AclError> {
        self.mutable()?.add_access_rule(public_key, rule)
    }

    fn add_access_rules(
        &self,
        public_key: &str,
        rules: Vec<NewAccessRule>,
    ) -> Result<Vec<u64>, AclError> {
        self.mutable()?.add_access_rules(public_key, rules)
    }

    fn delete_access_rule(&self, public_key: &str, id: u64) -> Result<(), AclError> {
        self.mutable()?.delete_access_rule(public_key, id)
    }

    fn add_resource_group(
        &self,
        name: &str,
        resources: &BTreeSet<Resource>,
    ) -> Result<(), AclError> {
        self.mutable()?.add_resource_group(name, resources)
    }

    fn update_resource_group(
        &self,
        name: &str,
        resources: &BTreeSet<Resource>,
    ) -> Result<(), AclError> {
        self.mutable()?.update_resource_group(name, resources)
    }

    fn delete_resource_group(&self, name: &str) -> Result<(), AclError> {
        self.mutable()?.delete_resource_group(name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::Database;

    #[test]
    fn test_static_is_immutable() {
        let acl = UnionAccessControl::Simple(
            SimpleArrayAdapter::new([(String::from("pk"), String::from("sk"))]).unwrap(),
        );
        assert!(!acl.is_mutable());
        assert!(matches!(
            acl.add_key_pair("other", "secret"),
            Err(AclError::Immutable)
        ));
        assert!(matches!(
            acl.delete_public_key("pk"),
            Err(AclError::Immutable)
        ));
        assert!(acl.public_key_exists("pk").unwrap());
        assert!(acl.has_access("pk", Resource::ImageGet, None).unwrap());
    }

    #[test]
    fn test_database_is_mutable() {
        let acl = UnionAccessControl::Database(DatabaseAdapter::new(Arc::new(Database::new_test())));
        assert!(acl.is_mutable());
        acl.add_key_pair("pk", "sk").unwrap();
        assert!(matches!(
            acl.add_key_pair("pk", "sk2"),
            Err(AclError::KeyPairExists(_))
        ));
        assert_eq!(acl.get_private_key("pk").unwrap(), Some(String::from("sk")));
    }
}
