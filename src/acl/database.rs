use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{debug, info};

use crate::db::cache::Cache;
use crate::db::{Database, Transaction};

use super::array::KeyPair;
use super::query::{GroupQuery, GroupsPage};
use super::resource::Resource;
use super::rule::{is_authorized, AccessRule, GroupTable, NewAccessRule};
use super::{
    validate_group, validate_key_pair, AccessControl, AclError, MutableAccessControl,
};

/// Mutable access control stored in the database. Rule lists and groups are
/// cached per key and per name; every mutation drops the entries it touches
/// inside the same transaction.
pub struct DatabaseAdapter {
    db: Arc<Database>,
}

impl DatabaseAdapter {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Creates the configured groups and key pairs that are not stored yet.
    /// Existing keys and groups are left untouched.
    pub fn seed(&self, key_pairs: &[KeyPair], groups: &GroupTable) -> Result<(), AclError> {
        for (name, resources) in groups.iter() {
            validate_group(name, resources)?;
        }
        for pair in key_pairs.iter() {
            validate_key_pair(&pair.public_key, &pair.private_key)?;
            for rule in pair.rules.iter() {
                rule.validate()?;
            }
        }

        self.db
            .with_transaction(|tx, cache| {
                for (name, resources) in groups.iter() {
                    if tx.get_group(name)?.is_some() {
                        debug!("Seed group '{name}' already exists, skip");
                        continue;
                    }
                    tx.create_group(name, resources)?;
                    cache.delete_group(name)?;
                    info!("Seeded resource group '{name}'");
                }

                for pair in key_pairs.iter() {
                    if tx.is_public_key_exists(&pair.public_key)? {
                        debug!("Seed key '{}' already exists, skip", pair.public_key);
                        continue;
                    }
                    tx.create_key_pair(&pair.public_key, &pair.private_key)?;
                    for rule in pair.rules.iter() {
                        ensure_group_exists(tx, rule)?;
                        tx.create_access_rule(&pair.public_key, rule)?;
                    }
                    cache.delete_access_rules(&pair.public_key)?;
                    info!(
                        "Seeded key pair '{}' with {} access rules",
                        pair.public_key,
                        pair.rules.len()
                    );
                }
                Ok(())
            })
            .map_err(into_acl_error)
    }
}

impl AccessControl for DatabaseAdapter {
    fn has_access(
        &self,
        public_key: &str,
        resource: Resource,
        user: Option<&str>,
    ) -> Result<bool, AclError> {
        self.db
            .with_transaction(|tx, cache| {
                let rules = match load_rules(tx, cache, public_key)? {
                    Some(rules) => rules,
                    None => return Ok(false),
                };

                let mut groups = GroupTable::new();
                for rule in rules.iter() {
                    let name = match rule.rule.group() {
                        Some(name) => name,
                        None => continue,
                    };
                    if groups.contains_key(name) {
                        continue;
                    }
                    // A missing group stays out of the table, evaluation
                    // denies when a matching rule needs it.
                    if let Some(resources) = load_group(tx, cache, name)? {
                        groups.insert(name.to_string(), resources);
                    }
                }

                Ok(is_authorized(&rules, &groups, public_key, resource, user))
            })
            .map_err(into_acl_error)
    }

    fn get_private_key(&self, public_key: &str) -> Result<Option<String>, AclError> {
        self.db
            .with_transaction(|tx, _cache| tx.get_private_key(public_key))
            .map_err(into_acl_error)
    }

    fn public_key_exists(&self, public_key: &str) -> Result<bool, AclError> {
        self.db
            .with_transaction(|tx, _cache| tx.is_public_key_exists(public_key))
            .map_err(into_acl_error)
    }

    fn get_access_list(&self, public_key: &str) -> Result<Vec<AccessRule>, AclError> {
        self.db
            .with_transaction(|tx, cache| match load_rules(tx, cache, public_key)? {
                Some(rules) => Ok(rules),
                None => Err(AclError::PublicKeyNotFound(public_key.to_string()).into()),
            })
            .map_err(into_acl_error)
    }

    fn get_access_rule(&self, public_key: &str, id: u64) -> Result<Option<AccessRule>, AclError> {
        self.db
            .with_transaction(|tx, _cache| {
                if !tx.is_public_key_exists(public_key)? {
                    return Err(AclError::PublicKeyNotFound(public_key.to_string()).into());
                }
                tx.get_access_rule(public_key, id)
            })
            .map_err(into_acl_error)
    }

    fn get_groups(&self, query: &GroupQuery) -> Result<GroupsPage, AclError> {
        self.db
            .with_transaction(|tx, _cache| {
                let hits = tx.count_groups()?;
                let groups = tx.list_groups(query.offset(), query.limit())?;
                Ok(GroupsPage {
                    groups,
                    hits,
                    page: query.page(),
                    limit: query.limit(),
                })
            })
            .map_err(into_acl_error)
    }

    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>, AclError> {
        self.db
            .with_transaction(|tx, cache| load_group(tx, cache, name))
            .map_err(into_acl_error)
    }
}

impl MutableAccessControl for DatabaseAdapter {
    fn add_key_pair(&self, public_key: &str, private_key: &str) -> Result<(), AclError> {
        validate_key_pair(public_key, private_key)?;
        self.db
            .with_transaction(|tx, cache| {
                if tx.is_public_key_exists(public_key)? {
                    return Err(AclError::KeyPairExists(public_key.to_string()).into());
                }
                tx.create_key_pair(public_key, private_key)?;
                cache.delete_access_rules(public_key)?;
                Ok(())
            })
            .map_err(into_acl_error)?;
        info!("Added key pair '{public_key}'");
        Ok(())
    }

    fn delete_public_key(&self, public_key: &str) -> Result<(), AclError> {
        let count = self
            .db
            .with_transaction(|tx, cache| {
                if !tx.is_public_key_exists(public_key)? {
                    return Err(AclError::PublicKeyNotFound(public_key.to_string()).into());
                }
                let count = tx.delete_access_rules(public_key)?;
                tx.delete_key_pair(public_key)?;
                cache.delete_access_rules(public_key)?;
                Ok(count)
            })
            .map_err(into_acl_error)?;
        info!("Deleted public key '{public_key}' and {count} access rules");
        Ok(())
    }

    fn add_access_rule(&self, public_key: &str, rule: NewAccessRule) -> Result<u64, AclError> {
        let ids = self.add_access_rules(public_key, vec![rule])?;
        match ids.as_slice() {
            [id] => Ok(*id),
            _ => Err(AclError::Store(anyhow!(
                "expect one access rule id, found {}",
                ids.len()
            ))),
        }
    }

    fn add_access_rules(
        &self,
        public_key: &str,
        rules: Vec<NewAccessRule>,
    ) -> Result<Vec<u64>, AclError> {
        for rule in rules.iter() {
            rule.validate()?;
        }
        let ids = self
            .db
            .with_transaction(|tx, cache| {
                if !tx.is_public_key_exists(public_key)? {
                    return Err(AclError::PublicKeyNotFound(public_key.to_string()).into());
                }
                for rule in rules.iter() {
                    ensure_group_exists(tx, rule)?;
                }
                let mut ids = Vec::with_capacity(rules.len());
                for rule in rules.iter() {
                    ids.push(tx.create_access_rule(public_key, rule)?);
                }
                cache.delete_access_rules(public_key)?;
                Ok(ids)
            })
            .map_err(into_acl_error)?;
        info!("Added access rules {ids:?} to public key '{public_key}'");
        Ok(ids)
    }

    fn delete_access_rule(&self, public_key: &str, id: u64) -> Result<(), AclError> {
        self.db
            .with_transaction(|tx, cache| {
                if !tx.is_public_key_exists(public_key)? {
                    return Err(AclError::PublicKeyNotFound(public_key.to_string()).into());
                }
                if tx.get_access_rule(public_key, id)?.is_none() {
                    return Err(AclError::AccessRuleNotFound(public_key.to_string(), id).into());
                }
                tx.delete_access_rule(public_key, id)?;
                cache.delete_access_rules(public_key)?;
                Ok(())
            })
            .map_err(into_acl_error)?;
        info!("Deleted access rule {id} of public key '{public_key}'");
        Ok(())
    }

    fn add_resource_group(
        &self,
        name: &str,
        resources: &BTreeSet<Resource>,
    ) -> Result<(), AclError> {
        validate_group(name, resources)?;
        self.db
            .with_transaction(|tx, cache| {
                if tx.get_group(name)?.is_some() {
                    return Err(AclError::GroupExists(name.to_string()).into());
                }
                tx.create_group(name, resources)?;
                cache.delete_group(name)?;
                Ok(())
            })
            .map_err(into_acl_error)?;
        info!("Added resource group '{name}'");
        Ok(())
    }

    fn update_resource_group(
        &self,
        name: &str,
        resources: &BTreeSet<Resource>,
    ) -> Result<(), AclError> {
        validate_group(name, resources)?;
        self.db
            .with_transaction(|tx, cache| {
                if tx.get_group(name)?.is_none() {
                    return Err(AclError::GroupNotFound(name.to_string()).into());
                }
                tx.update_group(name, resources)?;
                cache.delete_group(name)?;
                Ok(())
            })
            .map_err(into_acl_error)?;
        info!("Updated resource group '{name}'");
        Ok(())
    }

    fn delete_resource_group(&self, name: &str) -> Result<(), AclError> {
        let keys = self
            .db
            .with_transaction(|tx, cache| {
                if tx.get_group(name)?.is_none() {
                    return Err(AclError::GroupNotFound(name.to_string()).into());
                }
                let keys = tx.delete_group_access_rules(name)?;
                for key in keys.iter() {
                    cache.delete_access_rules(key)?;
                }
                tx.delete_group(name)?;
                cache.delete_group(name)?;
                Ok(keys)
            })
            .map_err(into_acl_error)?;
        info!(
            "Deleted resource group '{name}', removed its rules from {} public keys",
            keys.len()
        );
        Ok(())
    }
}

/// Rules of a public key, `None` if the key does not exist.
fn load_rules(
    tx: &dyn Transaction,
    cache: &dyn Cache,
    public_key: &str,
) -> Result<Option<Vec<AccessRule>>> {
    if let Some(rules) = cache.get_access_rules(public_key)? {
        return Ok(Some(rules));
    }
    if !tx.is_public_key_exists(public_key)? {
        return Ok(None);
    }

    let rules = tx.list_access_rules(public_key)?;
    cache.save_access_rules(public_key, rules.clone())?;
    Ok(Some(rules))
}

fn load_group(
    tx: &dyn Transaction,
    cache: &dyn Cache,
    name: &str,
) -> Result<Option<BTreeSet<Resource>>> {
    if let Some(resources) = cache.get_group(name)? {
        return Ok(Some(resources));
    }
    let resources = tx.get_group(name)?;
    if let Some(ref resources) = resources {
        cache.save_group(name, resources.clone())?;
    }
    Ok(resources)
}

fn ensure_group_exists(tx: &dyn Transaction, rule: &NewAccessRule) -> Result<()> {
    if let Some(group) = rule.group() {
        if tx.get_group(group)?.is_none() {
            return Err(AclError::GroupNotFound(group.to_string()).into());
        }
    }
    Ok(())
}

/// Recovers domain errors raised inside a transaction, everything else is a
/// store failure.
fn into_acl_error(err: anyhow::Error) -> AclError {
    match err.downcast::<AclError>() {
        Ok(err) => err,
        Err(err) => AclError::Store(err),
    }
}
