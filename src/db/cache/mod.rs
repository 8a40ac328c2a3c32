mod memory;


pub mod config;
pub mod factory;

use std::collections::BTreeSet;

use anyhow::Result;

pub use memory::MemoryCache;

use crate::acl::{AccessRule, Resource};

/// Cache for access-control lookups on the authorization path. Entries are
/// only valid inside [`super::Database::with_transaction`]; writers must
/// delete the entries they touch in the same transaction.
pub trait Cache {
    fn get_access_rules(&self, public_key: &str) -> Result<Option<Vec<AccessRule>>>;
    fn save_access_rules(&self, public_key: &str, rules: Vec<AccessRule>) -> Result<()>;
    fn delete_access_rules(&self, public_key: &str) -> Result<()>;

    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>>;
    fn save_group(&self, name: &str, resources: BTreeSet<Resource>) -> Result<()>;
    fn delete_group(&self, name: &str) -> Result<()>;
}

pub enum UnionCache {
    Memory(MemoryCache),
}

impl Cache for UnionCache {
    fn get_access_rules(&self, public_key: &str) -> Result<Option<Vec<AccessRule>>> {
        match self {
            Self::Memory(cache) => cache.get_access_rules(public_key),
        }
    }

    fn save_access_rules(&self, public_key: &str, rules: Vec<AccessRule>) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.save_access_rules(public_key, rules),
        }
    }

    fn delete_access_rules(&self, public_key: &str) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.delete_access_rules(public_key),
        }
    }

    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>> {
        match self {
            Self::Memory(cache) => cache.get_group(name),
        }
    }

    fn save_group(&self, name: &str, resources: BTreeSet<Resource>) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.save_group(name, resources),
        }
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.delete_group(name),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DisableCache;

impl Cache for DisableCache {
    fn get_access_rules(&self, _public_key: &str) -> Result<Option<Vec<AccessRule>>> {
        Ok(None)
    }

    fn save_access_rules(&self, _public_key: &str, _rules: Vec<AccessRule>) -> Result<()> {
        Ok(())
    }

    fn delete_access_rules(&self, _public_key: &str) -> Result<()> {
        Ok(())
    }

    fn get_group(&self, _name: &str) -> Result<Option<BTreeSet<Resource>>> {
        Ok(None)
    }

    fn save_group(&self, _name: &str, _resources: BTreeSet<Resource>) -> Result<()> {
        Ok(())
    }

    fn delete_group(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}
