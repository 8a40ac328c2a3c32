use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use anyhow::Result;

use crate::acl::{AccessRule, Resource};

use super::Cache;

/// A memory-based cache implementation that stores data in simple maps.
/// The cached data is stored in memory and does not expire.
pub struct MemoryCache {
    access_rules: RefCell<HashMap<String, Vec<AccessRule>>>,
    groups: RefCell<HashMap<String, BTreeSet<Resource>>>,
}

impl MemoryCache {
    /// Creates a new instance of memory cache.
    pub fn new() -> Self {
        Self {
            access_rules: RefCell::new(HashMap::new()),
            groups: RefCell::new(HashMap::new()),
        }
    }
}

impl Cache for MemoryCache {
    fn get_access_rules(&self, public_key: &str) -> Result<Option<Vec<AccessRule>>> {
        Ok(self.access_rules.borrow().get(public_key).cloned())
    }

    fn save_access_rules(&self, public_key: &str, rules: Vec<AccessRule>) -> Result<()> {
        self.access_rules
            .borrow_mut()
            .insert(public_key.to_string(), rules);
        Ok(())
    }

    fn delete_access_rules(&self, public_key: &str) -> Result<()> {
        self.access_rules.borrow_mut().remove(public_key);
        Ok(())
    }

    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>> {
        Ok(self.groups.borrow().get(name).cloned())
    }

    fn save_group(&self, name: &str, resources: BTreeSet<Resource>) -> Result<()> {
        self.groups.borrow_mut().insert(name.to_string(), resources);
        Ok(())
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        self.groups.borrow_mut().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::cache::tests::run_all_cache_tests;

    #[test]
    fn test_memory() {
        let cache = MemoryCache::new();
        run_all_cache_tests(&cache);
    }
}
