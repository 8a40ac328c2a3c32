use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

use super::array::KeyPair;
use super::resource::{expand_resource_spec, Resource};
use super::rule::GroupTable;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AclConfig {
    #[serde(default = "AclConfig::default_name")]
    pub name: AclType,

    /// Key pairs. The `simple` adapter takes no rules, every key gets
    /// read-write access to its own user.
    #[serde(default)]
    pub keys: Vec<KeyPair>,

    /// Group name to resource names or shorthands (`read-only`,
    /// `read-write`, `all`).
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,

    /// Store `keys` and `groups` in the database on startup when the
    /// `database` adapter is used, skipping entries that already exist.
    #[serde(default = "AclConfig::default_seed")]
    pub seed: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub enum AclType {
    #[serde(rename = "simple")]
    Simple,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "database")]
    Database,
}

impl CommonConfig for AclConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            keys: Vec::new(),
            groups: BTreeMap::new(),
            seed: Self::default_seed(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.keys.len());
        for pair in self.keys.iter_mut() {
            if pair.public_key.is_empty() {
                bail!("public key cannot be empty");
            }
            if !seen.insert(pair.public_key.clone()) {
                bail!(
                    "duplicate key pair for public key '{}', only one private key is allowed",
                    pair.public_key
                );
            }
            pair.private_key = expandenv("private_key", &pair.private_key)
                .with_context(|| format!("private key of '{}'", pair.public_key))?;
            if pair.private_key.is_empty() {
                bail!("private key of '{}' cannot be empty", pair.public_key);
            }
            if self.name == AclType::Simple && !pair.rules.is_empty() {
                bail!(
                    "key '{}' has rules, the simple adapter does not support rules",
                    pair.public_key
                );
            }
        }

        if self.name == AclType::Simple && !self.groups.is_empty() {
            bail!("the simple adapter does not support groups");
        }

        self.group_table().context("groups")?;
        Ok(())
    }
}

impl AclConfig {
    fn default_name() -> AclType {
        AclType::Database
    }

    fn default_seed() -> bool {
        true
    }

    /// Resolves the configured groups, expanding shorthands.
    pub fn group_table(&self) -> Result<GroupTable> {
        let mut table = GroupTable::new();
        for (name, specs) in self.groups.iter() {
            let mut resources: BTreeSet<Resource> = BTreeSet::new();
            for spec in specs.iter() {
                let expanded = expand_resource_spec(spec)
                    .with_context(|| format!("group '{name}'"))?;
                resources.extend(expanded);
            }
            table.insert(name.clone(), resources);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let mut cfg: AclConfig = toml::from_str(
            r#"
            name = "array"

            [[keys]]
            public_key = "alice"
            private_key = "secret"

            [[keys.rules]]
            resources = ["read-write"]
            users = ["alice"]

            [[keys.rules]]
            group = "editors"
            users = "*"

            [groups]
            editors = ["image.get", "metadata.put"]
            "#,
        )
        .unwrap();
        cfg.complete(&PathSet::new_test()).unwrap();

        assert_eq!(cfg.name, AclType::Array);
        assert_eq!(cfg.keys.len(), 1);
        assert_eq!(cfg.keys[0].rules.len(), 2);
        assert_eq!(
            cfg.group_table().unwrap()["editors"],
            BTreeSet::from([Resource::ImageGet, Resource::MetadataPut])
        );
    }

    #[test]
    fn test_invalid() {
        let ps = PathSet::new_test();

        let bad = [
            // Duplicate public key
            r#"
            name = "simple"
            [[keys]]
            public_key = "alice"
            private_key = "a"
            [[keys]]
            public_key = "alice"
            private_key = "b"
            "#,
            // Rules with simple adapter
            r#"
            name = "simple"
            [[keys]]
            public_key = "alice"
            private_key = "a"
            [[keys.rules]]
            resources = ["image.get"]
            users = "*"
            "#,
            // Unknown resource in group
            r#"
            name = "array"
            [groups]
            editors = ["image.fly"]
            "#,
            // Empty private key
            r#"
            [[keys]]
            public_key = "alice"
            private_key = ""
            "#,
        ];
        for s in bad {
            let mut cfg: AclConfig = toml::from_str(s).unwrap();
            assert!(cfg.complete(&ps).is_err(), "config should be rejected: {s}");
        }

        // Empty explicit user list fails while decoding
        let result = toml::from_str::<AclConfig>(
            r#"
            [[keys]]
            public_key = "alice"
            private_key = "a"
            [[keys.rules]]
            resources = ["image.get"]
            users = []
            "#,
        );
        assert!(result.is_err());
    }
}
