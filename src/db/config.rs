use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};

use super::cache::config::CacheConfig;
use super::sqlite::config::SqliteConfig;

/// Storage for images, metadata, short urls and the mutable access control.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DbConfig {
    #[serde(default = "DbConfig::default_name")]
    pub name: DbType,

    #[serde(default = "SqliteConfig::default")]
    pub sqlite: SqliteConfig,

    #[serde(default = "CacheConfig::default")]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub enum DbType {
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl CommonConfig for DbConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            sqlite: SqliteConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        match self.name {
            DbType::Sqlite => self.sqlite.complete(ps).context("sqlite")?,
        }
        self.cache.complete(ps).context("cache")?;
        Ok(())
    }
}

impl DbConfig {
    fn default_name() -> DbType {
        DbType::Sqlite
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        let mut cfg = Self::default();
        cfg.sqlite.memory = true;
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path() {
        let ps = PathSet::new_test();
        let mut cfg: DbConfig = toml::from_str("[sqlite]\njournal_mode = \"delete\"").unwrap();
        cfg.complete(&ps).unwrap();
        assert_eq!(
            cfg.sqlite.path,
            format!("{}", ps.data_path.join("imgstore.db").display())
        );

        let mut cfg = DbConfig::new_test();
        cfg.complete(&ps).unwrap();
        assert!(cfg.sqlite.path.is_empty());
    }
}
