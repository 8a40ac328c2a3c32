use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};
use crate::dirs::ensure_dir_exists;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SqliteConfig {
    #[serde(default = "SqliteConfig::default_memory")]
    pub memory: bool,

    /// Database file, defaults to `<data_path>/imgstore.db`.
    #[serde(default = "SqliteConfig::default_path")]
    pub path: String,

    /// `wal` or `delete`.
    #[serde(default = "SqliteConfig::default_journal_mode")]
    pub journal_mode: JournalMode,

    #[serde(default = "SqliteConfig::default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    Wal,
}

impl JournalMode {
    pub fn pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Wal => "WAL",
        }
    }
}

impl CommonConfig for SqliteConfig {
    fn default() -> Self {
        Self {
            memory: Self::default_memory(),
            path: Self::default_path(),
            journal_mode: Self::default_journal_mode(),
            busy_timeout_ms: Self::default_busy_timeout_ms(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.busy_timeout_ms > 60_000 {
            bail!("busy_timeout_ms should not be greater than 60000");
        }
        if self.memory {
            return Ok(());
        }

        self.path = expandenv("path", &self.path)?;
        if self.path.is_empty() {
            let path = ps.data_path.join("imgstore.db");
            self.path = format!("{}", path.display());
        }
        if let Some(dir) = Path::new(&self.path).parent() {
            if !dir.as_os_str().is_empty() {
                ensure_dir_exists(dir).context("ensure sqlite dir")?;
            }
        }

        Ok(())
    }
}

impl SqliteConfig {
    fn default_memory() -> bool {
        false
    }

    fn default_path() -> String {
        String::new()
    }

    fn default_journal_mode() -> JournalMode {
        JournalMode::Wal
    }

    fn default_busy_timeout_ms() -> u64 {
        5000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete() {
        let ps = PathSet::new_test();
        let mut cfg: SqliteConfig = toml::from_str("memory = true").unwrap();
        cfg.complete(&ps).unwrap();
        assert_eq!(cfg.path, "");
        assert_eq!(cfg.journal_mode, JournalMode::Wal);

        let mut cfg: SqliteConfig =
            toml::from_str("memory = true\njournal_mode = \"delete\"\nbusy_timeout_ms = 0").unwrap();
        cfg.complete(&ps).unwrap();
        assert_eq!(cfg.journal_mode.pragma(), "DELETE");

        let mut cfg: SqliteConfig = toml::from_str("busy_timeout_ms = 120000").unwrap();
        assert!(cfg.complete(&ps).is_err());
    }
}
