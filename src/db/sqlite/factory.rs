use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use super::config::SqliteConfig;
use super::Sqlite;

pub struct SqliteFactory;

impl SqliteFactory {
    pub fn new() -> Self {
        Self {}
    }

    pub fn build_sqlite(&self, cfg: &SqliteConfig) -> Result<Sqlite> {
        let sqlite = if cfg.memory {
            warn!("Using in-memory sqlite database, images and key pairs will be lost when the server stops");
            Sqlite::memory()?
        } else {
            info!("Using sqlite database: {}", cfg.path);
            Sqlite::open(cfg.path.as_ref())
                .with_context(|| format!("open sqlite '{}'", cfg.path))?
        };

        let busy_timeout = Duration::from_millis(cfg.busy_timeout_ms);
        sqlite
            .configure(cfg.journal_mode, busy_timeout)
            .context("configure sqlite")?;
        Ok(sqlite)
    }
}
