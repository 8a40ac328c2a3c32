use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::db::Database;

use super::config::{AclConfig, AclType};
use super::union::UnionAccessControl;
use super::{ArrayAdapter, DatabaseAdapter, SimpleArrayAdapter};

pub struct AclFactory {
    db: Arc<Database>,
}

impl AclFactory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Builds the configured adapter. Invalid keys, rules or groups are
    /// reported here, so they fail startup instead of the first request.
    pub fn build_acl(&self, cfg: &AclConfig) -> Result<Arc<UnionAccessControl>> {
        let groups = cfg.group_table()?;
        let acl = match cfg.name {
            AclType::Simple => {
                let keys = cfg
                    .keys
                    .iter()
                    .map(|k| (k.public_key.clone(), k.private_key.clone()));
                let adapter = SimpleArrayAdapter::new(keys).context("build simple access control")?;
                UnionAccessControl::Simple(adapter)
            }
            AclType::Array => {
                let adapter = ArrayAdapter::new(cfg.keys.clone(), groups)
                    .context("build array access control")?;
                UnionAccessControl::Array(adapter)
            }
            AclType::Database => {
                let adapter = DatabaseAdapter::new(self.db.clone());
                if cfg.seed {
                    adapter
                        .seed(&cfg.keys, &groups)
                        .context("seed database access control")?;
                } else if !cfg.keys.is_empty() || !groups.is_empty() {
                    warn!("Seeding is disabled, configured keys and groups are ignored");
                }
                UnionAccessControl::Database(adapter)
            }
        };

        info!(
            "Using {} access control with {} configured key pairs",
            acl.name(),
            cfg.keys.len()
        );
        Ok(Arc::new(acl))
    }
}
