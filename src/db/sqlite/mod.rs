mod acl;
mod image;
mod metadata;
mod shorturl;

pub mod config;
pub mod factory;

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use log::debug;
use rusqlite::Connection as RawConnection;
use rusqlite::Transaction as RawTransaction;
use serde_json::{Map, Value};

use crate::acl::{AccessRule, Group, NewAccessRule, Resource};
use crate::types::query::ImageQuery;

use super::{Connection, ImageRecord, ShortUrlRecord, Transaction};

use self::config::JournalMode;

/// SQLite-based database implementation. This is the simplest database type,
/// perfect for single-node deployments. Supports both file-based and in-memory
/// database types.
pub struct Sqlite {
    conn: RawConnection,
}

/// SQLite transaction for executing database operations
pub struct SqliteTransaction<'a> {
    tx: RawTransaction<'a>,
}

impl Sqlite {
    /// Opens a SQLite database file. Creates one if it doesn't exist.
    /// Also initializes all required database tables.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = RawConnection::open(path)?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Creates a new in-memory database. Database content will be lost when the program exits.
    pub fn memory() -> Result<Self> {
        let conn = RawConnection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Applies connection pragmas. The journal mode is ignored by in-memory
    /// databases.
    pub fn configure(&self, journal_mode: JournalMode, busy_timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(busy_timeout)?;
        let mode: String = self.conn.pragma_update_and_check(
            None,
            "journal_mode",
            journal_mode.pragma(),
            |row| row.get(0),
        )?;
        debug!("SQLite journal mode: {mode}");
        Ok(())
    }

    fn init_tables(db: &RawConnection) -> Result<()> {
        image::create_image_tables(db)?;
        metadata::create_metadata_tables(db)?;
        shorturl::create_short_url_tables(db)?;
        acl::create_acl_tables(db)?;
        Ok(())
    }
}

impl<'a> Connection<'a, SqliteTransaction<'a>> for Sqlite {
    fn transaction(&'a mut self) -> Result<SqliteTransaction<'a>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTransaction { tx })
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn create_image(&self, record: &ImageRecord) -> Result<()> {
        image::create_image(&self.tx, record)
    }

    fn is_image_exists(&self, user: &str, identifier: &str) -> Result<bool> {
        image::is_image_exists(&self.tx, user, identifier)
    }

    fn get_image(
        &self,
        user: &str,
        identifier: &str,
        with_data: bool,
    ) -> Result<Option<ImageRecord>> {
        image::get_image(&self.tx, user, identifier, with_data)
    }

    fn list_images(&self, query: &ImageQuery) -> Result<Vec<ImageRecord>> {
        image::list_images(&self.tx, query)
    }

    fn count_images(&self, query: &ImageQuery) -> Result<usize> {
        image::count_images(&self.tx, query)
    }

    fn update_image_time(&self, user: &str, identifier: &str) -> Result<()> {
        image::update_image_time(&self.tx, user, identifier)
    }

    fn delete_image(&self, user: &str, identifier: &str) -> Result<()> {
        image::delete_image(&self.tx, user, identifier)
    }

    fn list_image_users(&self) -> Result<Vec<String>> {
        image::list_image_users(&self.tx)
    }

    fn get_metadata(&self, user: &str, identifier: &str) -> Result<Option<Map<String, Value>>> {
        metadata::get_metadata(&self.tx, user, identifier)
    }

    fn set_metadata(
        &self,
        user: &str,
        identifier: &str,
        data: &Map<String, Value>,
    ) -> Result<()> {
        metadata::set_metadata(&self.tx, user, identifier, data)
    }

    fn delete_metadata(&self, user: &str, identifier: &str) -> Result<()> {
        metadata::delete_metadata(&self.tx, user, identifier)
    }

    fn create_short_url(&self, record: &ShortUrlRecord) -> Result<()> {
        shorturl::create_short_url(&self.tx, record)
    }

    fn get_short_url(&self, id: &str) -> Result<Option<ShortUrlRecord>> {
        shorturl::get_short_url(&self.tx, id)
    }

    fn find_short_url(
        &self,
        user: &str,
        image: &str,
        query: &str,
    ) -> Result<Option<ShortUrlRecord>> {
        shorturl::find_short_url(&self.tx, user, image, query)
    }

    fn delete_short_url(&self, id: &str) -> Result<()> {
        shorturl::delete_short_url(&self.tx, id)
    }

    fn delete_image_short_urls(&self, user: &str, image: &str) -> Result<usize> {
        shorturl::delete_image_short_urls(&self.tx, user, image)
    }

    fn create_key_pair(&self, public_key: &str, private_key: &str) -> Result<()> {
        acl::create_key_pair(&self.tx, public_key, private_key)
    }

    fn get_private_key(&self, public_key: &str) -> Result<Option<String>> {
        acl::get_private_key(&self.tx, public_key)
    }

    fn is_public_key_exists(&self, public_key: &str) -> Result<bool> {
        acl::is_public_key_exists(&self.tx, public_key)
    }

    fn delete_key_pair(&self, public_key: &str) -> Result<()> {
        acl::delete_key_pair(&self.tx, public_key)
    }

    fn create_access_rule(&self, public_key: &str, rule: &NewAccessRule) -> Result<u64> {
        acl::create_access_rule(&self.tx, public_key, rule)
    }

    fn list_access_rules(&self, public_key: &str) -> Result<Vec<AccessRule>> {
        acl::list_access_rules(&self.tx, public_key)
    }

    fn get_access_rule(&self, public_key: &str, id: u64) -> Result<Option<AccessRule>> {
        acl::get_access_rule(&self.tx, public_key, id)
    }

    fn delete_access_rule(&self, public_key: &str, id: u64) -> Result<()> {
        acl::delete_access_rule(&self.tx, public_key, id)
    }

    fn delete_access_rules(&self, public_key: &str) -> Result<usize> {
        acl::delete_access_rules(&self.tx, public_key)
    }

    fn delete_group_access_rules(&self, group: &str) -> Result<Vec<String>> {
        acl::delete_group_access_rules(&self.tx, group)
    }

    fn create_group(&self, name: &str, resources: &BTreeSet<Resource>) -> Result<()> {
        acl::create_group(&self.tx, name, resources)
    }

    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>> {
        acl::get_group(&self.tx, name)
    }

    fn list_groups(&self, offset: u64, limit: u64) -> Result<Vec<Group>> {
        acl::list_groups(&self.tx, offset, limit)
    }

    fn count_groups(&self) -> Result<usize> {
        acl::count_groups(&self.tx)
    }

    fn update_group(&self, name: &str, resources: &BTreeSet<Resource>) -> Result<()> {
        acl::update_group(&self.tx, name, resources)
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        acl::delete_group(&self.tx, name)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
