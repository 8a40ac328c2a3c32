mod sqlite;

#[cfg(test)]
mod tests;

pub mod cache;
pub mod config;
pub mod factory;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::sync::Mutex;

use anyhow::{bail, Result};
use cache::{Cache, DisableCache, UnionCache};
use serde_json::{Map, Value};
use sqlite::{Sqlite, SqliteTransaction};

use crate::acl::{AccessRule, Group, NewAccessRule, Resource};
use crate::types::query::ImageQuery;

/// Database connection trait that can create transactions
pub trait Connection<'a, T>
where
    T: Transaction + 'a,
{
    /// Creates a new transaction from the connection
    fn transaction(&'a mut self) -> Result<T>;
}

/// Database transaction trait that defines all database operations
pub trait Transaction {
    // Image operations
    /// Stores a new image record
    fn create_image(&self, image: &ImageRecord) -> Result<()>;
    /// Checks if a user owns an image with the identifier
    fn is_image_exists(&self, user: &str, identifier: &str) -> Result<bool>;
    /// Retrieves an image, `with_data` controls whether the blob is loaded
    fn get_image(
        &self,
        user: &str,
        identifier: &str,
        with_data: bool,
    ) -> Result<Option<ImageRecord>>;
    /// Lists images (without data) matching the query, newest first
    fn list_images(&self, query: &ImageQuery) -> Result<Vec<ImageRecord>>;
    /// Counts images matching the query, ignoring pagination
    fn count_images(&self, query: &ImageQuery) -> Result<usize>;
    /// Marks an image as updated now
    fn update_image_time(&self, user: &str, identifier: &str) -> Result<()>;
    /// Deletes an image
    fn delete_image(&self, user: &str, identifier: &str) -> Result<()>;
    /// Lists users owning at least one image
    fn list_image_users(&self) -> Result<Vec<String>>;

    // Metadata operations
    /// Retrieves the metadata of an image, `None` if never set
    fn get_metadata(&self, user: &str, identifier: &str) -> Result<Option<Map<String, Value>>>;
    /// Replaces the metadata of an image
    fn set_metadata(&self, user: &str, identifier: &str, metadata: &Map<String, Value>)
        -> Result<()>;
    /// Deletes the metadata of an image
    fn delete_metadata(&self, user: &str, identifier: &str) -> Result<()>;

    // Short url operations
    /// Stores a new short url
    fn create_short_url(&self, record: &ShortUrlRecord) -> Result<()>;
    /// Retrieves a short url by id
    fn get_short_url(&self, id: &str) -> Result<Option<ShortUrlRecord>>;
    /// Finds an existing short url for the same image and query
    fn find_short_url(&self, user: &str, image: &str, query: &str)
        -> Result<Option<ShortUrlRecord>>;
    /// Deletes a short url by id
    fn delete_short_url(&self, id: &str) -> Result<()>;
    /// Deletes every short url of an image
    fn delete_image_short_urls(&self, user: &str, image: &str) -> Result<usize>;

    // Key pair operations
    /// Creates a new key pair
    fn create_key_pair(&self, public_key: &str, private_key: &str) -> Result<()>;
    /// Retrieves the private key of a public key
    fn get_private_key(&self, public_key: &str) -> Result<Option<String>>;
    /// Checks if a public key exists
    fn is_public_key_exists(&self, public_key: &str) -> Result<bool>;
    /// Deletes a key pair, rules are not touched
    fn delete_key_pair(&self, public_key: &str) -> Result<()>;

    // Access rule operations
    /// Attaches a rule to a public key, returns the rule id
    fn create_access_rule(&self, public_key: &str, rule: &NewAccessRule) -> Result<u64>;
    /// Lists the rules of a public key ordered by id
    fn list_access_rules(&self, public_key: &str) -> Result<Vec<AccessRule>>;
    /// Retrieves one rule of a public key
    fn get_access_rule(&self, public_key: &str, id: u64) -> Result<Option<AccessRule>>;
    /// Deletes one rule of a public key
    fn delete_access_rule(&self, public_key: &str, id: u64) -> Result<()>;
    /// Deletes every rule of a public key
    fn delete_access_rules(&self, public_key: &str) -> Result<usize>;
    /// Deletes every rule referencing a group, returns the affected public keys
    fn delete_group_access_rules(&self, group: &str) -> Result<Vec<String>>;

    // Group operations
    /// Creates a new resource group
    fn create_group(&self, name: &str, resources: &BTreeSet<Resource>) -> Result<()>;
    /// Retrieves the resources of a group
    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>>;
    /// Lists groups ordered by name
    fn list_groups(&self, offset: u64, limit: u64) -> Result<Vec<Group>>;
    /// Counts groups
    fn count_groups(&self) -> Result<usize>;
    /// Replaces the resources of a group
    fn update_group(&self, name: &str, resources: &BTreeSet<Resource>) -> Result<()>;
    /// Deletes a group
    fn delete_group(&self, name: &str) -> Result<()>;

    /// Commits the transaction
    fn commit(self) -> Result<()>;
    /// Rolls back the transaction
    fn rollback(self) -> Result<()>;
}

/// Record structure for a stored image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Owner of the image
    pub user: String,
    /// Hex encoded SHA-256 of the image bytes
    pub identifier: String,
    pub mime: String,
    pub extension: String,
    /// Image size in bytes
    pub size: u64,
    /// Raw image bytes, empty when loaded without data
    pub data: Vec<u8>,
    pub added: u64,
    pub updated: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShortUrlRecord {
    /// Random 7 character alphanumeric id
    pub id: String,
    pub user: String,
    pub image: String,
    /// Query string applied when the short url is resolved, may be empty
    pub query: String,
}

/// Main database structure supporting multiple backend implementations
pub struct Database {
    ctx: Mutex<DatabaseContext>,
}

/// Enum representing different supported database connections
pub enum UnionConnection {
    /// SQLite database connection
    Sqlite(Sqlite),
}

enum UnionTransaction<'a> {
    Sqlite(SqliteTransaction<'a>),
}

struct DatabaseContext {
    conn: RefCell<UnionConnection>,
    cache: Option<UnionCache>,
    no_cache: DisableCache,
}

impl Database {
    /// Creates a new database instance with optional caching
    pub fn new(conn: UnionConnection, cache: Option<UnionCache>) -> Self {
        Self {
            ctx: Mutex::new(DatabaseContext {
                conn: RefCell::new(conn),
                cache,
                no_cache: DisableCache,
            }),
        }
    }

    /// In-memory sqlite database with a memory cache. Data is lost when the
    /// database is dropped.
    pub fn memory() -> Result<Self> {
        let sqlite = Sqlite::memory()?;
        let cache = UnionCache::Memory(cache::MemoryCache::new());
        Ok(Self::new(UnionConnection::Sqlite(sqlite), Some(cache)))
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self::memory().unwrap()
    }

    #[cfg(test)]
    pub fn new_test_no_cache() -> Self {
        let sqlite = Sqlite::memory().unwrap();
        Self::new(UnionConnection::Sqlite(sqlite), None)
    }

    /// Executes a function within a transaction context with optional caching support.
    ///
    /// - If the function `f` succeeds, the transaction will be committed
    /// - If the function `f` fails (returns an error), the transaction will be rolled back
    /// - If the transaction operations (commit/rollback) fail, the error will be returned
    ///
    /// The function `f` receives the transaction and the cache. When caching is
    /// disabled a no-op cache is passed, so callers never branch on it.
    ///
    /// Calls are serialized, so everything `f` reads observes one consistent
    /// state of the store.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction, &dyn Cache) -> Result<T>,
    {
        let ctx = match self.ctx.lock() {
            Ok(ctx) => ctx,
            Err(e) => bail!("failed to lock database: {e:#}"),
        };
        let mut conn = ctx.conn.borrow_mut();
        let tx = conn.transaction()?;

        let result = if let Some(ref cache) = ctx.cache {
            f(&tx, cache)
        } else {
            f(&tx, &ctx.no_cache)
        };

        if result.is_ok() {
            tx.commit()
        } else {
            tx.rollback()
        }?;

        result
    }
}

impl<'a> Connection<'a, UnionTransaction<'a>> for UnionConnection {
    fn transaction(&'a mut self) -> Result<UnionTransaction<'a>> {
        match self {
            UnionConnection::Sqlite(sqlite) => sqlite.transaction().map(UnionTransaction::Sqlite),
        }
    }
}

impl Transaction for UnionTransaction<'_> {
    fn create_image(&self, image: &ImageRecord) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_image(image),
        }
    }

    fn is_image_exists(&self, user: &str, identifier: &str) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.is_image_exists(user, identifier),
        }
    }

    fn get_image(
        &self,
        user: &str,
        identifier: &str,
        with_data: bool,
    ) -> Result<Option<ImageRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_image(user, identifier, with_data),
        }
    }

    fn list_images(&self, query: &ImageQuery) -> Result<Vec<ImageRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_images(query),
        }
    }

    fn count_images(&self, query: &ImageQuery) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.count_images(query),
        }
    }

    fn update_image_time(&self, user: &str, identifier: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_image_time(user, identifier),
        }
    }

    fn delete_image(&self, user: &str, identifier: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_image(user, identifier),
        }
    }

    fn list_image_users(&self) -> Result<Vec<String>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_image_users(),
        }
    }

    fn get_metadata(&self, user: &str, identifier: &str) -> Result<Option<Map<String, Value>>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_metadata(user, identifier),
        }
    }

    fn set_metadata(
        &self,
        user: &str,
        identifier: &str,
        metadata: &Map<String, Value>,
    ) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.set_metadata(user, identifier, metadata),
        }
    }

    fn delete_metadata(&self, user: &str, identifier: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_metadata(user, identifier),
        }
    }

    fn create_short_url(&self, record: &ShortUrlRecord) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_short_url(record),
        }
    }

    fn get_short_url(&self, id: &str) -> Result<Option<ShortUrlRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_short_url(id),
        }
    }

    fn find_short_url(
        &self,
        user: &str,
        image: &str,
        query: &str,
    ) -> Result<Option<ShortUrlRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.find_short_url(user, image, query),
        }
    }

    fn delete_short_url(&self, id: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_short_url(id),
        }
    }

    fn delete_image_short_urls(&self, user: &str, image: &str) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_image_short_urls(user, image),
        }
    }

    fn create_key_pair(&self, public_key: &str, private_key: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_key_pair(public_key, private_key),
        }
    }

    fn get_private_key(&self, public_key: &str) -> Result<Option<String>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_private_key(public_key),
        }
    }

    fn is_public_key_exists(&self, public_key: &str) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.is_public_key_exists(public_key),
        }
    }

    fn delete_key_pair(&self, public_key: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_key_pair(public_key),
        }
    }

    fn create_access_rule(&self, public_key: &str, rule: &NewAccessRule) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_access_rule(public_key, rule),
        }
    }

    fn list_access_rules(&self, public_key: &str) -> Result<Vec<AccessRule>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_access_rules(public_key),
        }
    }

    fn get_access_rule(&self, public_key: &str, id: u64) -> Result<Option<AccessRule>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_access_rule(public_key, id),
        }
    }

    fn delete_access_rule(&self, public_key: &str, id: u64) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_access_rule(public_key, id),
        }
    }

    fn delete_access_rules(&self, public_key: &str) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_access_rules(public_key),
        }
    }

    fn delete_group_access_rules(&self, group: &str) -> Result<Vec<String>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_group_access_rules(group),
        }
    }

    fn create_group(&self, name: &str, resources: &BTreeSet<Resource>) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_group(name, resources),
        }
    }

    fn get_group(&self, name: &str) -> Result<Option<BTreeSet<Resource>>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_group(name),
        }
    }

    fn list_groups(&self, offset: u64, limit: u64) -> Result<Vec<Group>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_groups(offset, limit),
        }
    }

    fn count_groups(&self) -> Result<usize> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.count_groups(),
        }
    }

    fn update_group(&self, name: &str, resources: &BTreeSet<Resource>) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_group(name, resources),
        }
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_group(name),
        }
    }

    fn commit(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.commit(),
        }
    }

    fn rollback(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.rollback(),
        }
    }
}
