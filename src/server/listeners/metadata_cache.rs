use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use actix_web::http::StatusCode;
use anyhow::{bail, Result};
use log::debug;
use serde_json::{json, Value};

use crate::acl::Resource;
use crate::events::{EventContext, EventName, Listener};
use crate::server::response::Response;

const ARG_CACHE_HIT: &str = "metadata_cache_hit";
const ARG_CACHE_GENERATION: &str = "metadata_cache_generation";

pub const HEADER_CACHE: &str = "X-Imgstore-Metadata-Cache";

type CacheKey = (String, String);

/// Serves `metadata.get` from memory.
///
/// Hits are answered before the metadata handler runs and stop the event.
/// Misses are stored on `response.send` when the handler succeeded. Any
/// metadata write or image deletion drops the entry of that image, both
/// before the handler runs and once its response is sent.
///
/// Every invalidation bumps the generation of its key. A miss remembers the
/// generation it saw and is only stored if it is still current, so a read
/// that raced with a write never caches the old metadata.
pub struct MetadataCacheListener {
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Value>,
    generations: HashMap<CacheKey, u64>,
    /// Bumped whenever the tables are cleared, outdating every pending miss.
    epoch: u64,
}

impl CacheState {
    fn generation(&self, key: &CacheKey) -> (u64, u64) {
        let generation = self.generations.get(key).copied().unwrap_or(0);
        (self.epoch, generation)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.generations.clear();
        self.epoch += 1;
    }
}

impl MetadataCacheListener {
    pub const NAME: &'static str = "metadata-cache";
    pub const PRIORITY: i32 = 10;

    const MAX_ENTRIES: usize = 10_000;

    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn default_events() -> Vec<EventName> {
        vec![
            EventName::Resource(Resource::MetadataGet),
            EventName::Resource(Resource::MetadataPut),
            EventName::Resource(Resource::MetadataPost),
            EventName::Resource(Resource::MetadataDelete),
            EventName::Resource(Resource::ImageDelete),
            EventName::ResponseSend,
        ]
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>> {
        match self.state.lock() {
            Ok(state) => Ok(state),
            Err(e) => bail!("failed to lock metadata cache: {e:#}"),
        }
    }

    fn is_write(resource: Resource) -> bool {
        matches!(
            resource,
            Resource::MetadataPut
                | Resource::MetadataPost
                | Resource::MetadataDelete
                | Resource::ImageDelete
        )
    }

    fn lookup(&self, ctx: &mut EventContext, key: CacheKey) -> Result<()> {
        let (cached, generation) = {
            let state = self.lock()?;
            (state.entries.get(&key).cloned(), state.generation(&key))
        };
        match cached {
            Some(metadata) => {
                debug!("Metadata cache hit for {}/{}", key.0, key.1);
                ctx.set_response(Response::json(&metadata).with_header(HEADER_CACHE, "Hit"));
                ctx.set_arg(ARG_CACHE_HIT, true);
                ctx.stop_propagation();
            }
            None => ctx.set_arg(ARG_CACHE_GENERATION, json!([generation.0, generation.1])),
        }
        Ok(())
    }

    fn store(&self, ctx: &EventContext, key: CacheKey) -> Result<()> {
        if ctx.has_arg(ARG_CACHE_HIT) {
            return Ok(());
        }
        let seen = ctx
            .get_arg(ARG_CACHE_GENERATION)
            .and_then(Value::as_array)
            .map(|seen| seen.iter().filter_map(Value::as_u64).collect::<Vec<_>>());
        let seen = match seen.as_deref() {
            Some(&[epoch, generation]) => (epoch, generation),
            _ => return Ok(()),
        };
        let metadata = match ctx.response() {
            Some(resp) if resp.status() == StatusCode::OK => match resp.json_body() {
                Some(metadata) => metadata.clone(),
                None => return Ok(()),
            },
            _ => return Ok(()),
        };

        let mut state = self.lock()?;
        if state.generation(&key) != seen {
            debug!(
                "Metadata of {}/{} changed while it was read, skip caching",
                key.0, key.1
            );
            return Ok(());
        }
        if state.entries.len() >= Self::MAX_ENTRIES {
            debug!("Metadata cache is full, clear {} entries", state.entries.len());
            state.clear();
        }
        state.entries.insert(key, metadata);
        Ok(())
    }

    fn invalidate(&self, key: CacheKey) -> Result<()> {
        let mut state = self.lock()?;
        if state.generations.len() >= Self::MAX_ENTRIES {
            state.clear();
        }
        state.entries.remove(&key);
        *state.generations.entry(key).or_insert(0) += 1;
        Ok(())
    }
}

impl Default for MetadataCacheListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Listener for MetadataCacheListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let key = match (ctx.request().user(), ctx.request().image()) {
            (Some(user), Some(image)) => (user.to_string(), image.to_string()),
            _ => return Ok(()),
        };
        let resource = ctx.request().resource();

        match ctx.name() {
            Some(EventName::Resource(Resource::MetadataGet)) => self.lookup(ctx, key),
            Some(EventName::ResponseSend) if resource == Resource::MetadataGet => {
                self.store(ctx, key)
            }
            Some(EventName::Resource(_)) | Some(EventName::ResponseSend)
                if Self::is_write(resource) =>
            {
                self.invalidate(key)
            }
            _ => Ok(()),
        }
    }
}
