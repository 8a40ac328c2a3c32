pub mod auth;
pub mod metadata_cache;
pub mod signature;
pub mod stats;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::events::{EventManagerBuilder, EventName, Listener, ListenerFilter};

use metadata_cache::MetadataCacheListener;
use stats::{StatsCounter, StatsListener};

/// One entry of the configured listener table.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ListenerConfig {
    /// Built-in listener name: `stats` or `metadata-cache`.
    pub name: String,

    /// Event names, empty means the listener's default events.
    #[serde(default)]
    pub events: Vec<String>,

    pub priority: Option<i32>,

    /// Restrict the listener to some target users.
    #[serde(default)]
    pub users: Option<ListenerFilter>,
}

impl ListenerConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Vec::new(),
            priority: None,
            users: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if BuiltinListener::from_name(&self.name).is_none() {
            if self.name == auth::AccessControlListener::NAME {
                bail!("listener '{}' is always registered", self.name);
            }
            bail!("unknown listener '{}'", self.name);
        }
        for event in self.events.iter() {
            event
                .parse::<EventName>()
                .with_context(|| format!("listener '{}'", self.name))?;
        }
        if let Some(ref users) = self.users {
            if users.is_empty() {
                bail!("listener '{}' has an empty user filter", self.name);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BuiltinListener {
    Stats,
    MetadataCache,
}

impl BuiltinListener {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            StatsListener::NAME => Some(Self::Stats),
            MetadataCacheListener::NAME => Some(Self::MetadataCache),
            _ => None,
        }
    }

    fn default_events(&self) -> Vec<EventName> {
        match self {
            Self::Stats => vec![EventName::ResponseSend],
            Self::MetadataCache => MetadataCacheListener::default_events(),
        }
    }

    fn default_priority(&self) -> i32 {
        match self {
            Self::Stats => 0,
            Self::MetadataCache => MetadataCacheListener::PRIORITY,
        }
    }

    fn build(&self, stats: &Arc<StatsCounter>) -> Arc<dyn Listener> {
        match self {
            Self::Stats => Arc::new(StatsListener::new(stats.clone())),
            Self::MetadataCache => Arc::new(MetadataCacheListener::new()),
        }
    }
}

/// Listeners used when the configuration names none.
pub fn default_listeners() -> Vec<ListenerConfig> {
    vec![
        ListenerConfig::new(StatsListener::NAME),
        ListenerConfig::new(MetadataCacheListener::NAME),
    ]
}

/// Registers the configured built-in listeners. `stats` is the counter the
/// stats handler reports.
pub fn register_listeners(
    builder: &mut EventManagerBuilder,
    cfgs: &[ListenerConfig],
    stats: &Arc<StatsCounter>,
) -> Result<()> {
    for cfg in cfgs {
        cfg.validate()?;
        let builtin = match BuiltinListener::from_name(&cfg.name) {
            Some(builtin) => builtin,
            None => bail!("unknown listener '{}'", cfg.name),
        };
        let priority = cfg.priority.unwrap_or_else(|| builtin.default_priority());
        let listener = builtin.build(stats);

        if cfg.events.is_empty() {
            builder.add_filtered_listener(
                builtin.default_events(),
                priority,
                listener,
                cfg.users.clone(),
            )?;
        } else {
            builder.add_listener_by_names(&cfg.events, priority, listener, cfg.users.clone())?;
        }
        info!("Registered listener '{}' with priority {priority}", cfg.name);
    }
    Ok(())
}
