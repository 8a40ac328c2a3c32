mod context;
mod manager;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::acl::Resource;

pub use context::EventContext;
pub use manager::{EventManager, EventManagerBuilder, EventState};

/// The events a request goes through, in pipeline order: `route.match`,
/// `request.authorize`, one resource event, `response.send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    RouteMatch,
    RequestAuthorize,
    Resource(Resource),
    ResponseSend,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RouteMatch => "route.match",
            Self::RequestAuthorize => "request.authorize",
            Self::Resource(resource) => resource.as_str(),
            Self::ResponseSend => "response.send",
        }
    }
}

impl FromStr for EventName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "route.match" => Ok(Self::RouteMatch),
            "request.authorize" => Ok(Self::RequestAuthorize),
            "response.send" => Ok(Self::ResponseSend),
            name => match name.parse::<Resource>() {
                Ok(resource) => Ok(Self::Resource(resource)),
                Err(_) => bail!("unknown event '{name}'"),
            },
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A request handler plugged into the pipeline.
///
/// Listeners are shared by all requests and called concurrently, per-request
/// state belongs in the [`EventContext`]. Returning an error aborts the
/// current trigger and fails the request with a server error. Rejecting a
/// request is done by setting a response and calling
/// [`EventContext::stop_propagation`] instead.
pub trait Listener: Send + Sync {
    fn name(&self) -> &str;

    fn handle(&self, ctx: &mut EventContext) -> Result<()>;
}

/// Restricts a listener to requests acting on some users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerFilter {
    /// Only run for these users.
    Whitelist(BTreeSet<String>),
    /// Run for everyone except these users.
    Blacklist(BTreeSet<String>),
}

impl ListenerFilter {
    /// Requests without a target user only reach blacklist-filtered listeners.
    pub fn allows(&self, user: Option<&str>) -> bool {
        match (self, user) {
            (Self::Whitelist(users), Some(user)) => users.contains(user),
            (Self::Whitelist(_), None) => false,
            (Self::Blacklist(users), Some(user)) => !users.contains(user),
            (Self::Blacklist(_), None) => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Whitelist(users) | Self::Blacklist(users) => users.is_empty(),
        }
    }
}
