use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::acl::Resource;
use crate::events::{EventManager, EventName};
use crate::server::config::ServerConfig;
use crate::server::factory::ServerFactory;

use super::ConfigArgs;

/// Validate the configuration, build the access control and the listener
/// table, then print them as JSON. Private keys are masked.
#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    config: ServerConfig,
    access_control: &'a str,
    listeners: BTreeMap<String, Vec<&'a str>>,
}

impl CheckArgs {
    pub fn run(&self) -> Result<()> {
        let cfg = self.config.load()?;
        let masked = cfg.masked();

        let factory = ServerFactory::new(cfg)?;
        let events = factory.build_events().context("build listener table")?;

        let output = CheckOutput {
            config: masked,
            access_control: factory.acl().name(),
            listeners: listener_table(&events),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

/// Listener names of every event that has any, in the order they run.
fn listener_table(events: &EventManager) -> BTreeMap<String, Vec<&str>> {
    let names = [EventName::RouteMatch, EventName::RequestAuthorize]
        .into_iter()
        .chain(Resource::ALL.iter().map(|r| EventName::Resource(*r)))
        .chain([EventName::ResponseSend]);

    let mut table = BTreeMap::new();
    for name in names {
        let listeners = events.listener_names(name);
        if !listeners.is_empty() {
            table.insert(name.to_string(), listeners);
        }
    }
    table
}
