use std::sync::Arc;

use anyhow::Result;
use log::error;
use serde::Serialize;

use crate::events::{EventContext, Listener};
use crate::server::listeners::stats::{StatsCounter, StatsSnapshot};
use crate::server::response::Response;
use crate::time::{current_timestamp, format_request_time};
use crate::types::query::ImageQuery;

pub struct IndexHandler;

#[derive(Serialize)]
struct IndexBody {
    site: &'static str,
    version: &'static str,
    routes: &'static [&'static str],
}

impl Listener for IndexHandler {
    fn name(&self) -> &str {
        "index"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let body = IndexBody {
            site: "imgstore",
            version: env!("CARGO_PKG_VERSION"),
            routes: &[
                "/status",
                "/stats",
                "/users/{user}",
                "/users/{user}/images",
                "/images",
                "/users/{user}/images/{image}",
                "/users/{user}/images/{image}/metadata",
                "/users/{user}/images/{image}/shorturls",
                "/users/{user}/images/{image}/shorturls/{id}",
                "/s/{id}",
                "/keys/{publicKey}",
                "/keys/{publicKey}/access",
                "/keys/{publicKey}/access/{ruleId}",
                "/groups",
                "/groups/{name}",
            ],
        };
        ctx.set_response(Response::json(&body));
        Ok(())
    }
}

pub struct StatusHandler;

#[derive(Serialize)]
struct StatusBody {
    date: String,
    database: bool,
}

impl Listener for StatusHandler {
    fn name(&self) -> &str {
        "status"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let database = match ctx.db().with_transaction(|tx, _| tx.count_groups()) {
            Ok(_) => true,
            Err(err) => {
                error!("Database status check failed: {err:#}");
                false
            }
        };
        let body = StatusBody {
            date: format_request_time(current_timestamp()),
            database,
        };
        let resp = if database {
            Response::json(&body)
        } else {
            Response::service_unavailable(&body)
        };
        ctx.set_response(resp);
        Ok(())
    }
}

/// Reports response counters and storage totals.
pub struct StatsHandler {
    counter: Arc<StatsCounter>,
}

#[derive(Serialize)]
struct StatsBody {
    users: usize,
    images: usize,
    responses: StatsSnapshot,
}

impl StatsHandler {
    pub fn new(counter: Arc<StatsCounter>) -> Self {
        Self { counter }
    }
}

impl Listener for StatsHandler {
    fn name(&self) -> &str {
        "stats"
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        let all = ImageQuery::from_pairs(std::iter::empty())?;
        let (users, images) = ctx.db().with_transaction(|tx, _| {
            let users = tx.list_image_users()?.len();
            let images = tx.count_images(&all)?;
            Ok((users, images))
        })?;
        let body = StatsBody {
            users,
            images,
            responses: self.counter.snapshot(),
        };
        ctx.set_response(Response::json(&body));
        Ok(())
    }
}
