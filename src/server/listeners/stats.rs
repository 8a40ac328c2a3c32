use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::events::{EventContext, Listener};

/// Response counters, grouped by status class.
#[derive(Default)]
pub struct StatsCounter {
    total: AtomicU64,
    classes: [AtomicU64; 5],
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StatsSnapshot {
    pub total: u64,
    #[serde(rename = "1xx")]
    pub informational: u64,
    #[serde(rename = "2xx")]
    pub success: u64,
    #[serde(rename = "3xx")]
    pub redirection: u64,
    #[serde(rename = "4xx")]
    pub client_error: u64,
    #[serde(rename = "5xx")]
    pub server_error: u64,
}

impl StatsCounter {
    pub fn record(&self, status: u16) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let class = (status / 100) as usize;
        if (1..=5).contains(&class) {
            self.classes[class - 1].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |i: usize| self.classes[i].load(Ordering::Relaxed);
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            informational: get(0),
            success: get(1),
            redirection: get(2),
            client_error: get(3),
            server_error: get(4),
        }
    }
}

/// Counts every response on `response.send`.
pub struct StatsListener {
    counter: Arc<StatsCounter>,
}

impl StatsListener {
    pub const NAME: &'static str = "stats";

    pub fn new(counter: Arc<StatsCounter>) -> Self {
        Self { counter }
    }
}

impl Listener for StatsListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        if let Some(resp) = ctx.response() {
            self.counter.record(resp.status().as_u16());
        }
        Ok(())
    }
}
