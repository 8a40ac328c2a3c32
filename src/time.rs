#[cfg(test)]
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Format of request timestamps used by signed requests, always UTC.
pub const REQUEST_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[cfg(test)]
static MOCK_TIME: once_cell::sync::Lazy<Mutex<u64>> =
    once_cell::sync::Lazy::new(|| Mutex::new(Utc::now().timestamp() as u64));

#[cfg(test)]
pub fn advance_mock_time(seconds: u64) {
    let mut guard = MOCK_TIME.lock().unwrap();
    *guard += seconds;
}

#[cfg(test)]
pub fn current_timestamp() -> u64 {
    *MOCK_TIME.lock().unwrap()
}

#[cfg(not(test))]
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

pub fn format_request_time(timestamp: u64) -> String {
    match DateTime::<Utc>::from_timestamp(timestamp as i64, 0) {
        Some(time) => time.format(REQUEST_TIME_FORMAT).to_string(),
        None => String::new(),
    }
}

pub fn parse_request_time(s: &str) -> Result<u64> {
    let time = NaiveDateTime::parse_from_str(s, REQUEST_TIME_FORMAT)
        .with_context(|| format!("invalid request timestamp '{s}'"))?;
    let timestamp = time.and_utc().timestamp();
    if timestamp < 0 {
        anyhow::bail!("request timestamp '{s}' is before the unix epoch");
    }
    Ok(timestamp as u64)
}
