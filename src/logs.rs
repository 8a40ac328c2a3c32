use std::fs::OpenOptions;
use std::io::{self, IsTerminal};

use anyhow::{bail, Context, Result};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_target")]
    pub target: LogTarget,

    #[serde(default = "LogConfig::default_level")]
    pub level: String,

    /// Log file path, only used when target is `file`. Defaults to
    /// `<data_path>/imgstore.log`.
    #[serde(default)]
    pub file: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub enum LogTarget {
    #[serde(rename = "stdout")]
    Stdout,
    #[serde(rename = "stderr")]
    Stderr,
    #[serde(rename = "file")]
    File,
}

impl CommonConfig for LogConfig {
    fn default() -> Self {
        Self {
            target: Self::default_target(),
            level: Self::default_level(),
            file: String::new(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        parse_level(&self.level)?;
        if self.target == LogTarget::File && self.file.is_empty() {
            let path = ps.data_path.join("imgstore.log");
            self.file = format!("{}", path.display());
        }
        Ok(())
    }
}

impl LogConfig {
    pub fn default_target() -> LogTarget {
        LogTarget::Stdout
    }

    pub fn default_level() -> String {
        String::from("info")
    }

    pub fn init(&self) -> Result<()> {
        let level = parse_level(&self.level)?;

        let colored = match self.target {
            LogTarget::Stdout => io::stdout().is_terminal(),
            LogTarget::Stderr => io::stderr().is_terminal(),
            LogTarget::File => false,
        };
        let colors = ColoredLevelConfig::new()
            .info(Color::Green)
            .debug(Color::Magenta);

        let dispatch = fern::Dispatch::new()
            .format(move |out, message, record| {
                let now = humantime::format_rfc3339_millis(std::time::SystemTime::now());
                if colored {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        now,
                        colors.color(record.level()),
                        message
                    ))
                } else {
                    out.finish(format_args!("{} [{}] {}", now, record.level(), message))
                }
            })
            .level(level);

        let dispatch = match self.target {
            LogTarget::Stdout => dispatch.chain(io::stdout()),
            LogTarget::Stderr => dispatch.chain(io::stderr()),
            LogTarget::File => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.file)
                    .with_context(|| format!("open log file '{}'", self.file))?;
                dispatch.chain(file)
            }
        };

        dispatch.apply().context("init logger")?;
        Ok(())
    }
}

fn parse_level(level: &str) -> Result<LevelFilter> {
    Ok(match level {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        _ => bail!("unknown log level '{}'", level),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete() {
        let ps = PathSet::new_test();

        let mut cfg = LogConfig::default();
        cfg.complete(&ps).unwrap();
        assert!(cfg.file.is_empty(), "stdout target needs no file");

        cfg.target = LogTarget::File;
        cfg.complete(&ps).unwrap();
        assert!(cfg.file.ends_with("imgstore.log"));

        cfg.level = String::from("verbose");
        assert!(cfg.complete(&ps).is_err(), "unknown level must be rejected");
    }
}
