use std::path::PathBuf;
use std::{env, fs, io};

use anyhow::{Context, Result};
use log::warn;
use serde::de::DeserializeOwned;

use crate::dirs::{ensure_dir_exists, home_dir, is_root};

/// The directories the service reads its configuration from and keeps its
/// data in. Both are created on demand.
pub struct PathSet {
    pub config_path: PathBuf,
    pub data_path: PathBuf,
    pub pki_path: PathBuf,
}

impl PathSet {
    pub fn new(config_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Result<Self> {
        let is_root = is_root();

        let config_path = if let Some(path) = config_path {
            path
        } else if let Ok(path) = env::var("IMGSTORE_CONFIG") {
            PathBuf::from(path)
        } else if is_root {
            PathBuf::from("/etc/imgstore")
        } else {
            home_dir()?.join(".config").join("imgstore")
        };

        let data_path = if let Some(path) = data_path {
            path
        } else if let Ok(path) = env::var("IMGSTORE_DATA") {
            PathBuf::from(path)
        } else if is_root {
            PathBuf::from("/var/lib/imgstore")
        } else {
            home_dir()?.join(".local").join("share").join("imgstore")
        };

        // PKI path is always under config path
        let pki_path = config_path.join("pki");

        ensure_dir_exists(&config_path)
            .with_context(|| format!("ensure config directory: {}", config_path.display()))?;
        ensure_dir_exists(&data_path)
            .with_context(|| format!("ensure data directory: {}", data_path.display()))?;

        Ok(Self {
            config_path,
            data_path,
            pki_path,
        })
    }

    /// Loads `<config_path>/<name>.toml`, falling back to `default_func` when the
    /// file does not exist. The loaded value is always completed (validated).
    pub fn load_config<T, F>(&self, name: &str, default_func: F) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let path = self.config_path.join(format!("{name}.toml"));
        let mut cfg: T = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s)
                .with_context(|| format!("parse config toml: {}", path.display()))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Config file for {name} not found, using defaults");
                default_func()
            }
            Err(err) => {
                return Err(err).context(format!("read config file: {}", path.display()));
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self {
            config_path: PathBuf::from("_test_config"),
            data_path: PathBuf::from("_test_data"),
            pki_path: PathBuf::from("_test_config/pki"),
        }
    }
}

pub trait CommonConfig {
    fn default() -> Self;
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}
