use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslMethod};
use serde::{Deserialize, Serialize};

use crate::acl::config::AclConfig;
use crate::acl::resource::{expand_resource_spec, Resource};
use crate::config::{expandenv, CommonConfig, PathSet};
use crate::db::config::DbConfig;
use crate::logs::LogConfig;

use super::listeners::{default_listeners, ListenerConfig};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,

    /// Serve https with `key.pem` and `cert.pem` from the pki directory.
    #[serde(default)]
    pub ssl: bool,

    pub keep_alive_secs: Option<u64>,

    pub workers: Option<u64>,

    #[serde(default = "ServerConfig::default_payload_limit_mib")]
    pub payload_limit_mib: usize,

    #[serde(default = "LogConfig::default")]
    pub logs: LogConfig,

    #[serde(default = "DbConfig::default")]
    pub db: DbConfig,

    #[serde(default = "AclConfig::default")]
    pub acl: AclConfig,

    #[serde(default = "AuthConfig::default")]
    pub auth: AuthConfig,

    #[serde(default = "default_listeners")]
    pub listeners: Vec<ListenerConfig>,

    #[serde(skip)]
    pki_dir: PathBuf,
}

/// Authorization of incoming requests.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// Resources (or `read-only`, `read-write`, `all`) served without
    /// authorization.
    #[serde(default = "AuthConfig::default_allow_list")]
    pub allow_list: Vec<String>,

    /// Verify request signatures of write requests.
    #[serde(default = "AuthConfig::default_verify_signatures")]
    pub verify_signatures: bool,

    /// Require an access token on read requests. Only takes effect when
    /// signatures are verified, turning verification off authorizes every
    /// request by its public key alone.
    #[serde(default = "AuthConfig::default_require_access_token")]
    pub require_access_token: bool,

    /// Accepted distance between a signed timestamp and now.
    #[serde(default = "AuthConfig::default_max_skew_secs")]
    pub max_skew_secs: u64,

    #[serde(skip)]
    allow_resources: BTreeSet<Resource>,
}

impl CommonConfig for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            ssl: false,
            keep_alive_secs: None,
            workers: None,
            payload_limit_mib: Self::default_payload_limit_mib(),
            logs: LogConfig::default(),
            db: DbConfig::default(),
            acl: AclConfig::default(),
            auth: AuthConfig::default(),
            listeners: default_listeners(),
            pki_dir: PathBuf::new(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.bind = expandenv("bind", &self.bind)?;
        if self.bind.is_empty() {
            bail!("bind cannot be empty");
        }

        if let Some(keep_alive_secs) = self.keep_alive_secs {
            if keep_alive_secs == 0 {
                bail!("keep_alive_secs must be greater than 0");
            }
        }
        if let Some(workers) = self.workers {
            if workers == 0 {
                bail!("workers must be greater than 0");
            }
        }
        if self.payload_limit_mib < Self::MIN_PAYLOAD_LIMIT_MIB
            || self.payload_limit_mib > Self::MAX_PAYLOAD_LIMIT_MIB
        {
            bail!(
                "payload_limit_mib must be in range [{}, {}]",
                Self::MIN_PAYLOAD_LIMIT_MIB,
                Self::MAX_PAYLOAD_LIMIT_MIB
            );
        }

        self.logs.complete(ps).context("logs")?;
        self.db.complete(ps).context("db")?;
        self.acl.complete(ps).context("acl")?;
        self.auth.complete(ps).context("auth")?;

        for (idx, listener) in self.listeners.iter().enumerate() {
            listener
                .validate()
                .with_context(|| format!("listeners[{idx}]"))?;
        }

        self.pki_dir = ps.pki_path.clone();
        Ok(())
    }
}

impl ServerConfig {
    const MIN_PAYLOAD_LIMIT_MIB: usize = 1;
    const MAX_PAYLOAD_LIMIT_MIB: usize = 100;

    pub fn build_ssl(&self) -> Result<SslAcceptorBuilder> {
        let key_path = self.pki_dir.join("key.pem");
        if !key_path.exists() {
            bail!("ssl key file not exists: {:?}", key_path);
        }

        let cert_path = self.pki_dir.join("cert.pem");
        if !cert_path.exists() {
            bail!("ssl cert file not exists: {:?}", cert_path);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&key_path, openssl::ssl::SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&cert_path)
            .context("load ssl cert file")?;

        Ok(builder)
    }

    /// A copy that is safe to print: private keys are masked.
    pub fn masked(&self) -> Self {
        let mut cfg = self.clone();
        for pair in cfg.acl.keys.iter_mut() {
            pair.private_key = String::from("******");
        }
        cfg
    }

    fn default_bind() -> String {
        String::from("127.0.0.1:7703")
    }

    fn default_payload_limit_mib() -> usize {
        10
    }
}

impl CommonConfig for AuthConfig {
    fn default() -> Self {
        Self {
            allow_list: Self::default_allow_list(),
            verify_signatures: Self::default_verify_signatures(),
            require_access_token: Self::default_require_access_token(),
            max_skew_secs: Self::default_max_skew_secs(),
            allow_resources: BTreeSet::new(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        let mut resources = BTreeSet::new();
        for spec in self.allow_list.iter() {
            let expanded = expand_resource_spec(spec).context("allow_list")?;
            resources.extend(expanded);
        }
        self.allow_resources = resources;

        if self.max_skew_secs == 0 {
            bail!("max_skew_secs must be greater than 0");
        }
        Ok(())
    }
}

impl AuthConfig {
    /// The resolved allow list, valid after `complete`.
    pub fn allow_resources(&self) -> &BTreeSet<Resource> {
        &self.allow_resources
    }

    fn default_allow_list() -> Vec<String> {
        [
            Resource::IndexGet,
            Resource::IndexHead,
            Resource::StatusGet,
            Resource::StatusHead,
            Resource::GlobalShortUrlGet,
            Resource::GlobalShortUrlHead,
        ]
        .iter()
        .map(|r| r.to_string())
        .collect()
    }

    fn default_verify_signatures() -> bool {
        true
    }

    fn default_require_access_token() -> bool {
        true
    }

    fn default_max_skew_secs() -> u64 {
        120
    }
}

#[cfg(test)]
impl ServerConfig {
    pub fn new_test() -> Self {
        let mut cfg = <Self as CommonConfig>::default();
        cfg.db = DbConfig::new_test();
        cfg.complete(&PathSet::new_test()).unwrap();
        cfg
    }
}
