use std::sync::Arc;

use anyhow::{Context, Result};
use log::warn;

use crate::acl::factory::AclFactory;
use crate::acl::UnionAccessControl;
use crate::db::factory::DbFactory;
use crate::db::Database;
use crate::events::{EventManager, EventManagerBuilder, EventName, Listener};

use super::config::ServerConfig;
use super::handlers::register_handlers;
use super::listeners::auth::AccessControlListener;
use super::listeners::register_listeners;
use super::listeners::signature::{HmacSignatureVerifier, SignatureVerifier};
use super::listeners::stats::StatsCounter;
use super::pipeline::Pipeline;
use super::restful::RestfulServer;

pub struct ServerFactory {
    cfg: ServerConfig,
    db: Arc<Database>,
    acl: Arc<UnionAccessControl>,
}

impl ServerFactory {
    pub fn new(cfg: ServerConfig) -> Result<Self> {
        let db_factory = DbFactory::new();
        let db = db_factory.build_db(&cfg.db).context("init database")?;

        let acl_factory = AclFactory::new(db.clone());
        let acl = acl_factory
            .build_acl(&cfg.acl)
            .context("init access control")?;

        Ok(Self { cfg, db, acl })
    }

    pub fn build_server(&self) -> Result<RestfulServer> {
        let pipeline = self.build_pipeline()?;
        let mut srv = RestfulServer::new(
            self.cfg.bind.clone(),
            Arc::new(pipeline),
            self.cfg.payload_limit_mib,
        );
        if self.cfg.ssl {
            srv.set_ssl(self.cfg.build_ssl()?);
        }
        if let Some(keep_alive_secs) = self.cfg.keep_alive_secs {
            srv.set_keep_alive_secs(keep_alive_secs);
        }
        if let Some(workers) = self.cfg.workers {
            srv.set_workers(workers);
        }
        Ok(srv)
    }

    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let events = self.build_events()?;
        Ok(Pipeline::new(events, self.acl.clone(), self.db.clone()))
    }

    /// Registers the access-control listener, the configured listeners and
    /// one handler per resource.
    pub fn build_events(&self) -> Result<EventManager> {
        let verifier: Option<Arc<dyn SignatureVerifier>> = if self.cfg.auth.verify_signatures {
            Some(Arc::new(HmacSignatureVerifier::new(
                self.cfg.auth.max_skew_secs,
                self.cfg.auth.require_access_token,
            )))
        } else {
            warn!("Signature verification is disabled, requests are authorized by public key alone");
            None
        };
        let auth: Arc<dyn Listener> = Arc::new(AccessControlListener::new(
            self.cfg.auth.allow_resources().clone(),
            verifier,
        ));

        let stats = Arc::new(StatsCounter::default());
        let mut builder = EventManagerBuilder::new();
        builder
            .add_listener(
                [EventName::RequestAuthorize],
                AccessControlListener::PRIORITY,
                auth,
            )
            .context("register access control")?;
        register_listeners(&mut builder, &self.cfg.listeners, &stats)
            .context("register listeners")?;
        register_handlers(&mut builder, stats).context("register handlers")?;

        Ok(builder.build())
    }

    pub fn acl(&self) -> &Arc<UnionAccessControl> {
        &self.acl
    }
}
