use anyhow::{Context, Result};
use clap::Args;
use log::info;

use crate::server::factory::ServerFactory;

use super::ConfigArgs;

/// Start the image server.
#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl ServeArgs {
    pub async fn run(&self) -> Result<()> {
        let cfg = self.config.load()?;
        cfg.logs.init().context("init logs")?;
        info!("Starting imgstore {}", env!("CARGO_PKG_VERSION"));

        let factory = ServerFactory::new(cfg)?;
        let srv = factory.build_server()?;
        srv.run().await
    }
}
