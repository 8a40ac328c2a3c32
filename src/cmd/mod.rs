mod check;
mod serve;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::config::{CommonConfig, PathSet};
use crate::server::config::ServerConfig;

#[derive(Parser)]
#[command(author, version, about)]
pub struct App {
    #[command(subcommand)]
    pub commands: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Serve(serve::ServeArgs),
    Check(check::CheckArgs),
}

impl App {
    pub async fn run(&self) -> Result<()> {
        match &self.commands {
            Commands::Serve(args) => args.run().await,
            Commands::Check(args) => args.run(),
        }
    }
}

#[derive(Args)]
pub struct ConfigArgs {
    /// The config directory, `server.toml` is loaded from it.
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// The data directory, the default database file lives in it.
    #[arg(long)]
    pub data_path: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<ServerConfig> {
        let ps = PathSet::new(self.config_path.clone(), self.data_path.clone())?;
        ps.load_config("server", ServerConfig::default)
    }
}
