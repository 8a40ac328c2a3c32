use std::process::ExitCode;

use clap::Parser;
use imgstore::cmd::App;
use log::error;

#[tokio::main]
async fn main() -> ExitCode {
    let app = App::parse();
    match app.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
