use std::env;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;

pub mod config;
pub mod crawler;
pub mod database;
pub mod logging;
pub mod poller;
pub mod util;

/// Periodically fetches a ticker quote and stores it in the `prices` table.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// path to config file
    #[arg(short = 'c', long = "config", default_value = crate::config::DEFAULT_CONFIG_PATH)]
    config: String,
}

impl Args {
    fn parse_from_env() -> Self {
        Self::parse_args(env::args())
    }

    /// Accepts the single-dash `-config` spelling alongside `--config` and `-c`.
    fn parse_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Args::parse_from(args.into_iter().map(|arg| {
            if arg == "-config" || arg.starts_with("-config=") {
                format!("-{}", arg)
            } else {
                arg
            }
        }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse_from_env();

    logging::info_console(format!("Using config file {}", args.config));
    let app = crate::config::App::load(&args.config)
        .with_context(|| format!("Failure reading config file {}, stopping", args.config))?;
    logging::info_console(format!("Proceeding with config settings {:?}", app));

    let db = database::MySql::connect(&app.database)
        .await
        .context("Failed to open the database")?;
    logging::info_file_async("DB init OK".to_string());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let polling = tokio::spawn(poller::start(app, db, shutdown_rx));

    logging::info_console("Main: waiting for poll to finish".to_string());
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for the shutdown signal")?;

    logging::info_console("Received Ctrl+C, stopping the poller".to_string());
    shutdown_tx.send(true).ok();
    polling.await.context("The poller task panicked")?;

    logging::info_console("Exiting".to_string());
    Ok(())
}
