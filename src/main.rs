//! Task Tracker
//!
//! A personal task tracker: REST API over SQLite, an embedded browser client,
//! and an insights summary of open work.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use task_tracker::cli::{Cli, Command, InsightsArgs, ServeArgs};
use task_tracker::config::Config;
use task_tracker::dashboard;
use task_tracker::db::Database;
use task_tracker::format::format_insights;
use task_tracker::insights::{compute_insights, today};
use task_tracker::logging::{LogTarget, init_tracing};
use tracing::{debug, info};

/// Open the configured database, creating its directory if needed.
fn open_database(config: &Config) -> Result<Database> {
    config
        .ensure_db_dir()
        .with_context(|| format!("creating directory for {}", config.server.db_path.display()))?;
    let db = Database::open(&config.server.db_path)
        .with_context(|| format!("opening database {}", config.server.db_path.display()))?;
    info!(path = %config.server.db_path.display(), "Database opened");
    Ok(db)
}

async fn serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let db = Arc::new(open_database(&config)?);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let (shutdown_tx, _bound_addr, handle) = dashboard::start_server(db, addr).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");

    let _ = shutdown_tx.send(());
    handle.await?;

    Ok(())
}

fn print_insights(config: &Config, args: InsightsArgs) -> Result<()> {
    let db = open_database(config)?;
    let reference_date = args.date.unwrap_or_else(today);
    let summary = compute_insights(&db, reference_date)?;
    print!("{}", format_insights(&summary, args.format)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    init_tracing(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = Config::resolve(cli.config.as_deref())?;

    // Override paths from CLI arguments
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.clone();
    }
    debug!(?config, "Configuration resolved");

    match cli.command.unwrap_or_default() {
        Command::Serve(args) => serve(config, args).await,
        Command::Insights(args) => print_insights(&config, args),
    }
}
