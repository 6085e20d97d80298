//! Kanban Board Server
//!
//! HTTP API for per-user kanban boards with regex-driven link automation.

use anyhow::Result;
use clap::Parser;
use kanban_board::api::{AppState, start_server};
use kanban_board::automation::{AutomationEngine, ExecutionCache};
use kanban_board::cli::rules::run_rules;
use kanban_board::cli::{Cli, Command};
use kanban_board::config::{Config, ConfigLoader};
use kanban_board::db::Database;
use kanban_board::logging::{self, LogTarget};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::load_file(path)?,
        None => ConfigLoader::load()?,
    };
    for (tier, path) in loader.sources() {
        info!("Loaded {} config from {:?}", tier, path);
    }

    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    let config = loader.into_config();

    config.ensure_db_dir()?;
    let db = Arc::new(Database::open(&config.server.db_path)?);
    info!("Database: {:?}", config.server.db_path);

    let cache = Arc::new(ExecutionCache::new(config.automation.cache_capacity));
    let engine =
        AutomationEngine::new(db.clone(), cache).with_limits(config.automation.limits());

    match cli.command {
        Some(Command::Rules(command)) => {
            let mut stdout = std::io::stdout().lock();
            run_rules(db, &engine, command, &mut stdout).await?;
        }
        Some(Command::Serve) | None => {
            run_server(config, db, engine).await?;
        }
    }

    Ok(())
}

async fn run_server(config: Config, db: Arc<Database>, engine: AutomationEngine) -> Result<()> {
    info!("Starting Kanban Board v{}", env!("CARGO_PKG_VERSION"));
    if !config.automation.enabled {
        info!("Link automation disabled");
    }

    let state = AppState::new(db, engine)
        .with_automation_enabled(config.automation.enabled)
        .with_default_columns(config.board.default_columns);
    let handle = start_server(state, config.server.bind_addr()).await?;
    info!("Listening on http://{}", handle.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown().await;

    Ok(())
}
