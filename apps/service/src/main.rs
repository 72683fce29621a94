use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

mod config;
mod database;
mod monitoring;
mod notify;
mod orchestrator;
mod pool;

use config::Config;
use database::models::Endpoint;
use database::{LibsqlRepository, Repository};
use orchestrator::Orchestrator;

#[derive(Debug, Parser)]
#[command(name = "ping", version, about = "Probe monitored pages and alert on incidents")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/ping/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a monitoring pass
    Run {
        /// Keep running, starting a pass every SECONDS
        #[arg(long, value_name = "SECONDS")]
        every: Option<u64>,
    },
    /// Register a page to monitor
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// Minutes between probes
        #[arg(long, default_value_t = 5)]
        interval: u32,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        rescue_url: Option<String>,
    },
    /// Show recent probes of a page
    History {
        id: Uuid,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref())?;
    logger::init_tracing(&config.logging.level);

    if let Command::Config = cli.command {
        println!("{config}");
        return Ok(());
    }

    let pool = pool::open_pool(&config.database.path, config.database.max_connections).await?;
    {
        let conn = pool.get().await?;
        database::initialize_database(&conn).await?;
    }
    let repository = Arc::new(LibsqlRepository::new(pool.clone()));

    let result = match cli.command {
        Command::Run { every } => run(&config, repository, every).await,
        Command::Add { name, url, interval, description, rescue_url } => {
            if interval == 0 {
                bail!("interval must be at least one minute");
            }
            let mut endpoint = Endpoint::new(name, url, interval);
            endpoint.description = description;
            endpoint.rescue_url = rescue_url;
            repository.upsert_endpoint(&endpoint).await?;
            println!("{}", endpoint.id);
            Ok(())
        }
        Command::History { id, limit } => {
            let Some(endpoint) = repository.get_endpoint(id).await? else {
                bail!("no endpoint with id {id}");
            };
            println!("{} ({}) last status: {}", endpoint.name, endpoint.url, display_status(&endpoint));
            for entry in repository.history_for(id, limit).await? {
                println!("{}  {:>11}  {:.3}s", entry.created_at.to_rfc3339(), entry.status.to_string(), entry.load_seconds);
            }
            Ok(())
        }
        Command::Config => Ok(()),
    };

    pool.close();
    result
}

fn display_status(endpoint: &Endpoint) -> String {
    endpoint.last_status.map(|status| status.to_string()).unwrap_or_else(|| "never probed".to_string())
}

async fn run(config: &Config, repository: Arc<LibsqlRepository>, every: Option<u64>) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config, repository)?;

    match every {
        Some(seconds) => {
            let period = Duration::from_secs(seconds.max(1));
            info!(period_seconds = period.as_secs(), "Monitoring loop started");
            tokio::select! {
                _ = orchestrator.run_forever(period) => {}
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
            }
        }
        None => {
            orchestrator.run_once().await?;
        }
    }

    Ok(())
}
