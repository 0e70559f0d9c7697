//! Muster binary entry point: parse the boot-time parameters, set up
//! logging, and dispatch to the requested flow.
//!
//! Progress is communicated only through append-only logs; there is no
//! structured status reporting beyond log lines.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use muster::arbiter::{self, ArbiterConfig};
use muster::bootstrap;
use muster::cli::{Cli, Command};
use muster::config::BootstrapConfig;
use muster::replica::{self, ReplicaConfig};
use muster::supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs)?;

    info!("Starting Muster v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Bootstrap(args) => {
            let config = BootstrapConfig::load(&cli.config, &args)?;
            bootstrap::run(config).await?;
            info!("Bootstrap complete, agent handed off");
            Ok(())
        }
        Command::Replica(args) => {
            let config = ReplicaConfig::from_args(&args);
            replica::run(&config)
        }
        Command::Arbiter(args) => {
            let config = ArbiterConfig::from_args(&args);
            arbiter::run(&config)
        }
        Command::Supervise(args) => {
            let spec = args.into_spec()?;
            supervisor::run_loop(&spec)
        }
    }
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}
