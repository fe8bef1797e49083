//! CLI entry point for the volbarometer rebalancer.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};

use volbarometer_rebalancer::config::Config;
use volbarometer_rebalancer::error::Error;
use volbarometer_rebalancer::execution::{self, RunOptions};
use volbarometer_rebalancer::server::{self, AppState};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Volatility-regime rebalancer: CBOE term structure → Alpaca")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the target, confirm, and reconcile the account
    Rebalance {
        /// Show plan without executing
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt (for automation/cron)
        #[arg(long)]
        force: bool,
    },

    /// Print the barometer, regime and target allocation
    Barometer,

    /// Show current broker positions
    Positions,

    /// Check broker connection
    Status,

    /// Serve the HTTP trigger
    Serve {
        /// Listen address (default from config)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Listen port (default from config, then $PORT, then 8080)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Rebalance { dry_run, force } => {
            let opts = RunOptions {
                dry_run,
                force,
                ..RunOptions::new("cli")
            };
            execution::run_live(&config, &opts).map(|_| ())
        }
        Command::Barometer => execution::show_barometer(&config),
        Command::Positions => execution::show_positions(&config),
        Command::Status => execution::check_status(&config),
        Command::Serve { host, port } => {
            if let Err(e) = serve(config, host, port) {
                eprintln!("Error: {e:#}");
                process::exit(1);
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        match &e {
            Error::Aborted(msg) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            Error::Busy => {
                eprintln!("Error: {e}");
                process::exit(3);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}

fn serve(config: Config, host: Option<IpAddr>, port: Option<u16>) -> anyhow::Result<()> {
    let ip = match host {
        Some(ip) => ip,
        None => config
            .server
            .host
            .parse()
            .with_context(|| format!("invalid server host {:?}", config.server.host))?,
    };
    let port = port.unwrap_or_else(|| config.server_port());
    // fail before binding if credentials are missing
    config.credentials()?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime
        .block_on(server::serve(AppState::live(config), SocketAddr::new(ip, port)))
        .with_context(|| format!("server on port {port} stopped"))
}
