//! AI gateway CLI — the main entry point.
//!
//! Commands:
//! - `serve` — Load the config and run both HTTP listeners
//! - `check` — Validate a config file and exit
//! - `init`  — Print a starter config TOML

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use aigateway_config::GatewayConfig;

#[derive(Parser)]
#[command(
    name = "aigateway",
    about = "Multi-provider LLM API gateway — one OpenAI-compatible surface over six vendors.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway (public + admin listeners)
    Serve {
        /// Path to the config file
        #[arg(short, long, default_value = "gateway.toml")]
        config: PathBuf,

        /// Override the public port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the admin port
        #[arg(long)]
        admin_port: Option<u16>,
    },

    /// Validate a config file and exit
    Check {
        /// Path to the config file
        #[arg(short, long, default_value = "gateway.toml")]
        config: PathBuf,
    },

    /// Print a starter config TOML to stdout
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve {
            config,
            port,
            admin_port,
        } => {
            let mut loaded = GatewayConfig::load_from(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            if let Some(port) = port {
                loaded.gateway.port = port;
            }
            if let Some(admin_port) = admin_port {
                loaded.gateway.admin_port = admin_port;
            }
            if cli.verbose {
                loaded.gateway.verbose_logging = true;
            }

            aigateway_server::start(loaded)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }

        Commands::Check { config } => {
            // load_from validates, so reaching here means the file is usable.
            let loaded = GatewayConfig::load_from(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            let configured: Vec<String> = loaded
                .providers
                .iter()
                .filter(|(_, s)| s.is_configured())
                .map(|(id, _)| id.to_string())
                .collect();
            println!("config ok — configured providers: {}", configured.join(", "));
        }

        Commands::Init => {
            print!("{}", GatewayConfig::default_toml());
        }
    }

    Ok(())
}
