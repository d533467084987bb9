//! Ballot CLI
//!
//! Runs the poll bot against stdin/stdout: one JSON interaction per input
//! line, one JSON response per output line. Logs go to stderr.

mod console;

use anyhow::{Context, Result};
use ballot_bot::{dispatch, Interaction, LifecycleController};
use ballot_config::{BotConfig, LogFormat};
use ballot_core::{humanize, parse_duration};
use clap::{Parser, Subcommand};
use console::ConsoleSurface;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ballot")]
#[command(about = "Chat poll bot: create polls, toggle votes, close on expiry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read interactions from stdin and dispatch them
    Run {
        /// Config file (defaults to $BALLOT_CONFIG or the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Extra administrator user ID (repeatable)
        #[arg(long = "admin")]
        admins: Vec<String>,
    },

    /// Print the effective configuration
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Parse a poll duration and print it
    ParseDuration {
        /// e.g. 1d, 2w, 90s, "1.5 hours"
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, admins } => {
            let mut config = load_config(config)?;
            config.admins.extend(admins);
            init_tracing(&config)?;
            run(config).await
        }
        Commands::Config { config } => {
            let config = load_config(config)?;
            print!("{}", config.to_yaml().context("Failed to serialize config")?);
            Ok(())
        }
        Commands::ParseDuration { text } => {
            let duration = parse_duration(&text)?;
            println!("{} ms ({})", duration.as_millis(), humanize(duration));
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<BotConfig> {
    BotConfig::load(path.as_deref()).context("Failed to load configuration")
}

fn init_tracing(config: &BotConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter)
            .with_context(|| format!("Invalid log filter: {}", config.log_filter))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
}

async fn run(config: BotConfig) -> Result<()> {
    let controller = LifecycleController::from_config(&config, Arc::new(ConsoleSurface));
    tracing::info!(admins = config.admins.len(), "ballot bot ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let interaction: Interaction = match serde_json::from_str(line) {
            Ok(interaction) => interaction,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed interaction");
                continue;
            }
        };

        let response = dispatch(&controller, interaction).await;
        println!("{}", serde_json::to_string(&response)?);
    }

    let open = controller.active_polls().await;
    tracing::info!(open_polls = open.len(), "shutting down");
    controller.shutdown();
    Ok(())
}
