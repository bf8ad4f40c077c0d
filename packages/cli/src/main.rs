use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "skyhook", about = "Skyhook CLI - Deploy agent workloads to a hosted runtime")]
#[command(version, propagate_version = true)]
struct Cli {
    /// Path to configuration file (default: ~/.skyhook/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare an agent for deployment
    Prepare {
        /// Source directory to stage
        source_dir: PathBuf,

        /// Service region
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Deploy a prepared bundle to the runtime service
    Deploy {
        /// Bundle directory produced by prepare
        bundle_dir: PathBuf,

        /// Service region
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Invoke a deployed agent
    Invoke {
        /// Agent name
        agent_name: String,

        /// Message to send
        message: String,

        /// Print response chunks as they arrive
        #[arg(short, long)]
        stream: bool,

        /// Service region
        #[arg(short, long)]
        region: Option<String>,
    },

    /// Delete a deployed runtime
    Delete {
        /// Agent name
        agent_name: String,

        /// Also delete the execution identity
        #[arg(long)]
        delete_identity: bool,

        /// Service region
        #[arg(short, long)]
        region: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Prepare { source_dir, region } => {
            let config = config::resolve(cli.config, region)?;
            commands::prepare::run(config, &source_dir).await
        }
        Commands::Deploy { bundle_dir, region } => {
            let config = config::resolve(cli.config, region)?;
            commands::deploy::run(config, &bundle_dir).await
        }
        Commands::Invoke {
            agent_name,
            message,
            stream,
            region,
        } => {
            let config = config::resolve(cli.config, region)?;
            commands::invoke::run(config, &agent_name, &message, stream).await
        }
        Commands::Delete {
            agent_name,
            delete_identity,
            region,
        } => {
            let config = config::resolve(cli.config, region)?;
            commands::delete::run(config, &agent_name, delete_identity).await
        }
    }
}
