// picotool MCP Server - Main Entry Point
//
// Serves picotool operations as MCP tools over stdio. stdout carries the
// JSON-RPC stream; every log line goes to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use picotool_mcp::config::Config;
use picotool_mcp::logging::{self, LogFormat};
use picotool_mcp::mcp::{self, tools, McpServer};
use picotool_mcp::picotool::{Executor, PicotoolBinary};
use std::path::PathBuf;
use tracing::info;

/// picotool MCP server: drive Raspberry Pi Pico devices from MCP clients
#[derive(Parser, Debug)]
#[command(name = "picotool-mcp")]
#[command(version)]
#[command(about = "MCP server exposing the Raspberry Pi picotool utility", long_about = None)]
struct Args {
    /// Path to a TOML config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// picotool binary to run instead of searching PATH
    #[arg(long)]
    picotool_path: Option<PathBuf>,

    /// Kill picotool commands running longer than this many seconds (0 disables)
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Serve MCP requests on stdin/stdout (default)
    Serve,
    /// Print the tool catalog as JSON and exit
    ListTools,
}

impl Args {
    /// Layer command-line flags over the loaded configuration.
    fn apply_to(&self, mut config: Config) -> Config {
        if let Some(path) = &self.picotool_path {
            config.picotool.path = Some(path.clone());
        }
        if let Some(secs) = self.timeout {
            config.picotool.timeout_secs = secs;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    let config = args.apply_to(config);
    config.validate()?;

    let level = logging::effective_level(config.log_level()?, args.verbose);
    logging::init(level, LogFormat::parse(&config.logging.format)?)?;

    match args.command.unwrap_or(Commands::Serve) {
        Commands::ListTools => {
            let catalog = serde_json::to_string_pretty(&tools::catalog())
                .context("Failed to serialize tool catalog")?;
            println!("{}", catalog);
        }
        Commands::Serve => {
            info!("picotool MCP server v{} starting", env!("CARGO_PKG_VERSION"));

            let binary = PicotoolBinary::resolve(config.picotool.path.as_deref());
            let executor = Executor::new(binary).with_timeout(config.picotool.timeout());
            info!(
                "Using picotool: {} (timeout: {:?})",
                executor.binary(),
                executor.timeout()
            );

            let (reader, writer) = mcp::stdio();
            McpServer::new(executor).serve(reader, writer).await?;

            info!("Client closed the connection, shutting down");
        }
    }

    Ok(())
}
