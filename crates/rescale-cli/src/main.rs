//! Rescale CLI: process storage upload events one at a time or serve them over HTTP.
//!
//! Configuration comes from the environment (and `.env`); see `Config::from_env`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use rescale_cli::{outcome_body, read_event, server};
use rescale_core::Config;
use rescale_processing::Pipeline;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rescale", about = "Rescale uploaded images and publish them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single upload event
    Process {
        /// Path to the event JSON (reads stdin when omitted)
        #[arg(long)]
        event: Option<PathBuf>,
    },
    /// Accept upload events on POST /events
    Serve {
        /// Listen port (defaults to SERVER_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    rescale_infra::init_telemetry("rescale", config.base.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
    config.validate().context("Invalid configuration")?;

    let pipeline = Pipeline::from_config(&config)
        .await
        .context("Failed to set up pipeline")?;

    match cli.command {
        Commands::Process { event } => {
            let event = read_event(event.as_deref()).await?;
            let outcome = pipeline
                .process_event(&event)
                .await
                .with_context(|| format!("Failed to process {}/{}", event.bucket, event.name))?;
            print_json(&outcome_body(&outcome)?)?;
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.base.server_port);
            server::start_server(port, server::router(pipeline)).await?;
        }
    }

    Ok(())
}
