//! Tolk CLI entry point.

use anyhow::Result;
use clap::Parser;
use tolk::cli::{commands, Cli, Commands};
use tolk::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("tolk={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Submit { audio, engine } => {
            commands::run_submit(audio, engine.clone(), settings).await?;
        }

        Commands::Status { transcript_id, wait } => {
            commands::run_status(transcript_id, *wait, settings).await?;
        }

        Commands::Correct { transcript_id } => {
            commands::run_correct(transcript_id, settings)?;
        }

        Commands::Polish { transcript_id, model } => {
            commands::run_polish(transcript_id, model.clone(), settings).await?;
        }

        Commands::Replace {
            segment_id,
            from,
            to,
            remember,
        } => {
            commands::run_replace(segment_id, from, to, *remember, settings)?;
        }

        Commands::Dict { action } => {
            commands::run_dict(action, settings)?;
        }

        Commands::Engines => {
            commands::run_engines(settings)?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }
    }

    Ok(())
}
