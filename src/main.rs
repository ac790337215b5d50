//! Skribent CLI entry point.

use anyhow::Result;
use clap::Parser;
use skribent::cli::{commands, Cli, Commands};
use skribent::config::Settings;
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
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("skribent={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Run {
            video,
            keyword,
            styles,
            language,
            force_transcript,
            force_regenerate,
        } => {
            commands::run_pipeline(
                video,
                keyword,
                styles,
                language.clone(),
                *force_transcript,
                *force_regenerate,
                settings,
            )
            .await?;
        }

        Commands::Status => {
            commands::run_status(settings)?;
        }

        Commands::Articles { video } => {
            commands::run_articles(video.as_deref(), settings)?;
        }
    }

    Ok(())
}
