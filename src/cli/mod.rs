//! CLI module for Skribent.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Skribent - Video to Article Pipeline
///
/// Turns YouTube videos into styled written articles. The name
/// "Skribent" comes from the Norwegian/Scandinavian word for "writer."
#[derive(Parser, Debug)]
#[command(name = "skribent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Skribent and write the default configuration
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Run the pipeline for one video
    Run {
        /// YouTube URL or bare video ID
        video: String,

        /// Keyword the video belongs to
        #[arg(short, long)]
        keyword: String,

        /// Comma-separated styles to generate (blog, wiki, listicle, deep-dive)
        #[arg(short, long, default_value = "blog")]
        styles: String,

        /// Article language (defaults to the video's native language)
        #[arg(short, long)]
        language: Option<String>,

        /// Supersede any existing transcript and re-resolve
        #[arg(long)]
        force_transcript: bool,

        /// Supersede existing articles and regenerate
        #[arg(long)]
        force_regenerate: bool,
    },

    /// Show pipeline runs and their stages
    Status,

    /// List generated articles
    Articles {
        /// Restrict to one video (YouTube ID)
        #[arg(short, long)]
        video: Option<String>,
    },
}
