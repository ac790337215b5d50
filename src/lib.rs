//! Skribent - Video to Article Pipeline
//!
//! Turns YouTube videos into styled written articles through a
//! resumable, idempotent multi-stage pipeline.
//!
//! The name "Skribent" comes from the Norwegian/Scandinavian word for
//! "writer."
//!
//! # Overview
//!
//! Skribent allows you to:
//! - Download a video's media, metadata, and native captions
//! - Resolve a transcript from captions or speech-to-text
//! - Analyze the transcript into sections, key points, and an outline
//! - Generate articles in several styles (blog, wiki, listicle, deep-dive)
//!
//! Every stage persists its output before the next one starts, so a
//! crashed or cancelled run resumes from the first incomplete stage.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `media` - Media acquisition (yt-dlp, ffmpeg)
//! - `transcript` - Transcript resolution (captions vs. Whisper)
//! - `analyze` - Content analysis
//! - `generate` - Style-specific article generation
//! - `pipeline` - Orchestration, retries, resumability
//! - `store` - The relational store (keywords, videos, transcripts, articles)
//!
//! # Example
//!
//! ```rust,no_run
//! use skribent::config::Settings;
//! use skribent::generate::ArticleStyle;
//! use skribent::pipeline::{CancelToken, Orchestrator, WorkRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let request = WorkRequest {
//!         video_ref: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
//!         keyword: "classic videos".into(),
//!         styles: vec![ArticleStyle::Blog, ArticleStyle::Listicle],
//!         language: None,
//!         force_transcript: false,
//!         force_regenerate: false,
//!     };
//!
//!     let report = orchestrator.process(&request, &CancelToken::new()).await?;
//!     println!("Generated {} article(s)", report.generated_count());
//!
//!     Ok(())
//! }
//! ```

pub mod analyze;
pub mod cli;
pub mod config;
pub mod error;
pub mod generate;
pub mod media;
pub mod openai;
pub mod pipeline;
pub mod region;
pub mod store;
pub mod transcript;

pub use error::{Result, SkribentError};
