//! Relational store for Skribent.
//!
//! Four durable tables (keywords, videos, transcripts, articles) plus the
//! orchestrator's run bookkeeping. The store is the single source of truth
//! and the synchronization point across concurrent units of work:
//! uniqueness invariants are enforced here with check-and-insert under a
//! transaction, backed by partial unique indexes.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::generate::{ArticleStyle, SeoMetadata};
use crate::transcript::CoverageGap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trending keyword row. Identity is (platform, region, keyword, bucket);
/// only rank and score may change after creation.
#[derive(Debug, Clone)]
pub struct KeywordRecord {
    pub id: Uuid,
    pub keyword: String,
    pub rank: i64,
    pub score: i64,
    pub platform: String,
    pub region: String,
    pub metadata: serde_json::Value,
    /// Day bucket (YYYY-MM-DD) the keyword was observed in.
    pub bucket: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a keyword.
#[derive(Debug, Clone)]
pub struct NewKeyword {
    pub keyword: String,
    pub rank: i64,
    pub score: i64,
    pub platform: String,
    pub region: String,
    pub metadata: serde_json::Value,
    pub bucket: String,
}

/// A video row. One row per distinct YouTube id; engagement counters are
/// refreshable, content fields immutable.
#[derive(Debug, Clone)]
pub struct VideoRecord {
    pub id: Uuid,
    pub keyword_id: Uuid,
    pub youtube_id: String,
    pub title: String,
    pub category: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: i64,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub language: String,
    /// Path of the downloaded media artifact, once verified.
    pub media_path: Option<String>,
    /// Set only after the artifact passed integrity verification.
    pub media_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a video.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub keyword_id: Uuid,
    pub youtube_id: String,
    pub title: String,
    pub category: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: i64,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub language: String,
}

/// Where a transcript's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    Captions,
    Stt,
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptSource::Captions => write!(f, "captions"),
            TranscriptSource::Stt => write!(f, "stt"),
        }
    }
}

impl std::str::FromStr for TranscriptSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "captions" => Ok(TranscriptSource::Captions),
            "stt" => Ok(TranscriptSource::Stt),
            other => Err(format!("Unknown transcript source: {}", other)),
        }
    }
}

/// A transcript row. At most one non-stale row per (video, language);
/// superseding marks the old row stale, never deletes it.
#[derive(Debug, Clone)]
pub struct TranscriptRecord {
    pub id: Uuid,
    pub video_id: Uuid,
    pub text: String,
    pub language: String,
    pub source: TranscriptSource,
    pub low_confidence: bool,
    pub coverage_gaps: Vec<CoverageGap>,
    pub stale: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a transcript.
#[derive(Debug, Clone)]
pub struct NewTranscript {
    pub video_id: Uuid,
    pub text: String,
    pub language: String,
    pub source: TranscriptSource,
    pub low_confidence: bool,
    pub coverage_gaps: Vec<CoverageGap>,
}

/// An article row. The (keyword, video, transcript) triple must be mutually
/// consistent; content is immutable once created, regeneration supersedes.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub id: Uuid,
    pub keyword_id: Uuid,
    pub video_id: Uuid,
    pub transcript_id: Uuid,
    pub style: ArticleStyle,
    pub article_language: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub seo_metadata: SeoMetadata,
    pub published: bool,
    pub superseded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for an article.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub keyword_id: Uuid,
    pub video_id: Uuid,
    pub transcript_id: Uuid,
    pub style: ArticleStyle,
    pub article_language: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub seo_metadata: SeoMetadata,
}

/// Orchestrator bookkeeping for one unit of work.
#[derive(Debug, Clone)]
pub struct PipelineRunRecord {
    pub id: Uuid,
    pub video_id: Uuid,
    pub styles: Vec<ArticleStyle>,
    pub language: String,
    pub stage: crate::pipeline::Stage,
    pub failed_stage: Option<String>,
    pub error: Option<String>,
    /// Serialized AnalyzedContent, persisted before generation fan-out.
    pub analysis_json: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
