//! Content analysis for Skribent.
//!
//! Structures a transcript into sections, key points, and a topic
//! outline for the article generators. Analyzers are side-effect free:
//! repeated analysis of the same transcript is always safe, and
//! persistence is the orchestrator's decision.

mod heuristic;
mod llm;

pub use heuristic::HeuristicAnalyzer;
pub use llm::LlmAnalyzer;

use crate::error::Result;
use crate::store::{TranscriptRecord, VideoRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One topical section of the analyzed transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    pub title: String,
    pub content: String,
    /// True when a coverage gap falls inside this section. Generators
    /// must not invent content for the missing stretch.
    #[serde(default)]
    pub has_coverage_gap: bool,
}

/// Structured view of a transcript, ready for article generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedContent {
    /// Title of the source video.
    pub source_title: String,
    /// Canonical URL of the source video.
    pub source_url: String,
    /// Language of the underlying transcript.
    pub language: String,
    pub sections: Vec<ContentSection>,
    pub key_points: Vec<String>,
    /// Topic outline, one entry per section.
    pub outline: Vec<String>,
}

impl AnalyzedContent {
    /// Total word count across sections.
    pub fn word_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.content.split_whitespace().count())
            .sum()
    }
}

/// Trait for content analyzers.
///
/// Implementations must be deterministic given identical transcript and
/// configuration, and must annotate (never fill in) coverage gaps.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        video: &VideoRecord,
        transcript: &TranscriptRecord,
    ) -> Result<AnalyzedContent>;
}
