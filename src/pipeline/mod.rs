//! Pipeline orchestration for Skribent.
//!
//! Drives one unit of work — a (video, requested style set) pair —
//! through acquisition, transcript resolution, analysis, and style
//! fan-out, persisting every stage's output before the next begins.

mod orchestrator;
mod retry;

pub use orchestrator::{Orchestrator, WorkRequest};
pub use retry::RetryPolicy;

use crate::generate::ArticleStyle;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Stages of one unit of work. Persisted on the run row; on restart the
/// orchestrator resumes from the first incomplete stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Pending,
    Acquired,
    Transcribed,
    Analyzed,
    Generating,
    Complete,
    Failed,
}

impl Stage {
    /// Position in the forward progression. Failed ranks with Pending so
    /// a failed run never reads as having completed anything.
    fn rank(&self) -> u8 {
        match self {
            Stage::Pending | Stage::Failed => 0,
            Stage::Acquired => 1,
            Stage::Transcribed => 2,
            Stage::Analyzed => 3,
            Stage::Generating => 4,
            Stage::Complete => 5,
        }
    }

    /// Whether this stage is at or past `other` in the progression.
    pub fn reached(&self, other: Stage) -> bool {
        self.rank() >= other.rank()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::Acquired => "acquired",
            Stage::Transcribed => "transcribed",
            Stage::Analyzed => "analyzed",
            Stage::Generating => "generating",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Stage::Pending),
            "acquired" => Ok(Stage::Acquired),
            "transcribed" => Ok(Stage::Transcribed),
            "analyzed" => Ok(Stage::Analyzed),
            "generating" => Ok(Stage::Generating),
            "complete" => Ok(Stage::Complete),
            "failed" => Ok(Stage::Failed),
            other => Err(format!("Unknown stage: {}", other)),
        }
    }
}

/// Cooperative cancellation token, checked at stage boundaries.
///
/// Mid-stage work is never torn down halfway: rows are written and only
/// then marked complete, so a cancelled unit of work always resumes
/// cleanly.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// What happened to one style of the fan-out.
#[derive(Debug, Clone)]
pub enum StyleResult {
    /// Article row id of the generated (or already existing) article.
    Generated(Uuid),
    /// The style failed after exhausting its retries.
    Failed(String),
}

/// Outcome of one style generation attempt.
#[derive(Debug, Clone)]
pub struct StyleOutcome {
    pub style: ArticleStyle,
    pub result: StyleResult,
}

/// Final report for one unit of work. Partial success (some styles
/// generated, some failed) is a valid terminal outcome.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub video_id: Uuid,
    pub transcript_id: Uuid,
    pub outcomes: Vec<StyleOutcome>,
    /// Stage the run was resumed from, when it did not start fresh.
    pub resumed_from: Option<Stage>,
}

impl PipelineReport {
    pub fn generated_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, StyleResult::Generated(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.generated_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_round_trip() {
        for stage in [
            Stage::Pending,
            Stage::Acquired,
            Stage::Transcribed,
            Stage::Analyzed,
            Stage::Generating,
            Stage::Complete,
            Stage::Failed,
        ] {
            let parsed: Stage = stage.to_string().parse().unwrap();
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Transcribed.reached(Stage::Acquired));
        assert!(Stage::Transcribed.reached(Stage::Transcribed));
        assert!(!Stage::Acquired.reached(Stage::Transcribed));
        // A failed run has not reached anything.
        assert!(!Stage::Failed.reached(Stage::Acquired));
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
