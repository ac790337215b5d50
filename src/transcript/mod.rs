//! Transcript resolution for Skribent.
//!
//! Decides between native captions (cheap path) and speech-to-text
//! (expensive path), normalizes timed segments into one contiguous text,
//! and records coverage gaps instead of silently dropping them.

mod captions;
mod resolver;
mod whisper;

pub use captions::{captions_usable, parse_vtt};
pub use resolver::TranscriptResolver;
pub use whisper::WhisperStt;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single timed segment of caption or STT output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
    /// Transcribed text content.
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start_seconds: f64, end_seconds: f64, text: String) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text,
        }
    }

    /// Duration of this segment in seconds.
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// A time interval with no caption or STT coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl CoverageGap {
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Inline marker prefix injected into the merged text where a coverage
/// gap was recorded, so downstream analysis can see the hole.
pub const GAP_MARKER_PREFIX: &str = "[coverage gap";

/// Render the inline marker for a gap.
pub fn gap_marker(gap: &CoverageGap) -> String {
    format!(
        "{} {}s-{}s]",
        GAP_MARKER_PREFIX, gap.start_seconds as u64, gap.end_seconds as u64
    )
}

/// Segments merged into canonical order plus the gaps found between them.
#[derive(Debug, Clone)]
pub struct MergedTranscript {
    pub segments: Vec<TranscriptSegment>,
    pub gaps: Vec<CoverageGap>,
}

impl MergedTranscript {
    /// The contiguous transcript text, with gap markers inlined at the
    /// positions where coverage is missing.
    pub fn render_text(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.segments.len() + self.gaps.len());
        let mut gap_iter = self.gaps.iter().peekable();

        for segment in &self.segments {
            while let Some(gap) = gap_iter.peek() {
                if gap.end_seconds <= segment.start_seconds {
                    parts.push(gap_marker(gap));
                    gap_iter.next();
                } else {
                    break;
                }
            }
            parts.push(segment.text.clone());
        }
        for gap in gap_iter {
            parts.push(gap_marker(gap));
        }

        parts.join(" ")
    }
}

/// Merge caption or STT segments into one time-ordered sequence.
///
/// Segments are sorted by start time ascending; empty and exactly
/// duplicated segments are dropped. Any stretch longer than
/// `gap_threshold` seconds without coverage (including before the first
/// and after the last segment when `total_duration` is known) is
/// recorded as a `CoverageGap`.
pub fn merge_segments(
    segments: Vec<TranscriptSegment>,
    gap_threshold: f64,
    total_duration: Option<f64>,
) -> MergedTranscript {
    let mut segments: Vec<TranscriptSegment> = segments
        .into_iter()
        .filter(|s| !s.text.trim().is_empty() && s.end_seconds > s.start_seconds)
        .collect();

    segments.sort_by(|a, b| {
        a.start_seconds
            .partial_cmp(&b.start_seconds)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.end_seconds
                    .partial_cmp(&b.end_seconds)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    segments.dedup_by(|a, b| {
        a.start_seconds == b.start_seconds && a.end_seconds == b.end_seconds && a.text == b.text
    });

    let mut gaps = Vec::new();

    if let Some(first) = segments.first() {
        if first.start_seconds > gap_threshold {
            gaps.push(CoverageGap {
                start_seconds: 0.0,
                end_seconds: first.start_seconds,
            });
        }
    }

    let mut covered_until = 0.0f64;
    for segment in &segments {
        if covered_until > 0.0 && segment.start_seconds - covered_until > gap_threshold {
            gaps.push(CoverageGap {
                start_seconds: covered_until,
                end_seconds: segment.start_seconds,
            });
        }
        covered_until = covered_until.max(segment.end_seconds);
    }

    if let Some(duration) = total_duration {
        if duration - covered_until > gap_threshold {
            gaps.push(CoverageGap {
                start_seconds: covered_until,
                end_seconds: duration,
            });
        }
    }

    MergedTranscript { segments, gaps }
}

/// Raw output from a speech-to-text collaborator.
#[derive(Debug, Clone)]
pub struct SttTranscript {
    pub segments: Vec<TranscriptSegment>,
    /// Language the collaborator detected (or echoed from the hint).
    pub language: String,
    /// Mean no-speech probability across segments, when reported.
    pub mean_no_speech_prob: Option<f64>,
}

/// Trait for speech-to-text collaborators.
///
/// Implementations own the audio extraction from the media artifact; the
/// resolver only decides whether to invoke them.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(
        &self,
        media_path: &Path,
        language_hint: Option<&str>,
    ) -> Result<SttTranscript>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(start, end, text.to_string())
    }

    #[test]
    fn test_merge_orders_overlapping_segments() {
        let merged = merge_segments(
            vec![seg(3.0, 8.0, "b"), seg(0.0, 5.0, "a")],
            10.0,
            None,
        );

        assert_eq!(merged.segments.len(), 2);
        assert_eq!(merged.segments[0].text, "a");
        assert_eq!(merged.segments[1].text, "b");
        assert!(merged.gaps.is_empty());
        assert_eq!(merged.render_text(), "a b");
    }

    #[test]
    fn test_merge_drops_exact_duplicates_and_empties() {
        let merged = merge_segments(
            vec![
                seg(0.0, 5.0, "a"),
                seg(0.0, 5.0, "a"),
                seg(5.0, 6.0, "   "),
                seg(6.0, 6.0, "zero length"),
                seg(6.0, 9.0, "b"),
            ],
            10.0,
            None,
        );

        assert_eq!(merged.segments.len(), 2);
        assert_eq!(merged.render_text(), "a b");
    }

    #[test]
    fn test_merge_records_interior_gap() {
        let merged = merge_segments(
            vec![seg(0.0, 10.0, "intro"), seg(55.0, 60.0, "outro")],
            10.0,
            Some(60.0),
        );

        assert_eq!(merged.gaps.len(), 1);
        assert_eq!(merged.gaps[0].start_seconds, 10.0);
        assert_eq!(merged.gaps[0].end_seconds, 55.0);

        let text = merged.render_text();
        assert!(text.contains("intro"));
        assert!(text.contains(GAP_MARKER_PREFIX));
        assert!(text.contains("outro"));
        // Marker sits between the two segments.
        assert!(text.find("intro").unwrap() < text.find(GAP_MARKER_PREFIX).unwrap());
        assert!(text.find(GAP_MARKER_PREFIX).unwrap() < text.find("outro").unwrap());
    }

    #[test]
    fn test_merge_records_leading_and_trailing_gaps() {
        let merged = merge_segments(vec![seg(30.0, 40.0, "middle")], 10.0, Some(100.0));

        assert_eq!(merged.gaps.len(), 2);
        assert_eq!(merged.gaps[0].start_seconds, 0.0);
        assert_eq!(merged.gaps[1].end_seconds, 100.0);
    }

    #[test]
    fn test_merge_small_gaps_not_recorded() {
        let merged = merge_segments(
            vec![seg(0.0, 10.0, "a"), seg(14.0, 20.0, "b")],
            10.0,
            Some(21.0),
        );
        assert!(merged.gaps.is_empty());
    }
}
