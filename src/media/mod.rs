//! Media acquisition for Skribent.
//!
//! Fetches a video's metadata, media stream, and native captions through
//! a `MediaSource` collaborator (yt-dlp in production), verifies artifact
//! integrity, and records the result on the video row.

mod acquirer;
mod audio;
mod youtube;

pub use acquirer::MediaAcquirer;
pub use audio::{extract_audio, probe_duration, split_audio};
pub use youtube::YtDlpSource;

use crate::error::Result;
use crate::store::VideoRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Metadata for an external video, as reported by the source.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
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

/// A native caption track written next to the media artifact.
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    pub language: String,
    pub path: PathBuf,
}

/// Result of downloading media for one video.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub media_path: PathBuf,
    pub captions: Vec<CaptionTrack>,
    /// Filesize the source reported before download, if any. Used for
    /// integrity verification.
    pub expected_size: Option<u64>,
}

/// Everything the pipeline needs from a completed acquisition.
#[derive(Debug, Clone)]
pub struct MediaBundle {
    pub video: VideoRecord,
    pub media_path: PathBuf,
    pub captions: Vec<CaptionTrack>,
}

impl MediaBundle {
    /// The caption track for a language, if the source provided one.
    /// Matches on the primary subtag so "en-US" satisfies "en".
    pub fn caption_for(&self, language: &str) -> Option<&CaptionTrack> {
        let want = primary_subtag(language);
        self.captions
            .iter()
            .find(|c| primary_subtag(&c.language) == want)
    }
}

/// The primary language subtag ("en" from "en-US").
pub fn primary_subtag(language: &str) -> &str {
    language.split(['-', '_']).next().unwrap_or(language)
}

/// Trait for video platforms the acquirer can pull from.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Extract the canonical external id from a URL or bare id.
    fn extract_id(&self, input: &str) -> Option<String>;

    /// Fetch metadata without downloading media.
    async fn fetch_metadata(&self, youtube_id: &str) -> Result<VideoMetadata>;

    /// Download the media stream and any native captions into `dest_dir`.
    async fn download(&self, youtube_id: &str, dest_dir: &Path) -> Result<DownloadedMedia>;
}

/// Convert an ISO 8601 duration ("PT1H2M10S") to seconds. Some metadata
/// sources report durations in this form rather than as a number.
pub fn parse_iso8601_duration(duration: &str) -> Option<i64> {
    let rest = duration.strip_prefix("PT")?;
    let mut seconds: i64 = 0;
    let mut number = String::new();

    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let value: i64 = number.parse().ok()?;
        number.clear();
        match ch {
            'H' => seconds += value * 3600,
            'M' => seconds += value * 60,
            'S' => seconds += value,
            _ => return None,
        }
    }

    if number.is_empty() {
        Some(seconds)
    } else {
        None
    }
}
