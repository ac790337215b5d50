//! YouTube media source backed by yt-dlp.

use super::{parse_iso8601_duration, CaptionTrack, DownloadedMedia, MediaSource, VideoMetadata};
use crate::error::{Result, SkribentError};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// yt-dlp based source for YouTube videos.
pub struct YtDlpSource {
    video_id_regex: Regex,
}

impl YtDlpSource {
    pub fn new() -> Self {
        // Matches various YouTube URL formats and bare video IDs
        let video_id_regex = Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.)?
                (?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("Invalid regex");

        Self { video_id_regex }
    }

    fn watch_url(youtube_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", youtube_id)
    }

    /// URL-parsing fallback for watch URLs the regex misses, e.g. when
    /// `v=` is not the first query parameter.
    fn extract_id_from_url(input: &str) -> Option<String> {
        let parsed = url::Url::parse(input.trim()).ok()?;
        let host = parsed.host_str()?;

        let id = if host == "youtu.be" || host == "www.youtu.be" {
            parsed.path_segments()?.next().map(|s| s.to_string())
        } else if (host == "youtube.com" || host.ends_with(".youtube.com"))
            && parsed.path() == "/watch"
        {
            parsed
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.to_string())
        } else {
            None
        };

        id.filter(|id| id.len() == 11 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
    }

    /// Map a yt-dlp failure to the error taxonomy by inspecting stderr.
    fn classify_failure(youtube_id: &str, stderr: &str) -> SkribentError {
        let lower = stderr.to_lowercase();
        if lower.contains("429") || lower.contains("rate-limit") || lower.contains("rate limit") {
            SkribentError::RateLimited(format!("yt-dlp for {}: {}", youtube_id, stderr.trim()))
        } else if lower.contains("private video")
            || lower.contains("video unavailable")
            || lower.contains("has been removed")
            || lower.contains("does not exist")
        {
            SkribentError::VideoNotFound(youtube_id.to_string())
        } else {
            SkribentError::Acquisition(format!("yt-dlp failed for {}: {}", youtube_id, stderr.trim()))
        }
    }

    async fn run_ytdlp(args: &[&str]) -> Result<std::process::Output> {
        let result = Command::new("yt-dlp")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(output) => Ok(output),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SkribentError::ToolNotFound("yt-dlp".into()))
            }
            Err(e) => Err(SkribentError::Acquisition(format!(
                "yt-dlp execution failed: {e}"
            ))),
        }
    }

    /// Locate the downloaded media file for a video id.
    fn find_media_file(dest_dir: &Path, youtube_id: &str) -> Result<std::path::PathBuf> {
        for ext in &["mp4", "mkv", "webm"] {
            let candidate = dest_dir.join(format!("{}.{}", youtube_id, ext));
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(SkribentError::PartialDownload(format!(
            "No media file found for {} after download",
            youtube_id
        )))
    }
}

impl Default for YtDlpSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the caption files yt-dlp wrote next to the media artifact.
/// Subtitle files follow the `<id>.<lang>.vtt` naming convention.
pub(crate) fn collect_caption_files(dest_dir: &Path, youtube_id: &str) -> Vec<CaptionTrack> {
    let mut captions = Vec::new();
    let Ok(entries) = std::fs::read_dir(dest_dir) else {
        return captions;
    };

    let prefix = format!("{}.", youtube_id);
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix(&prefix) {
            if let Some(lang) = rest.strip_suffix(".vtt") {
                captions.push(CaptionTrack {
                    language: lang.to_string(),
                    path: entry.path(),
                });
            }
        }
    }

    captions
}

#[async_trait]
impl MediaSource for YtDlpSource {
    fn extract_id(&self, input: &str) -> Option<String> {
        if let Some(caps) = self.video_id_regex.captures(input.trim()) {
            return caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string());
        }
        Self::extract_id_from_url(input)
    }

    #[instrument(skip(self))]
    async fn fetch_metadata(&self, youtube_id: &str) -> Result<VideoMetadata> {
        let url = Self::watch_url(youtube_id);
        let output = Self::run_ytdlp(&["--dump-json", "--no-download", "--no-warnings", &url]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_failure(youtube_id, &stderr));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str).map_err(|e| {
            SkribentError::Acquisition(format!("Failed to parse yt-dlp output: {}", e))
        })?;

        // yt-dlp reports duration as a number; other metadata sources may
        // hand us an ISO 8601 string.
        let duration_seconds = json["duration"]
            .as_f64()
            .map(|d| d as i64)
            .or_else(|| json["duration"].as_str().and_then(parse_iso8601_duration))
            .unwrap_or(0);

        Ok(VideoMetadata {
            youtube_id: youtube_id.to_string(),
            title: json["title"].as_str().unwrap_or("Unknown Title").to_string(),
            category: json["categories"][0]
                .as_str()
                .unwrap_or("uncategorized")
                .to_string(),
            url,
            thumbnail_url: json["thumbnail"].as_str().map(|s| s.to_string()),
            duration_seconds,
            views: json["view_count"].as_i64().unwrap_or(0),
            likes: json["like_count"].as_i64().unwrap_or(0),
            comments: json["comment_count"].as_i64().unwrap_or(0),
            language: json["language"].as_str().unwrap_or("en").to_string(),
        })
    }

    #[instrument(skip(self, dest_dir))]
    async fn download(&self, youtube_id: &str, dest_dir: &Path) -> Result<DownloadedMedia> {
        std::fs::create_dir_all(dest_dir)?;
        let url = Self::watch_url(youtube_id);
        let template = dest_dir.join("%(id)s.%(ext)s");

        info!("Downloading media for {}", youtube_id);

        let output = Self::run_ytdlp(&[
            "--format",
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
            "--merge-output-format",
            "mp4",
            "--write-subs",
            "--write-auto-subs",
            "--sub-format",
            "vtt",
            "--output",
            template.to_str().unwrap_or_default(),
            "--no-playlist",
            "--no-warnings",
            "--print",
            "after_move:filesize,%(filesize,filesize_approx|0)s",
            &url,
        ])
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_failure(youtube_id, &stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let expected_size = stdout
            .lines()
            .find_map(|l| l.strip_prefix("filesize,"))
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&s| s > 0);

        let media_path = Self::find_media_file(dest_dir, youtube_id)?;
        let captions = collect_caption_files(dest_dir, youtube_id);

        debug!(
            "Downloaded {:?} with {} caption track(s)",
            media_path,
            captions.len()
        );

        Ok(DownloadedMedia {
            media_path,
            captions,
            expected_size,
        })
    }
}
