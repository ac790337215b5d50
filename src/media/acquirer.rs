//! Cache-checked media acquisition.

use super::{MediaBundle, MediaSource, VideoMetadata};
use crate::config::Settings;
use crate::error::{Result, SkribentError};
use crate::store::{NewVideo, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Acquires a video's metadata, media stream, and native captions.
///
/// Idempotent: a video whose artifact already passed integrity
/// verification is served from disk without re-downloading. Metadata is
/// always re-fetched so engagement counters stay fresh.
pub struct MediaAcquirer {
    source: Arc<dyn MediaSource>,
    store: Arc<SqliteStore>,
    settings: Settings,
}

impl MediaAcquirer {
    pub fn new(source: Arc<dyn MediaSource>, store: Arc<SqliteStore>, settings: Settings) -> Self {
        Self {
            source,
            store,
            settings,
        }
    }

    /// Resolve `video_ref` (URL or bare id) to a verified media bundle,
    /// creating or refreshing the video row along the way.
    #[instrument(skip(self), fields(video_ref = %video_ref))]
    pub async fn acquire(&self, video_ref: &str, keyword_id: Uuid) -> Result<MediaBundle> {
        // Canonical id before any caching decision.
        let youtube_id = self.source.extract_id(video_ref).ok_or_else(|| {
            SkribentError::InvalidInput(format!("Could not parse video reference: {}", video_ref))
        })?;

        let deadline = Duration::from_secs(self.settings.acquisition.timeout_seconds);
        let metadata = tokio::time::timeout(deadline, self.source.fetch_metadata(&youtube_id))
            .await
            .map_err(|_| SkribentError::Timeout(format!("Metadata fetch for {}", youtube_id)))??;

        if metadata.duration_seconds > self.settings.acquisition.max_duration_seconds as i64 {
            return Err(SkribentError::InvalidInput(format!(
                "Video duration ({}s) exceeds maximum ({}s)",
                metadata.duration_seconds, self.settings.acquisition.max_duration_seconds
            )));
        }

        // Upsert refreshes engagement counters on an existing row.
        let video = self.store.insert_or_get_video(new_video(keyword_id, &metadata))?;

        // Cache hit: artifact verified earlier and still on disk.
        if video.media_complete {
            if let Some(path) = video.media_path.as_deref() {
                let media_path = PathBuf::from(path);
                if media_path.exists() {
                    info!("Using cached media artifact for {}", youtube_id);
                    let captions = super::youtube::collect_caption_files(
                        media_path.parent().unwrap_or(Path::new(".")),
                        &youtube_id,
                    );
                    return Ok(MediaBundle {
                        video,
                        media_path,
                        captions,
                    });
                }
                warn!("Cached artifact missing on disk, re-downloading");
            }
            self.store.clear_media_artifact(video.id)?;
        }

        let media_dir = self.settings.media_dir();
        let downloaded = tokio::time::timeout(
            deadline,
            self.source.download(&youtube_id, &media_dir),
        )
        .await
        .map_err(|_| SkribentError::Timeout(format!("Media download for {}", youtube_id)))??;

        // Partial artifacts must never be marked complete.
        if let Err(e) = verify_artifact(
            &downloaded.media_path,
            downloaded.expected_size,
            self.settings.acquisition.size_tolerance,
        ) {
            let _ = std::fs::remove_file(&downloaded.media_path);
            return Err(e);
        }

        self.store.set_media_artifact(
            video.id,
            &downloaded.media_path.to_string_lossy(),
        )?;

        // Reload so callers see media_complete.
        let video = self
            .store
            .get_video(video.id)?
            .ok_or_else(|| SkribentError::Store("Video row vanished after acquisition".into()))?;

        Ok(MediaBundle {
            video,
            media_path: downloaded.media_path,
            captions: downloaded.captions,
        })
    }
}

fn new_video(keyword_id: Uuid, metadata: &VideoMetadata) -> NewVideo {
    NewVideo {
        keyword_id,
        youtube_id: metadata.youtube_id.clone(),
        title: metadata.title.clone(),
        category: metadata.category.clone(),
        url: metadata.url.clone(),
        thumbnail_url: metadata.thumbnail_url.clone(),
        duration_seconds: metadata.duration_seconds,
        views: metadata.views,
        likes: metadata.likes,
        comments: metadata.comments,
        language: metadata.language.clone(),
    }
}

/// Reject empty or truncated artifacts before they can be marked complete.
fn verify_artifact(path: &Path, expected_size: Option<u64>, tolerance: f64) -> Result<()> {
    let actual = std::fs::metadata(path)
        .map_err(|e| SkribentError::PartialDownload(format!("Artifact unreadable: {e}")))?
        .len();

    if actual == 0 {
        return Err(SkribentError::PartialDownload(format!(
            "Artifact {:?} is empty",
            path
        )));
    }

    if let Some(expected) = expected_size {
        let lower = expected as f64 * (1.0 - tolerance);
        if (actual as f64) < lower {
            return Err(SkribentError::PartialDownload(format!(
                "Artifact {:?} is {} bytes, expected ~{}",
                path, actual, expected
            )));
        }
    }

    Ok(())
}
