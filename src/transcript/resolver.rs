//! Transcript resolution: cheap captions vs. expensive speech-to-text.

use super::{
    captions_usable, merge_segments, parse_vtt, SpeechToText, TranscriptSegment,
};
use crate::config::Settings;
use crate::error::{Result, SkribentError};
use crate::media::{primary_subtag, MediaBundle};
use crate::store::{NewTranscript, SqliteStore, TranscriptRecord, TranscriptSource, VideoRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Resolves a transcript for a (video, language) pair.
///
/// Idempotent through the store's (video, language) uniqueness: resolving
/// again returns the existing row unless `force_refresh` supersedes it.
pub struct TranscriptResolver {
    stt: Arc<dyn SpeechToText>,
    store: Arc<SqliteStore>,
    settings: Settings,
}

impl TranscriptResolver {
    pub fn new(stt: Arc<dyn SpeechToText>, store: Arc<SqliteStore>, settings: Settings) -> Self {
        Self {
            stt,
            store,
            settings,
        }
    }

    /// Resolve the transcript for `video` in the requested language (or
    /// the video's native language when none is requested).
    #[instrument(skip(self, video, bundle), fields(video_id = %video.id))]
    pub async fn resolve(
        &self,
        video: &VideoRecord,
        bundle: &MediaBundle,
        target_language: Option<&str>,
        force_refresh: bool,
    ) -> Result<TranscriptRecord> {
        let requested = target_language.unwrap_or(&video.language);
        let language = primary_subtag(requested).to_string();

        if !self
            .settings
            .transcription
            .supported_languages
            .iter()
            .any(|l| l == &language)
        {
            return Err(SkribentError::UnsupportedLanguage {
                language,
                message: "not in the configured speech-to-text language set".into(),
            });
        }

        if force_refresh {
            self.store.supersede_transcript(video.id, &language)?;
        } else if let Some(existing) = self.store.find_transcript(video.id, &language)? {
            info!("Transcript already resolved for ({}, {})", video.id, language);
            return Ok(existing);
        }

        let duration = video.duration_seconds as f64;

        // Cheap path: native captions that pass the usability policy.
        if let Some(track) = bundle.caption_for(&language) {
            match std::fs::read_to_string(&track.path) {
                Ok(content) => {
                    let segments = parse_vtt(&content);
                    if captions_usable(&segments, duration, &self.settings.captions) {
                        info!("Using native captions for ({}, {})", video.id, language);
                        return self.persist(video, segments, &language, TranscriptSource::Captions, false);
                    }
                    info!("Native captions unusable, falling back to speech-to-text");
                }
                Err(e) => {
                    warn!("Could not read caption track {:?}: {}", track.path, e);
                }
            }
        }

        // Expensive path: extract audio and transcribe. The deadline
        // scales with content length since long media takes longer.
        let deadline = Duration::from_secs(
            self.settings.transcription.timeout_seconds + video.duration_seconds.max(0) as u64,
        );
        let stt_result = tokio::time::timeout(
            deadline,
            self.stt.transcribe(&bundle.media_path, Some(&language)),
        )
        .await
        .map_err(|_| SkribentError::Timeout(format!("Speech-to-text for {}", video.id)))??;

        let detected = primary_subtag(&stt_result.language).to_string();
        let low_confidence = stt_result
            .mean_no_speech_prob
            .is_some_and(|p| p > self.settings.transcription.low_confidence_threshold);
        if low_confidence {
            warn!(
                "Transcript for ({}, {}) flagged low-confidence (no-speech prob {:.2})",
                video.id,
                detected,
                stt_result.mean_no_speech_prob.unwrap_or_default()
            );
        }

        self.persist(video, stt_result.segments, &detected, TranscriptSource::Stt, low_confidence)
    }

    /// Merge segments into canonical text and store the transcript row.
    fn persist(
        &self,
        video: &VideoRecord,
        segments: Vec<TranscriptSegment>,
        language: &str,
        source: TranscriptSource,
        low_confidence: bool,
    ) -> Result<TranscriptRecord> {
        let merged = merge_segments(
            segments,
            self.settings.captions.record_gap_seconds,
            Some(video.duration_seconds as f64),
        );

        if !merged.gaps.is_empty() {
            warn!(
                "Transcript for {} has {} coverage gap(s)",
                video.id,
                merged.gaps.len()
            );
        }

        self.store.insert_or_get_transcript(NewTranscript {
            video_id: video.id,
            text: merged.render_text(),
            language: language.to_string(),
            source,
            low_confidence,
            coverage_gaps: merged.gaps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::CaptionTrack;
    use crate::store::{NewKeyword, NewVideo};
    use crate::transcript::{SttTranscript, GAP_MARKER_PREFIX};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubStt {
        calls: AtomicUsize,
        segments: Vec<TranscriptSegment>,
        language: String,
        no_speech: Option<f64>,
    }

    impl StubStt {
        fn speaking(segments: Vec<TranscriptSegment>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                segments,
                language: "en".into(),
                no_speech: Some(0.05),
            }
        }
    }

    #[async_trait]
    impl SpeechToText for StubStt {
        async fn transcribe(
            &self,
            _media_path: &Path,
            _language_hint: Option<&str>,
        ) -> Result<SttTranscript> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SttTranscript {
                segments: self.segments.clone(),
                language: self.language.clone(),
                mean_no_speech_prob: self.no_speech,
            })
        }
    }

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(start, end, text.to_string())
    }

    fn seed_video(store: &SqliteStore, duration: i64) -> VideoRecord {
        let keyword = store
            .insert_or_get_keyword(NewKeyword {
                keyword: "kw".into(),
                rank: 1,
                score: 1,
                platform: "manual".into(),
                region: "US".into(),
                metadata: serde_json::json!({}),
                bucket: "2026-01-01".into(),
            })
            .unwrap();
        store
            .insert_or_get_video(NewVideo {
                keyword_id: keyword.id,
                youtube_id: "vid00000001".into(),
                title: "Video".into(),
                category: "education".into(),
                url: "https://www.youtube.com/watch?v=vid00000001".into(),
                thumbnail_url: None,
                duration_seconds: duration,
                views: 0,
                likes: 0,
                comments: 0,
                language: "en".into(),
            })
            .unwrap()
    }

    fn bundle_with_captions(video: &VideoRecord, vtt: Option<&str>, dir: &Path) -> MediaBundle {
        let captions = match vtt {
            Some(content) => {
                let path = dir.join("vid00000001.en.vtt");
                std::fs::write(&path, content).unwrap();
                vec![CaptionTrack {
                    language: "en".into(),
                    path,
                }]
            }
            None => vec![],
        };
        MediaBundle {
            video: video.clone(),
            media_path: PathBuf::from("/nonexistent/vid00000001.mp4"),
            captions,
        }
    }

    fn full_coverage_vtt() -> String {
        // Two cues covering 98 of 100 seconds
        "WEBVTT\n\n\
         00:00:00.000 --> 00:00:49.000\nFirst half of the talk.\n\n\
         00:00:49.000 --> 00:01:38.000\nSecond half of the talk.\n"
            .to_string()
    }

    fn resolver(store: Arc<SqliteStore>, stt: Arc<StubStt>) -> TranscriptResolver {
        TranscriptResolver::new(stt, store, Settings::default())
    }

    #[tokio::test]
    async fn test_cheap_path_skips_stt() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let video = seed_video(&store, 100);
        let dir = tempfile::tempdir().unwrap();
        let bundle = bundle_with_captions(&video, Some(&full_coverage_vtt()), dir.path());
        let stt = Arc::new(StubStt::speaking(vec![]));

        let record = resolver(store, stt.clone())
            .resolve(&video, &bundle, Some("en"), false)
            .await
            .unwrap();

        assert_eq!(record.source, TranscriptSource::Captions);
        assert_eq!(record.language, "en");
        assert_eq!(stt.calls.load(Ordering::SeqCst), 0);
        assert!(record.text.contains("First half of the talk."));
    }

    #[tokio::test]
    async fn test_no_captions_invokes_stt() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let video = seed_video(&store, 100);
        let dir = tempfile::tempdir().unwrap();
        let bundle = bundle_with_captions(&video, None, dir.path());
        let stt = Arc::new(StubStt::speaking(vec![seg(0.0, 100.0, "spoken words")]));

        let record = resolver(store, stt.clone())
            .resolve(&video, &bundle, Some("en"), false)
            .await
            .unwrap();

        assert_eq!(record.source, TranscriptSource::Stt);
        assert_eq!(record.language, "en");
        assert_eq!(stt.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sparse_captions_fall_back_to_stt() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let video = seed_video(&store, 100);
        let dir = tempfile::tempdir().unwrap();
        // Captions cover only 20 of 100 seconds
        let sparse = "WEBVTT\n\n00:00:00.000 --> 00:00:20.000\nOnly the intro.\n";
        let bundle = bundle_with_captions(&video, Some(sparse), dir.path());
        let stt = Arc::new(StubStt::speaking(vec![seg(0.0, 100.0, "full audio")]));

        let record = resolver(store, stt.clone())
            .resolve(&video, &bundle, Some("en"), false)
            .await
            .unwrap();

        assert_eq!(record.source, TranscriptSource::Stt);
        assert_eq!(stt.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let video = seed_video(&store, 100);
        let dir = tempfile::tempdir().unwrap();
        let bundle = bundle_with_captions(&video, None, dir.path());
        let stt = Arc::new(StubStt::speaking(vec![seg(0.0, 100.0, "words")]));
        let resolver = resolver(store, stt.clone());

        let first = resolver.resolve(&video, &bundle, Some("en"), false).await.unwrap();
        let second = resolver.resolve(&video, &bundle, Some("en"), false).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(stt.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_supersedes() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let video = seed_video(&store, 100);
        let dir = tempfile::tempdir().unwrap();
        let bundle = bundle_with_captions(&video, None, dir.path());
        let stt = Arc::new(StubStt::speaking(vec![seg(0.0, 100.0, "words")]));
        let resolver_under_test = resolver(store.clone(), stt);

        let first = resolver_under_test
            .resolve(&video, &bundle, Some("en"), false)
            .await
            .unwrap();
        let second = resolver_under_test
            .resolve(&video, &bundle, Some("en"), true)
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        let old = store.get_transcript(first.id).unwrap().unwrap();
        assert!(old.stale);
        assert!(!second.stale);
    }

    #[tokio::test]
    async fn test_unsupported_language_is_fatal() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let video = seed_video(&store, 100);
        let dir = tempfile::tempdir().unwrap();
        let bundle = bundle_with_captions(&video, None, dir.path());
        let stt = Arc::new(StubStt::speaking(vec![]));

        let err = resolver(store, stt)
            .resolve(&video, &bundle, Some("tlh"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SkribentError::UnsupportedLanguage { .. }));
    }

    #[tokio::test]
    async fn test_low_confidence_is_stored_flagged() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let video = seed_video(&store, 100);
        let dir = tempfile::tempdir().unwrap();
        let bundle = bundle_with_captions(&video, None, dir.path());
        let stt = Arc::new(StubStt {
            calls: AtomicUsize::new(0),
            segments: vec![seg(0.0, 100.0, "mumbled words")],
            language: "en".into(),
            no_speech: Some(0.9),
        });

        let record = resolver(store, stt)
            .resolve(&video, &bundle, Some("en"), false)
            .await
            .unwrap();

        assert!(record.low_confidence);
        assert_eq!(record.text, "mumbled words");
    }

    #[tokio::test]
    async fn test_coverage_gaps_recorded_on_row() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let video = seed_video(&store, 100);
        let dir = tempfile::tempdir().unwrap();
        let bundle = bundle_with_captions(&video, None, dir.path());
        // 40s hole between the two segments
        let stt = Arc::new(StubStt::speaking(vec![
            seg(0.0, 30.0, "before the hole"),
            seg(70.0, 100.0, "after the hole"),
        ]));

        let record = resolver(store, stt)
            .resolve(&video, &bundle, Some("en"), false)
            .await
            .unwrap();

        assert_eq!(record.coverage_gaps.len(), 1);
        assert_eq!(record.coverage_gaps[0].start_seconds, 30.0);
        assert_eq!(record.coverage_gaps[0].end_seconds, 70.0);
        assert!(record.text.contains(GAP_MARKER_PREFIX));
    }
}
