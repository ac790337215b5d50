//! OpenAI Whisper speech-to-text implementation.

use super::{SpeechToText, SttTranscript, TranscriptSegment};
use crate::error::{Result, SkribentError};
use crate::media::{extract_audio, split_audio};
use crate::openai::{classify_api_error, create_client};
use async_openai::types::{AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Whisper-backed speech-to-text.
///
/// Owns the audio side of the expensive path: extracts the audio track
/// from the media artifact, splits long audio into chunks, and
/// transcribes chunks concurrently.
pub struct WhisperStt {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    chunk_duration_seconds: u32,
    max_concurrent_chunks: usize,
}

impl WhisperStt {
    pub fn new() -> Self {
        Self::with_config("whisper-1", 120, 3)
    }

    pub fn with_config(
        model: &str,
        chunk_duration_seconds: u32,
        max_concurrent_chunks: usize,
    ) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            chunk_duration_seconds,
            max_concurrent_chunks,
        }
    }

    /// Transcribe a single audio file (no splitting).
    ///
    /// Returns the segments, the detected language, and the mean
    /// no-speech probability across segments.
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_single(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<(Vec<TranscriptSegment>, String, Option<f64>)> {
        debug!("Transcribing audio chunk");

        let file_bytes = tokio::fs::read(audio_path).await?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(async_openai::types::AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.mp3")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| SkribentError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| classify_api_error("Whisper API", e))?;

        let detected_language = response.language.clone();

        let (segments, no_speech): (Vec<TranscriptSegment>, Vec<f64>) = match response.segments {
            Some(segs) => {
                let no_speech = segs.iter().map(|s| s.no_speech_prob as f64).collect();
                let segments = segs
                    .iter()
                    .map(|s| {
                        TranscriptSegment::new(
                            s.start as f64,
                            s.end as f64,
                            s.text.trim().to_string(),
                        )
                    })
                    .collect();
                (segments, no_speech)
            }
            None => (
                // Fallback: one segment spanning the whole chunk
                vec![TranscriptSegment::new(
                    0.0,
                    response.duration as f64,
                    response.text.trim().to_string(),
                )],
                vec![],
            ),
        };

        let mean_no_speech = if no_speech.is_empty() {
            None
        } else {
            Some(no_speech.iter().sum::<f64>() / no_speech.len() as f64)
        };

        debug!("Transcribed {} segments", segments.len());
        Ok((segments, detected_language, mean_no_speech))
    }
}

impl Default for WhisperStt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechToText for WhisperStt {
    #[instrument(skip(self), fields(media = %media_path.display()))]
    async fn transcribe(
        &self,
        media_path: &Path,
        language_hint: Option<&str>,
    ) -> Result<SttTranscript> {
        let temp_dir = tempfile::tempdir()?;
        let audio_path = extract_audio(media_path, temp_dir.path()).await?;
        let chunks = split_audio(&audio_path, temp_dir.path(), self.chunk_duration_seconds).await?;

        if chunks.len() == 1 {
            let (segments, language, mean_no_speech_prob) =
                self.transcribe_single(&audio_path, language_hint).await?;
            return Ok(SttTranscript {
                segments,
                language,
                mean_no_speech_prob,
            });
        }

        let chunk_count = chunks.len();
        info!("Transcribing {} audio chunks with {}", chunk_count, self.model);

        let pb = Arc::new(ProgressBar::new(chunk_count as u64));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} Whisper   [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("█▓░"),
        );

        // Process chunks in parallel with concurrency limit, fail fast on error
        let mut results: Vec<(usize, f64, Vec<TranscriptSegment>, String, Option<f64>)> =
            Vec::with_capacity(chunk_count);

        let mut stream = stream::iter(chunks.into_iter().enumerate())
            .map(|(idx, (chunk_path, time_offset))| {
                let language = language_hint.map(|s| s.to_string());
                async move {
                    let result = self.transcribe_single(&chunk_path, language.as_deref()).await;
                    (idx, time_offset, result)
                }
            })
            .buffer_unordered(self.max_concurrent_chunks);

        while let Some((idx, time_offset, result)) = stream.next().await {
            pb.inc(1);
            match result {
                Ok((segments, language, no_speech)) => {
                    results.push((idx, time_offset, segments, language, no_speech));
                }
                Err(e) => {
                    pb.finish_and_clear();
                    drop(temp_dir);
                    // Preserve the classification so transient chunk
                    // failures stay retryable at the pipeline level.
                    return Err(match e {
                        e if e.is_transient() => e,
                        e => SkribentError::Transcription(format!(
                            "Chunk {} at {:.0}s failed: {}",
                            idx, time_offset, e
                        )),
                    });
                }
            }
        }

        pb.finish_and_clear();

        // Sort by chunk index and merge segments with adjusted offsets
        results.sort_by_key(|(idx, ..)| *idx);

        let mut all_segments = Vec::new();
        let mut no_speech_values = Vec::new();
        let mut language = language_hint.unwrap_or("en").to_string();

        for (i, (_, time_offset, mut segments, chunk_language, no_speech)) in
            results.into_iter().enumerate()
        {
            if i == 0 {
                language = chunk_language;
            }
            for segment in &mut segments {
                segment.start_seconds += time_offset;
                segment.end_seconds += time_offset;
            }
            all_segments.extend(segments);
            if let Some(p) = no_speech {
                no_speech_values.push(p);
            }
        }

        drop(temp_dir);

        let mean_no_speech_prob = if no_speech_values.is_empty() {
            None
        } else {
            Some(no_speech_values.iter().sum::<f64>() / no_speech_values.len() as f64)
        };

        Ok(SttTranscript {
            segments: all_segments,
            language,
            mean_no_speech_prob,
        })
    }
}
