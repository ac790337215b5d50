//! The pipeline orchestrator.
//!
//! Coordinates one unit of work through its stages. Every stage's output
//! is durably persisted before the next stage starts, so a crashed or
//! cancelled run resumes from the first incomplete stage instead of
//! restarting.

use super::{CancelToken, PipelineReport, RetryPolicy, Stage, StyleOutcome, StyleResult};
use crate::analyze::{AnalyzedContent, Analyzer, LlmAnalyzer};
use crate::config::Settings;
use crate::error::{Result, SkribentError};
use crate::generate::{ArticleGenerator, ArticleStyle, OpenAiTextGenerator, TextGenerator};
use crate::media::{primary_subtag, MediaAcquirer, MediaBundle, MediaSource, YtDlpSource};
use crate::store::{
    NewArticle, NewKeyword, PipelineRunRecord, SqliteStore, TranscriptRecord, VideoRecord,
};
use crate::transcript::{SpeechToText, TranscriptResolver, WhisperStt};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One unit of work: a video and the styles to generate for it.
#[derive(Debug, Clone)]
pub struct WorkRequest {
    /// Video URL or bare external id.
    pub video_ref: String,
    /// Keyword the video belongs to.
    pub keyword: String,
    /// Styles to generate.
    pub styles: Vec<ArticleStyle>,
    /// Requested article language; the video's native language when None.
    pub language: Option<String>,
    /// Supersede the existing transcript instead of reusing it.
    pub force_transcript: bool,
    /// Supersede existing articles instead of reusing them.
    pub force_regenerate: bool,
}

/// The main orchestrator for the Skribent pipeline.
pub struct Orchestrator {
    settings: Settings,
    store: Arc<SqliteStore>,
    acquirer: MediaAcquirer,
    resolver: TranscriptResolver,
    analyzer: Arc<dyn Analyzer>,
    generator: ArticleGenerator,
    retry: RetryPolicy,
}

impl Orchestrator {
    /// Create an orchestrator with the production collaborators (yt-dlp,
    /// Whisper, OpenAI chat models).
    pub fn new(settings: Settings) -> Result<Self> {
        let store = Arc::new(SqliteStore::new(&settings.db_path())?);
        let source: Arc<dyn MediaSource> = Arc::new(YtDlpSource::new());
        let stt: Arc<dyn SpeechToText> = Arc::new(WhisperStt::with_config(
            &settings.transcription.model,
            settings.transcription.chunk_duration_seconds,
            settings.transcription.max_concurrent_chunks,
        ));
        let analyzer: Arc<dyn Analyzer> = Arc::new(LlmAnalyzer::new(settings.analysis.clone()));
        let textgen: Arc<dyn TextGenerator> =
            Arc::new(OpenAiTextGenerator::new(&settings.generation.model));

        Ok(Self::with_components(
            settings, store, source, stt, analyzer, textgen,
        ))
    }

    /// Create an orchestrator with custom collaborators.
    pub fn with_components(
        settings: Settings,
        store: Arc<SqliteStore>,
        source: Arc<dyn MediaSource>,
        stt: Arc<dyn SpeechToText>,
        analyzer: Arc<dyn Analyzer>,
        textgen: Arc<dyn TextGenerator>,
    ) -> Self {
        let acquirer = MediaAcquirer::new(source, store.clone(), settings.clone());
        let resolver = TranscriptResolver::new(stt, store.clone(), settings.clone());
        let generator = ArticleGenerator::new(textgen, settings.generation.clone());
        let retry = RetryPolicy::new(&settings.retry);

        Self {
            settings,
            store,
            acquirer,
            resolver,
            analyzer,
            generator,
            retry,
        }
    }

    /// Get a reference to the store.
    pub fn store(&self) -> Arc<SqliteStore> {
        self.store.clone()
    }

    /// Execute one unit of work end to end.
    ///
    /// Returns a report with per-style outcomes; partial success is a
    /// valid terminal outcome. Cancellation between stages leaves the
    /// run resumable.
    #[instrument(skip(self, request, cancel), fields(video_ref = %request.video_ref))]
    pub async fn process(
        &self,
        request: &WorkRequest,
        cancel: &CancelToken,
    ) -> Result<PipelineReport> {
        if request.styles.is_empty() {
            return Err(SkribentError::InvalidInput(
                "At least one article style is required".into(),
            ));
        }

        let keyword = self.store.insert_or_get_keyword(NewKeyword {
            keyword: request.keyword.clone(),
            rank: 0,
            score: 0,
            platform: "manual".into(),
            region: self.settings.general.region.code().to_string(),
            metadata: serde_json::json!({}),
            bucket: Utc::now().format("%Y-%m-%d").to_string(),
        })?;

        // Stage: acquire. Idempotent, so a resumed run gets a cache hit
        // here rather than a second download.
        let bundle = self
            .retry
            .run("media acquisition", || {
                self.acquirer.acquire(&request.video_ref, keyword.id)
            })
            .await?;
        let video = bundle.video.clone();

        let (run, resumed_from) = match self.store.find_active_run(video.id)? {
            Some(run) => {
                info!("Resuming run {} from stage '{}'", run.id, run.stage);
                let stage = run.stage;
                (run, Some(stage))
            }
            None => {
                let run = self
                    .store
                    .create_run(video.id, &request.styles, request.language.as_deref().unwrap_or(&video.language))?;
                (run, None)
            }
        };

        if run.stage == Stage::Pending {
            self.store.update_run_stage(run.id, Stage::Acquired)?;
        }

        let language = primary_subtag(request.language.as_deref().unwrap_or(&video.language)).to_string();

        // Stage: transcribe.
        self.check_cancel(cancel, "transcribe")?;
        let transcript = self
            .transcribe_stage(&run, &video, &bundle, &language, request.force_transcript)
            .await?;

        // Stage: analyze.
        self.check_cancel(cancel, "analyze")?;
        let analysis = self.analyze_stage(&run, &video, &transcript).await?;

        // Stage: generate, fanned out per style.
        self.check_cancel(cancel, "generate")?;
        self.store.update_run_stage(run.id, Stage::Generating)?;

        let outcomes: Vec<StyleOutcome> = stream::iter(request.styles.iter().copied())
            .map(|style| {
                self.generate_one(&video, &transcript, &analysis, style, request.force_regenerate)
            })
            .buffer_unordered(self.settings.generation.max_concurrent_styles.max(1))
            .collect()
            .await;

        let generated = outcomes
            .iter()
            .filter(|o| matches!(o.result, StyleResult::Generated(_)))
            .count();

        if generated == 0 {
            self.store
                .mark_run_failed(run.id, Stage::Generating, "all requested styles failed")?;
            warn!("Run {}: every style failed", run.id);
        } else {
            self.store.update_run_stage(run.id, Stage::Complete)?;
            info!(
                "Run {} complete: {}/{} styles generated",
                run.id,
                generated,
                outcomes.len()
            );
        }

        Ok(PipelineReport {
            run_id: run.id,
            video_id: video.id,
            transcript_id: transcript.id,
            outcomes,
            resumed_from,
        })
    }

    /// Resolve the transcript, reusing the persisted row when the run
    /// already passed this stage.
    async fn transcribe_stage(
        &self,
        run: &PipelineRunRecord,
        video: &VideoRecord,
        bundle: &MediaBundle,
        language: &str,
        force_refresh: bool,
    ) -> Result<TranscriptRecord> {
        if run.stage.reached(Stage::Transcribed) && !force_refresh {
            if let Some(existing) = self.store.find_transcript(video.id, language)? {
                return Ok(existing);
            }
            warn!(
                "Run {} says transcribed but no transcript row exists, re-resolving",
                run.id
            );
        }

        let result = self
            .retry
            .run("transcript resolution", || {
                self.resolver
                    .resolve(video, bundle, Some(language), force_refresh)
            })
            .await;
        let transcript = self.fail_run_on_error(run.id, Stage::Transcribed, result)?;

        // The transcript row is durable; only now does the stage advance.
        self.store.update_run_stage(run.id, Stage::Transcribed)?;
        Ok(transcript)
    }

    /// Analyze the transcript, reusing the persisted analysis when the
    /// run already passed this stage.
    async fn analyze_stage(
        &self,
        run: &PipelineRunRecord,
        video: &VideoRecord,
        transcript: &TranscriptRecord,
    ) -> Result<AnalyzedContent> {
        if run.stage.reached(Stage::Analyzed) {
            if let Some(json) = run.analysis_json.as_deref() {
                match serde_json::from_str(json) {
                    Ok(analysis) => return Ok(analysis),
                    // Analysis is deterministic, so redoing it is safe.
                    Err(e) => warn!("Persisted analysis unreadable ({}), re-analyzing", e),
                }
            }
        }

        let deadline = Duration::from_secs(self.settings.analysis.timeout_seconds);
        let result = self
            .retry
            .run("content analysis", || {
                let fut = self.analyzer.analyze(video, transcript);
                async move {
                    tokio::time::timeout(deadline, fut)
                        .await
                        .map_err(|_| SkribentError::Timeout("Content analysis".into()))?
                }
            })
            .await;
        let analysis = self.fail_run_on_error(run.id, Stage::Analyzed, result)?;

        // Persisting the analysis and advancing the stage happen in one
        // write, so ANALYZED is durable before generation starts.
        self.store
            .set_run_analysis(run.id, &serde_json::to_string(&analysis)?)?;
        Ok(analysis)
    }

    /// Generate one style. Failure here never affects sibling styles.
    async fn generate_one(
        &self,
        video: &VideoRecord,
        transcript: &TranscriptRecord,
        analysis: &AnalyzedContent,
        style: ArticleStyle,
        force_regenerate: bool,
    ) -> StyleOutcome {
        if !force_regenerate {
            match self.store.find_article(video.id, transcript.id, style) {
                Ok(Some(existing)) => {
                    info!("Reusing existing {} article {}", style, existing.id);
                    return StyleOutcome {
                        style,
                        result: StyleResult::Generated(existing.id),
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    return StyleOutcome {
                        style,
                        result: StyleResult::Failed(e.to_string()),
                    }
                }
            }
        }

        let result = self
            .retry
            .run("article generation", || {
                self.generator.generate(analysis, style, &transcript.language)
            })
            .await;

        match result {
            Ok(draft) => {
                let insert = self.store.insert_article(
                    NewArticle {
                        keyword_id: video.keyword_id,
                        video_id: video.id,
                        transcript_id: transcript.id,
                        style,
                        article_language: transcript.language.clone(),
                        title: draft.title,
                        content: draft.content,
                        tags: draft.tags,
                        seo_metadata: draft.seo,
                    },
                    force_regenerate,
                );
                match insert {
                    Ok(record) => StyleOutcome {
                        style,
                        result: StyleResult::Generated(record.id),
                    },
                    Err(e) => StyleOutcome {
                        style,
                        result: StyleResult::Failed(e.to_string()),
                    },
                }
            }
            Err(e) => {
                warn!("{} generation failed: {}", style, e);
                StyleOutcome {
                    style,
                    result: StyleResult::Failed(e.to_string()),
                }
            }
        }
    }

    fn check_cancel(&self, cancel: &CancelToken, stage: &str) -> Result<()> {
        if cancel.is_cancelled() {
            info!("Cancelled before stage '{}', run stays resumable", stage);
            return Err(SkribentError::Cancelled(stage.to_string()));
        }
        Ok(())
    }

    /// Record a fatal stage failure on the run row before surfacing it.
    fn fail_run_on_error<T>(&self, run_id: Uuid, stage: Stage, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if let Err(store_err) = self.store.mark_run_failed(run_id, stage, &e.to_string()) {
                    warn!("Could not record run failure: {}", store_err);
                }
                Err(e)
            }
        }
    }
}
