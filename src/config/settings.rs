//! Configuration settings for Skribent.
//!
//! All pipeline thresholds (caption coverage, gap limits, retry caps,
//! stage deadlines) live here and are passed into components explicitly.

use crate::region::Region;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub acquisition: AcquisitionSettings,
    pub captions: CaptionSettings,
    pub transcription: TranscriptionSettings,
    pub analysis: AnalysisSettings,
    pub generation: GenerationSettings,
    pub retry: RetrySettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data (database, media artifacts).
    pub data_dir: String,
    /// Directory for temporary files (extracted audio, chunks).
    pub temp_dir: String,
    /// Path to the SQLite database.
    pub db_path: String,
    /// Default region for keywords created via the CLI.
    pub region: Region,
    /// Default article language when none is requested.
    pub language: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.skribent".to_string(),
            temp_dir: "/tmp/skribent".to_string(),
            db_path: "~/.skribent/skribent.db".to_string(),
            region: Region::Us,
            language: "en".to_string(),
        }
    }
}

/// Media acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Directory where downloaded media artifacts are kept, id-addressed.
    pub media_dir: String,
    /// Maximum media duration to process (in seconds).
    pub max_duration_seconds: u32,
    /// Deadline for a single download attempt (in seconds).
    pub timeout_seconds: u64,
    /// Allowed deviation between reported and actual filesize before the
    /// artifact is treated as a partial download (fraction, 0.0-1.0).
    pub size_tolerance: f64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            media_dir: "~/.skribent/media".to_string(),
            max_duration_seconds: 7200, // 2 hours
            timeout_seconds: 600,
            size_tolerance: 0.05,
        }
    }
}

/// Policy for judging whether native captions are usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    /// Minimum fraction of the media duration the captions must cover.
    pub min_coverage: f64,
    /// Largest tolerated gap between consecutive caption segments, in
    /// seconds, before the captions are rejected in favour of STT.
    pub max_gap_seconds: f64,
    /// Gaps longer than this are recorded on the transcript either way.
    pub record_gap_seconds: f64,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            min_coverage: 0.85,
            max_gap_seconds: 30.0,
            record_gap_seconds: 10.0,
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Whisper model to use.
    pub model: String,
    /// Duration in seconds for splitting long audio files.
    pub chunk_duration_seconds: u32,
    /// Maximum concurrent chunk transcriptions.
    pub max_concurrent_chunks: usize,
    /// Deadline for transcribing a single chunk (in seconds).
    pub timeout_seconds: u64,
    /// Mean no-speech probability above which a transcript is flagged
    /// low-confidence (stored anyway).
    pub low_confidence_threshold: f64,
    /// Languages the STT collaborator supports.
    pub supported_languages: Vec<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            chunk_duration_seconds: 120,
            max_concurrent_chunks: 3,
            timeout_seconds: 300,
            low_confidence_threshold: 0.5,
            supported_languages: vec![
                "en".into(),
                "zh".into(),
                "ja".into(),
                "ko".into(),
                "es".into(),
                "de".into(),
                "fr".into(),
            ],
        }
    }
}

/// Content analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Model for LLM-backed analysis. The heuristic analyzer ignores this.
    pub model: String,
    /// Target section duration in seconds for the heuristic analyzer.
    pub target_section_seconds: f64,
    /// Maximum number of key points to extract.
    pub max_key_points: usize,
    /// Deadline for an analysis LLM call (in seconds).
    pub timeout_seconds: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            target_section_seconds: 180.0,
            max_key_points: 8,
            timeout_seconds: 120,
        }
    }
}

/// Article generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Model for article prose.
    pub model: String,
    /// Minimum word count a draft must reach to pass validation.
    pub min_words: usize,
    /// How many times to retry a draft that fails quality validation,
    /// with adjusted parameters each attempt.
    pub quality_retry_cap: u32,
    /// Base sampling temperature; bumped on each quality retry.
    pub temperature: f32,
    /// Maximum concurrent style generations for one video.
    pub max_concurrent_styles: usize,
    /// Deadline for a single generation call (in seconds).
    pub timeout_seconds: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            min_words: 300,
            quality_retry_cap: 2,
            temperature: 0.7,
            max_concurrent_styles: 4,
            timeout_seconds: 180,
        }
    }
}

/// Backoff policy for transient errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum retry attempts for a transient failure.
    pub max_attempts: u32,
    /// Base delay for exponential backoff, in milliseconds.
    pub base_delay_ms: u64,
    /// Delay cap, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SkribentError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skribent")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded database path.
    pub fn db_path(&self) -> PathBuf {
        Self::expand_path(&self.general.db_path)
    }

    /// Get the expanded media artifact directory.
    pub fn media_dir(&self) -> PathBuf {
        Self::expand_path(&self.acquisition.media_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let settings = Settings::default();
        assert!(settings.captions.min_coverage > 0.0 && settings.captions.min_coverage <= 1.0);
        assert!(settings.retry.max_attempts > 0);
        assert!(settings.generation.quality_retry_cap > 0);
        assert_eq!(settings.general.language, "en");
    }

    #[test]
    fn test_toml_round_trip() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.captions.min_coverage, settings.captions.min_coverage);
        assert_eq!(parsed.transcription.model, settings.transcription.model);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            [captions]
            min_coverage = 0.5
        "#;
        let parsed: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.captions.min_coverage, 0.5);
        assert_eq!(parsed.retry.max_attempts, RetrySettings::default().max_attempts);
    }
}
