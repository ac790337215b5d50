//! Configuration management for Skribent.

mod settings;

pub use settings::{
    AcquisitionSettings, AnalysisSettings, CaptionSettings, GeneralSettings, GenerationSettings,
    RetrySettings, Settings, TranscriptionSettings,
};
