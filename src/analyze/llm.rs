//! LLM-backed content analysis.
//!
//! Runs at temperature 0.0 so repeated analysis of the same transcript
//! stays reproducible. Falls back to the heuristic analyzer when the
//! response cannot be parsed.

use super::{AnalyzedContent, Analyzer, ContentSection, HeuristicAnalyzer};
use crate::config::AnalysisSettings;
use crate::error::{Result, SkribentError};
use crate::openai::{classify_api_error, create_client};
use crate::store::{TranscriptRecord, VideoRecord};
use crate::transcript::GAP_MARKER_PREFIX;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "\
You structure video transcripts for article writers. Given a transcript, \
identify its logical sections, the key points, and a topic outline. \
Respond with a single JSON object: \
{\"sections\": [{\"title\": string, \"content\": string, \"has_coverage_gap\": bool}], \
\"key_points\": [string], \"outline\": [string]}. \
The transcript may contain markers like \"[coverage gap 80s-120s]\" where \
audio coverage is missing. Never invent content for those stretches: set \
has_coverage_gap on the affected section and leave the marker text out.";

/// Analyzer that structures content through a chat completion.
pub struct LlmAnalyzer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    settings: AnalysisSettings,
    fallback: HeuristicAnalyzer,
}

impl LlmAnalyzer {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self {
            client: create_client(),
            fallback: HeuristicAnalyzer::new(settings.clone()),
            settings,
        }
    }

    /// Parse the LLM response into the analysis payload.
    fn parse_response(response: &str) -> Result<LlmAnalysis> {
        // Try to extract JSON from the response
        let json_start = response.find('{');
        let json_end = response.rfind('}');

        let json_str = match (json_start, json_end) {
            (Some(start), Some(end)) if end > start => &response[start..=end],
            _ => response,
        };

        serde_json::from_str(json_str).map_err(|e| {
            SkribentError::Analysis(format!(
                "Failed to parse analysis response: {}. Response was: {}",
                e,
                &response[..response.len().min(500)]
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
struct LlmAnalysis {
    sections: Vec<LlmSection>,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    outline: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LlmSection {
    title: String,
    content: String,
    #[serde(default)]
    has_coverage_gap: bool,
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn analyze(
        &self,
        video: &VideoRecord,
        transcript: &TranscriptRecord,
    ) -> Result<AnalyzedContent> {
        if transcript.text.trim().is_empty() {
            return Err(SkribentError::Analysis("Transcript is empty".into()));
        }

        info!("Analyzing transcript {} with {}", transcript.id, self.settings.model);

        let user_message = format!(
            "Video title: {}\nLanguage: {}\nMax key points: {}\n\nTranscript:\n{}",
            video.title, transcript.language, self.settings.max_key_points, transcript.text
        );

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| SkribentError::Analysis(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| SkribentError::Analysis(e.to_string()))?
                .into(),
        ];

        // Temperature 0.0: identical transcript and configuration must
        // keep producing the same structure.
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| SkribentError::Analysis(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| classify_api_error("Analysis", e))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| SkribentError::Analysis("Empty response from LLM".to_string()))?;

        debug!("Analysis response: {}", &content[..content.len().min(500)]);

        match Self::parse_response(content) {
            Ok(parsed) => {
                let sections: Vec<ContentSection> = parsed
                    .sections
                    .into_iter()
                    .map(|s| ContentSection {
                        // A section that slipped through with marker text
                        // still gets flagged rather than trusted.
                        has_coverage_gap: s.has_coverage_gap
                            || s.content.contains(GAP_MARKER_PREFIX),
                        title: s.title,
                        content: s.content.replace(GAP_MARKER_PREFIX, "").trim().to_string(),
                    })
                    .collect();

                let outline = if parsed.outline.is_empty() {
                    sections.iter().map(|s| s.title.clone()).collect()
                } else {
                    parsed.outline
                };

                Ok(AnalyzedContent {
                    source_title: video.title.clone(),
                    source_url: video.url.clone(),
                    language: transcript.language.clone(),
                    sections,
                    key_points: parsed
                        .key_points
                        .into_iter()
                        .take(self.settings.max_key_points)
                        .collect(),
                    outline,
                })
            }
            Err(e) => {
                warn!("LLM analysis failed, falling back to heuristic: {}", e);
                self.fallback.analyze(video, transcript).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let json = r#"{
            "sections": [
                {"title": "Introduction", "content": "Welcome to the show."},
                {"title": "Main", "content": "The core ideas.", "has_coverage_gap": true}
            ],
            "key_points": ["Welcome"],
            "outline": ["Introduction", "Main"]
        }"#;

        let parsed = LlmAnalyzer::parse_response(json).unwrap();
        assert_eq!(parsed.sections.len(), 2);
        assert!(!parsed.sections[0].has_coverage_gap);
        assert!(parsed.sections[1].has_coverage_gap);
        assert_eq!(parsed.key_points, vec!["Welcome"]);
    }

    #[test]
    fn test_parse_response_with_markdown_fences() {
        let response = r#"Here is the structure:

```json
{"sections": [{"title": "Part 1", "content": "Text."}], "key_points": [], "outline": []}
```

That covers everything."#;

        let parsed = LlmAnalyzer::parse_response(response).unwrap();
        assert_eq!(parsed.sections.len(), 1);
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        assert!(LlmAnalyzer::parse_response("no json here").is_err());
    }
}
