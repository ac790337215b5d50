//! Quality-gated article generation.

use super::styles::{heading_count, numbered_item_count};
use super::{slugify, ArticleDraft, ArticleStyle, SeoMetadata, StyleSpec};
use crate::analyze::AnalyzedContent;
use crate::config::GenerationSettings;
use crate::error::{Result, SkribentError};
use crate::openai::{classify_api_error, create_client};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Trait for the text-generation collaborator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce a completion for the given prompt at the given
    /// temperature.
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String>;
}

/// OpenAI chat-completion text generator.
pub struct OpenAiTextGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAiTextGenerator {
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| SkribentError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| SkribentError::Generation(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(temperature)
            .build()
            .map_err(|e| SkribentError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| classify_api_error("Generation", e))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| SkribentError::Generation("Empty response from LLM".to_string()))
    }
}

const SYSTEM_PROMPT: &str = "\
You turn structured video analyses into publishable written articles. \
Respond with a single JSON object: {\"title\": string, \"content\": string \
(markdown body), \"tags\": [string], \"seo_description\": string}. \
Sections marked as having a coverage gap describe material with missing \
source audio: summarize only what is present and never invent what the \
missing part might have said.";

/// Generates one article per (analyzed content, style, language) input.
///
/// Drafts failing the quality gate are retried with adjusted parameters
/// up to the configured cap; service trouble propagates unchanged so the
/// orchestrator's backoff can handle it.
pub struct ArticleGenerator {
    textgen: Arc<dyn TextGenerator>,
    settings: GenerationSettings,
}

impl ArticleGenerator {
    pub fn new(textgen: Arc<dyn TextGenerator>, settings: GenerationSettings) -> Self {
        Self { textgen, settings }
    }

    /// Produce a validated article draft in the given style.
    #[instrument(skip(self, analyzed), fields(style = %style))]
    pub async fn generate(
        &self,
        analyzed: &AnalyzedContent,
        style: ArticleStyle,
        language: &str,
    ) -> Result<ArticleDraft> {
        let spec = style.spec();
        let deadline = Duration::from_secs(self.settings.timeout_seconds);
        let mut last_failure = String::new();

        for attempt in 0..=self.settings.quality_retry_cap {
            // Adjusted parameters per retry: warmer sampling plus an
            // explicit corrective instruction.
            let temperature = self.settings.temperature + 0.1 * attempt as f32;
            let user = build_prompt(analyzed, &spec, language, &last_failure);

            let response = tokio::time::timeout(
                deadline,
                self.textgen.complete(SYSTEM_PROMPT, &user, temperature),
            )
            .await
            .map_err(|_| SkribentError::Timeout(format!("Generation of {} article", style)))??;

            let draft = match self.parse_draft(&response, analyzed) {
                Ok(draft) => draft,
                Err(e) => {
                    warn!("Attempt {}: unparseable draft: {}", attempt + 1, e);
                    last_failure = format!("The previous response was not valid JSON: {}", e);
                    continue;
                }
            };

            match validate_draft(&draft, &spec, self.settings.min_words) {
                Ok(()) => {
                    info!(
                        "Generated {} article '{}' on attempt {}",
                        style,
                        draft.title,
                        attempt + 1
                    );
                    return Ok(draft);
                }
                Err(reason) => {
                    warn!("Attempt {}: draft failed validation: {}", attempt + 1, reason);
                    last_failure = reason;
                }
            }
        }

        Err(SkribentError::Quality(format!(
            "{} article failed validation after {} attempts: {}",
            style,
            self.settings.quality_retry_cap + 1,
            last_failure
        )))
    }

    fn parse_draft(&self, response: &str, analyzed: &AnalyzedContent) -> Result<ArticleDraft> {
        let json_start = response.find('{');
        let json_end = response.rfind('}');
        let json_str = match (json_start, json_end) {
            (Some(start), Some(end)) if end > start => &response[start..=end],
            _ => response,
        };

        let parsed: LlmDraft = serde_json::from_str(json_str).map_err(|e| {
            SkribentError::Generation(format!("Failed to parse draft response: {}", e))
        })?;

        let tags = if parsed.tags.is_empty() {
            derive_tags(analyzed)
        } else {
            parsed.tags
        };

        let description = if parsed.seo_description.is_empty() {
            truncate_chars(&parsed.content, 160)
        } else {
            parsed.seo_description
        };

        Ok(ArticleDraft {
            seo: SeoMetadata {
                description,
                slug: slugify(&parsed.title),
                canonical_url: analyzed.source_url.clone(),
            },
            title: parsed.title,
            content: parsed.content,
            tags,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LlmDraft {
    title: String,
    content: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    seo_description: String,
}

fn build_prompt(
    analyzed: &AnalyzedContent,
    spec: &StyleSpec,
    language: &str,
    last_failure: &str,
) -> String {
    let mut prompt = format!(
        "Write a {} in {} based on this video analysis.\n\n{}\n\nSource: {} ({})\n\nOutline:\n",
        spec.display_name, language, spec.instructions, analyzed.source_title, analyzed.source_url
    );
    for topic in &analyzed.outline {
        prompt.push_str(&format!("- {}\n", topic));
    }
    prompt.push_str("\nKey points:\n");
    for point in &analyzed.key_points {
        prompt.push_str(&format!("- {}\n", point));
    }
    prompt.push_str("\nSections:\n");
    for section in &analyzed.sections {
        if section.has_coverage_gap {
            prompt.push_str(&format!(
                "## {} (source audio partially missing)\n{}\n\n",
                section.title, section.content
            ));
        } else {
            prompt.push_str(&format!("## {}\n{}\n\n", section.title, section.content));
        }
    }
    if !last_failure.is_empty() {
        prompt.push_str(&format!(
            "\nYour previous attempt was rejected: {}. Address this in the rewrite.\n",
            last_failure
        ));
    }
    prompt
}

/// The quality gate: minimum length plus the style's structural rules.
fn validate_draft(
    draft: &ArticleDraft,
    spec: &StyleSpec,
    min_words: usize,
) -> std::result::Result<(), String> {
    if draft.title.trim().is_empty() {
        return Err("missing title".into());
    }

    let words = draft.content.split_whitespace().count();
    if words < min_words {
        return Err(format!("body has {} words, minimum is {}", words, min_words));
    }

    let headings = heading_count(&draft.content);
    if headings < spec.min_headings {
        return Err(format!(
            "body has {} headings, {} requires at least {}",
            headings, spec.display_name, spec.min_headings
        ));
    }

    let items = numbered_item_count(&draft.content);
    if items < spec.min_numbered_items {
        return Err(format!(
            "body has {} numbered items, {} requires at least {}",
            items, spec.display_name, spec.min_numbered_items
        ));
    }

    Ok(())
}

/// Fallback tag derivation from the analysis outline.
fn derive_tags(analyzed: &AnalyzedContent) -> Vec<String> {
    analyzed
        .outline
        .iter()
        .take(5)
        .map(|topic| slugify(topic))
        .filter(|t| !t.is_empty())
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::ContentSection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn analyzed() -> AnalyzedContent {
        AnalyzedContent {
            source_title: "How Compilers Work".into(),
            source_url: "https://www.youtube.com/watch?v=vid00000001".into(),
            language: "en".into(),
            sections: vec![ContentSection {
                title: "Lexing".into(),
                content: "Tokens are produced from characters.".into(),
                has_coverage_gap: false,
            }],
            key_points: vec!["Compilers start with lexing.".into()],
            outline: vec!["Lexing".into()],
        }
    }

    /// Generator stub replaying canned responses, recording temperatures.
    struct ScriptedGenerator {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
        temperatures: Mutex<Vec<f32>>,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<String>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
                temperatures: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(&self, _system: &str, _user: &str, temperature: f32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.temperatures.lock().unwrap().push(temperature);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(SkribentError::ServiceUnavailable("script exhausted".into()));
            }
            Ok(responses.remove(0))
        }
    }

    fn good_blog_json() -> String {
        let body = format!(
            "## Opening\n\n{}\n\n## Closing\n\n{}",
            "lexers turn characters into tokens and feed the parser stage ".repeat(20),
            "that is how the front end of a compiler works in practice ".repeat(20),
        );
        serde_json::json!({
            "title": "How Compilers Really Work",
            "content": body,
            "tags": ["compilers", "parsing"],
            "seo_description": "A walk through compiler front ends."
        })
        .to_string()
    }

    fn settings() -> GenerationSettings {
        GenerationSettings {
            model: "gpt-4o".into(),
            min_words: 100,
            quality_retry_cap: 2,
            temperature: 0.7,
            max_concurrent_styles: 4,
            timeout_seconds: 30,
        }
    }

    #[tokio::test]
    async fn test_valid_draft_passes_first_attempt() {
        let stub = Arc::new(ScriptedGenerator::new(vec![good_blog_json()]));
        let generator = ArticleGenerator::new(stub.clone(), settings());

        let draft = generator
            .generate(&analyzed(), ArticleStyle::Blog, "en")
            .await
            .unwrap();

        assert_eq!(draft.title, "How Compilers Really Work");
        assert_eq!(draft.tags, vec!["compilers", "parsing"]);
        assert_eq!(draft.seo.slug, "how-compilers-really-work");
        assert_eq!(
            draft.seo.canonical_url,
            "https://www.youtube.com/watch?v=vid00000001"
        );
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_quality_retry_adjusts_parameters_then_succeeds() {
        let short = serde_json::json!({
            "title": "Too Short",
            "content": "## A\n\nNot enough words here.",
        })
        .to_string();
        let stub = Arc::new(ScriptedGenerator::new(vec![short, good_blog_json()]));
        let generator = ArticleGenerator::new(stub.clone(), settings());

        let draft = generator
            .generate(&analyzed(), ArticleStyle::Blog, "en")
            .await
            .unwrap();

        assert_eq!(draft.title, "How Compilers Really Work");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
        let temps = stub.temperatures.lock().unwrap();
        assert!(temps[1] > temps[0]);
    }

    #[tokio::test]
    async fn test_quality_failure_is_bounded() {
        let short = serde_json::json!({
            "title": "Still Too Short",
            "content": "## A\n\nTiny.",
        })
        .to_string();
        let stub = Arc::new(ScriptedGenerator::new(vec![
            short.clone(),
            short.clone(),
            short,
        ]));
        let generator = ArticleGenerator::new(stub.clone(), settings());

        let err = generator
            .generate(&analyzed(), ArticleStyle::Blog, "en")
            .await
            .unwrap_err();

        assert!(matches!(err, SkribentError::Quality(_)));
        // quality_retry_cap = 2 means 3 attempts total.
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_service_error_propagates_immediately() {
        let stub = Arc::new(ScriptedGenerator::new(vec![]));
        let generator = ArticleGenerator::new(stub.clone(), settings());

        let err = generator
            .generate(&analyzed(), ArticleStyle::Blog, "en")
            .await
            .unwrap_err();

        assert!(matches!(err, SkribentError::ServiceUnavailable(_)));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listicle_requires_numbered_items() {
        let spec = ArticleStyle::Listicle.spec();
        let prose_only = ArticleDraft {
            title: "Ten Things".into(),
            content: "word ".repeat(200),
            tags: vec![],
            seo: SeoMetadata::default(),
        };
        assert!(validate_draft(&prose_only, &spec, 100).is_err());

        let with_list = ArticleDraft {
            title: "Ten Things".into(),
            content: format!("{}\n1. One\n2. Two\n3. Three\n", "word ".repeat(200)),
            tags: vec![],
            seo: SeoMetadata::default(),
        };
        assert!(validate_draft(&with_list, &spec, 100).is_ok());
    }

    #[test]
    fn test_wiki_requires_headings() {
        let spec = ArticleStyle::Wiki.spec();
        let flat = ArticleDraft {
            title: "Entry".into(),
            content: "word ".repeat(200),
            tags: vec![],
            seo: SeoMetadata::default(),
        };
        assert!(validate_draft(&flat, &spec, 100).is_err());
    }

    #[test]
    fn test_derive_tags_from_outline() {
        let tags = derive_tags(&analyzed());
        assert_eq!(tags, vec!["lexing"]);
    }
}
