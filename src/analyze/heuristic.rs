//! Deterministic, rule-based content analysis.
//!
//! Splits the transcript into sections by sentence grouping and extracts
//! key points positionally. Serves as the fallback when LLM analysis
//! fails and as the reproducible analyzer in tests.

use super::{AnalyzedContent, Analyzer, ContentSection};
use crate::config::AnalysisSettings;
use crate::error::Result;
use crate::store::{TranscriptRecord, VideoRecord};
use crate::transcript::GAP_MARKER_PREFIX;
use async_trait::async_trait;
use tracing::debug;

/// Approximate speaking rate used to translate the configured section
/// duration into a word budget.
const WORDS_PER_SECOND: f64 = 2.3;

/// Maximum words carried into a section title.
const TITLE_WORDS: usize = 6;

/// Rule-based analyzer.
pub struct HeuristicAnalyzer {
    settings: AnalysisSettings,
}

impl HeuristicAnalyzer {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self { settings }
    }

    fn words_per_section(&self) -> usize {
        ((self.settings.target_section_seconds * WORDS_PER_SECOND) as usize).max(40)
    }
}

#[async_trait]
impl Analyzer for HeuristicAnalyzer {
    async fn analyze(
        &self,
        video: &VideoRecord,
        transcript: &TranscriptRecord,
    ) -> Result<AnalyzedContent> {
        let sentences = split_sentences(&transcript.text);
        let target_words = self.words_per_section();

        let mut sections: Vec<ContentSection> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_words = 0usize;
        let mut current_has_gap = false;

        for sentence in sentences {
            let sentence = if sentence.contains(GAP_MARKER_PREFIX) {
                // Annotate the surrounding section and drop the marker,
                // keeping any real text that shares the pseudo-sentence.
                current_has_gap = true;
                let stripped = strip_gap_marker(&sentence);
                if stripped.is_empty() {
                    continue;
                }
                stripped
            } else {
                sentence
            };

            current_words += sentence.split_whitespace().count();
            current.push(sentence);

            if current_words >= target_words {
                sections.push(build_section(&current, current_has_gap, sections.len()));
                current.clear();
                current_words = 0;
                current_has_gap = false;
            }
        }
        if !current.is_empty() {
            sections.push(build_section(&current, current_has_gap, sections.len()));
        }

        // A transcript that is nothing but gap markers yields no sections;
        // analysis output is never fabricated.
        let key_points: Vec<String> = sections
            .iter()
            .filter(|s| !s.content.is_empty())
            .filter_map(|s| first_sentence(&s.content))
            .take(self.settings.max_key_points)
            .collect();

        let outline: Vec<String> = sections.iter().map(|s| s.title.clone()).collect();

        debug!(
            "Heuristic analysis produced {} sections, {} key points",
            sections.len(),
            key_points.len()
        );

        Ok(AnalyzedContent {
            source_title: video.title.clone(),
            source_url: video.url.clone(),
            language: transcript.language.clone(),
            sections,
            key_points,
            outline,
        })
    }
}

fn build_section(sentences: &[String], has_coverage_gap: bool, index: usize) -> ContentSection {
    let content = sentences.join(" ");
    let title_words: Vec<&str> = content.split_whitespace().take(TITLE_WORDS).collect();
    let title = if title_words.is_empty() {
        format!("Part {}", index + 1)
    } else {
        format!("Part {}: {}", index + 1, title_words.join(" "))
    };
    ContentSection {
        title,
        content,
        has_coverage_gap,
    }
}

/// Split text into sentences on terminal punctuation. Gap markers are
/// kept as standalone pseudo-sentences so section grouping can see them.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for token in text.split_whitespace() {
        current.push_str(token);
        current.push(' ');

        let ends_sentence = token.ends_with('.') || token.ends_with('!') || token.ends_with('?');
        let ends_marker = token.ends_with("s]") && current.contains(GAP_MARKER_PREFIX);
        if ends_sentence || ends_marker {
            sentences.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }

    sentences
}

fn first_sentence(content: &str) -> Option<String> {
    split_sentences(content).into_iter().next()
}

/// Remove the inline gap marker from a pseudo-sentence, keeping any real
/// text around it.
fn strip_gap_marker(sentence: &str) -> String {
    match (sentence.find(GAP_MARKER_PREFIX), sentence.find(']')) {
        (Some(start), Some(end)) if end > start => {
            let mut out = String::with_capacity(sentence.len());
            out.push_str(sentence[..start].trim_end());
            out.push_str(&sentence[end + 1..]);
            out.trim().to_string()
        }
        _ => sentence.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewKeyword, NewTranscript, NewVideo, SqliteStore, TranscriptSource};
    use crate::transcript::CoverageGap;

    fn fixtures(text: &str, gaps: Vec<CoverageGap>) -> (VideoRecord, TranscriptRecord) {
        let store = SqliteStore::in_memory().unwrap();
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
        let video = store
            .insert_or_get_video(NewVideo {
                keyword_id: keyword.id,
                youtube_id: "vid00000001".into(),
                title: "How Compilers Work".into(),
                category: "education".into(),
                url: "https://www.youtube.com/watch?v=vid00000001".into(),
                thumbnail_url: None,
                duration_seconds: 600,
                views: 0,
                likes: 0,
                comments: 0,
                language: "en".into(),
            })
            .unwrap();
        let transcript = store
            .insert_or_get_transcript(NewTranscript {
                video_id: video.id,
                text: text.into(),
                language: "en".into(),
                source: TranscriptSource::Captions,
                low_confidence: false,
                coverage_gaps: gaps,
            })
            .unwrap();
        (video, transcript)
    }

    fn settings() -> AnalysisSettings {
        AnalysisSettings {
            model: "gpt-4o-mini".into(),
            target_section_seconds: 10.0, // small sections for testing
            max_key_points: 3,
            timeout_seconds: 60,
        }
    }

    fn long_text() -> String {
        (0..30)
            .map(|i| format!("Sentence number {} talks about lexing and parsing in detail.", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[tokio::test]
    async fn test_analysis_is_deterministic() {
        let (video, transcript) = fixtures(&long_text(), vec![]);
        let analyzer = HeuristicAnalyzer::new(settings());

        let first = analyzer.analyze(&video, &transcript).await.unwrap();
        let second = analyzer.analyze(&video, &transcript).await.unwrap();

        assert_eq!(first, second);
        assert!(first.sections.len() > 1);
        assert_eq!(first.outline.len(), first.sections.len());
        assert!(first.key_points.len() <= 3);
        assert_eq!(first.source_title, "How Compilers Work");
    }

    #[tokio::test]
    async fn test_gap_marker_annotates_section() {
        let text = format!(
            "The talk begins with tokenizers. {} 80s-120s] The talk resumes with parsers.",
            GAP_MARKER_PREFIX
        );
        let (video, transcript) = fixtures(
            &text,
            vec![CoverageGap {
                start_seconds: 80.0,
                end_seconds: 120.0,
            }],
        );
        let analyzer = HeuristicAnalyzer::new(settings());

        let analyzed = analyzer.analyze(&video, &transcript).await.unwrap();

        // The marker itself never appears in section content.
        for section in &analyzed.sections {
            assert!(!section.content.contains(GAP_MARKER_PREFIX));
        }
        // And at least one section carries the annotation.
        assert!(analyzed.sections.iter().any(|s| s.has_coverage_gap));
    }

    #[tokio::test]
    async fn test_key_points_respect_cap() {
        let (video, transcript) = fixtures(&long_text(), vec![]);
        let analyzer = HeuristicAnalyzer::new(settings());
        let analyzed = analyzer.analyze(&video, &transcript).await.unwrap();
        assert!(analyzed.key_points.len() <= settings().max_key_points);
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First point. Second point! Third?");
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], "First point.");
    }

    #[test]
    fn test_strip_gap_marker_keeps_surrounding_text() {
        let mixed = format!("words without a period {} 80s-120s]", GAP_MARKER_PREFIX);
        assert_eq!(strip_gap_marker(&mixed), "words without a period");

        let bare = format!("{} 80s-120s]", GAP_MARKER_PREFIX);
        assert_eq!(strip_gap_marker(&bare), "");
    }
}
