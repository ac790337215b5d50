//! Per-style structuring rules.
//!
//! Styles differ only in structuring: section ordering, heading density,
//! and list-vs-prose ratio. The produce contract and error handling are
//! uniform across styles.

use super::ArticleStyle;

/// Structuring rules for one article style.
#[derive(Debug, Clone, Copy)]
pub struct StyleSpec {
    /// Human-readable name used in prompts.
    pub display_name: &'static str,
    /// Structuring instructions injected into the generation prompt.
    pub instructions: &'static str,
    /// Validation: the body must contain at least this many markdown
    /// headings.
    pub min_headings: usize,
    /// Validation: the body must contain a numbered list of at least
    /// this many items.
    pub min_numbered_items: usize,
}

impl ArticleStyle {
    /// The structuring rules for this style.
    pub fn spec(&self) -> StyleSpec {
        match self {
            ArticleStyle::Blog => StyleSpec {
                display_name: "blog post",
                instructions: "Write a conversational blog post: a hook \
                    opening, a handful of short sections with casual \
                    headings, and a closing takeaway. Favor prose over \
                    lists; keep paragraphs short.",
                min_headings: 2,
                min_numbered_items: 0,
            },
            ArticleStyle::Wiki => StyleSpec {
                display_name: "wiki entry",
                instructions: "Write an encyclopedic reference entry: a \
                    neutral summary paragraph first, then densely headed \
                    sections in logical order (overview, background, \
                    details, significance). No first person, no calls to \
                    action.",
                min_headings: 3,
                min_numbered_items: 0,
            },
            ArticleStyle::Listicle => StyleSpec {
                display_name: "listicle",
                instructions: "Write a listicle: a short intro, then a \
                    numbered list where every item has a bold claim and \
                    one or two supporting sentences, then a one-paragraph \
                    wrap-up. The numbered list carries the article.",
                min_headings: 0,
                min_numbered_items: 3,
            },
            ArticleStyle::DeepDive => StyleSpec {
                display_name: "deep-dive article",
                instructions: "Write a long-form deep dive: an extended \
                    introduction framing why the topic matters, thorough \
                    sections with subheadings following the source \
                    outline, and a conclusions section. Technical depth \
                    over brevity.",
                min_headings: 4,
                min_numbered_items: 0,
            },
        }
    }
}

/// Count markdown headings in a body.
pub(crate) fn heading_count(content: &str) -> usize {
    content
        .lines()
        .filter(|l| l.trim_start().starts_with('#'))
        .count()
}

/// Count numbered list items ("1.", "2)", ...) in a body.
pub(crate) fn numbered_item_count(content: &str) -> usize {
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim_start();
            let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return false;
            }
            trimmed[digits.len()..].starts_with('.') || trimmed[digits.len()..].starts_with(')')
        })
        .count()
}
