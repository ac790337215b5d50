//! Article generation for Skribent.
//!
//! Turns analyzed content into a styled article. Styles are a closed set
//! of tagged variants sharing one produce contract; adding a style means
//! extending the enum and its spec table, never the orchestrator.

mod generator;
mod styles;

pub use generator::{ArticleGenerator, OpenAiTextGenerator, TextGenerator};
pub use styles::StyleSpec;

use serde::{Deserialize, Serialize};

/// The article styles the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArticleStyle {
    Blog,
    Wiki,
    Listicle,
    DeepDive,
}

impl ArticleStyle {
    /// All known styles, in generation order.
    pub fn all() -> [ArticleStyle; 4] {
        [
            ArticleStyle::Blog,
            ArticleStyle::Wiki,
            ArticleStyle::Listicle,
            ArticleStyle::DeepDive,
        ]
    }
}

impl std::fmt::Display for ArticleStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArticleStyle::Blog => write!(f, "blog"),
            ArticleStyle::Wiki => write!(f, "wiki"),
            ArticleStyle::Listicle => write!(f, "listicle"),
            ArticleStyle::DeepDive => write!(f, "deep-dive"),
        }
    }
}

impl std::str::FromStr for ArticleStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blog" => Ok(ArticleStyle::Blog),
            "wiki" => Ok(ArticleStyle::Wiki),
            "listicle" => Ok(ArticleStyle::Listicle),
            "deep-dive" | "deepdive" | "deep_dive" => Ok(ArticleStyle::DeepDive),
            other => Err(format!("Unknown article style: {}", other)),
        }
    }
}

/// SEO metadata attached to a generated article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoMetadata {
    /// Meta description (~160 characters).
    pub description: String,
    /// URL slug derived from the title.
    pub slug: String,
    /// Canonical URL of the source video.
    pub canonical_url: String,
}

/// A generated article before persistence.
#[derive(Debug, Clone)]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub seo: SeoMetadata,
}

/// Derive a URL slug from a title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut prev_dash = true;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_round_trip() {
        for style in ArticleStyle::all() {
            let parsed: ArticleStyle = style.to_string().parse().unwrap();
            assert_eq!(parsed, style);
        }
        assert!("haiku".parse::<ArticleStyle>().is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("How Compilers Work"), "how-compilers-work");
        assert_eq!(slugify("Rust: 10 Tips & Tricks!"), "rust-10-tips-tricks");
        assert_eq!(slugify("  --  "), "");
    }
}
