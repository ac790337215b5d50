//! CLI output formatting utilities.

use console::style;

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one pipeline run line.
    pub fn run_info(video_title: &str, stage: &str, styles: &str, error: Option<&str>) {
        println!(
            "  {} {} [{}] {}",
            style("*").cyan(),
            style(video_title).bold(),
            style(stage).magenta(),
            style(styles).dim()
        );
        if let Some(e) = error {
            println!("    {}", style(e).red());
        }
    }

    /// Print one article line.
    pub fn article_info(title: &str, style_name: &str, language: &str, published: bool, superseded: bool) {
        let mut flags = Vec::new();
        if published {
            flags.push("published");
        }
        if superseded {
            flags.push("superseded");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", flags.join(", "))
        };
        println!(
            "  {} {} [{}/{}]{}",
            style("*").cyan(),
            style(title).bold(),
            style(style_name).magenta(),
            language,
            style(&flags).dim()
        );
    }
}
