//! Command implementations.

use crate::cli::{preflight, Output};
use crate::config::Settings;
use crate::generate::ArticleStyle;
use crate::pipeline::{CancelToken, Orchestrator, StyleResult, WorkRequest};
use crate::store::SqliteStore;
use anyhow::Result;
use console::style;

/// Run the init command: write the default configuration.
pub fn run_init(settings: &Settings) -> Result<()> {
    let path = Settings::default_config_path();
    if path.exists() {
        Output::info(&format!("Configuration already exists at {:?}", path));
    } else {
        settings.save()?;
        Output::success(&format!("Wrote default configuration to {:?}", path));
    }

    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.media_dir())?;
    Output::kv("Data directory", &settings.data_dir().to_string_lossy());
    Output::kv("Database", &settings.db_path().to_string_lossy());
    Ok(())
}

/// Run the doctor command: verify tools and configuration.
pub fn run_doctor(settings: &Settings) -> Result<()> {
    Output::header("Skribent Doctor");

    let checks: Vec<(&str, crate::error::Result<()>)> = vec![
        ("OPENAI_API_KEY", preflight::check_api_key()),
        ("yt-dlp", preflight::check_tool("yt-dlp")),
        ("ffmpeg", preflight::check_tool("ffmpeg")),
        ("ffprobe", preflight::check_tool("ffprobe")),
    ];

    let mut failures = 0;
    for (name, result) in checks {
        match result {
            Ok(()) => println!("  {} {}", style("✓").green(), style(name).bold()),
            Err(e) => {
                failures += 1;
                println!("  {} {} - {}", style("✗").red(), style(name).bold(), e);
            }
        }
    }

    println!();
    Output::kv("Config file", &Settings::default_config_path().to_string_lossy());
    Output::kv("Database", &settings.db_path().to_string_lossy());

    if failures == 0 {
        Output::success("All checks passed");
    } else {
        Output::warning(&format!("{} check(s) failed", failures));
    }
    Ok(())
}

/// Run the pipeline for one video.
#[allow(clippy::too_many_arguments)]
pub async fn run_pipeline(
    video: &str,
    keyword: &str,
    styles: &str,
    language: Option<String>,
    force_transcript: bool,
    force_regenerate: bool,
    settings: Settings,
) -> Result<()> {
    preflight::check_pipeline()?;

    let styles = parse_styles(styles)?;
    let orchestrator = Orchestrator::new(settings)?;
    let cancel = CancelToken::new();

    // Ctrl-C cancels between stages; completed stages stay persisted.
    let ctrlc_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            Output::warning("Cancelling after the current stage...");
            ctrlc_token.cancel();
        }
    });

    let request = WorkRequest {
        video_ref: video.to_string(),
        keyword: keyword.to_string(),
        styles,
        language,
        force_transcript,
        force_regenerate,
    };

    Output::info(&format!("Processing {}", video));
    let report = orchestrator.process(&request, &cancel).await?;

    Output::header("Results");
    for outcome in &report.outcomes {
        match &outcome.result {
            StyleResult::Generated(id) => {
                Output::success(&format!("{}: article {}", outcome.style, id));
            }
            StyleResult::Failed(reason) => {
                Output::error(&format!("{}: {}", outcome.style, reason));
            }
        }
    }
    println!();
    Output::kv(
        "Generated",
        &format!("{}/{}", report.generated_count(), report.outcomes.len()),
    );
    if let Some(stage) = report.resumed_from {
        Output::kv("Resumed from", &stage.to_string());
    }

    Ok(())
}

/// Show pipeline runs.
pub fn run_status(settings: Settings) -> Result<()> {
    let store = SqliteStore::new(&settings.db_path())?;
    let runs = store.list_runs()?;

    if runs.is_empty() {
        Output::info("No pipeline runs yet. Use 'skribent run <video> --keyword <kw>' to start one.");
        return Ok(());
    }

    Output::header(&format!("Pipeline Runs ({})", runs.len()));
    println!();
    for run in &runs {
        let title = store
            .get_video(run.video_id)?
            .map(|v| v.title)
            .unwrap_or_else(|| run.video_id.to_string());
        let styles = run
            .styles
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let error = match (&run.failed_stage, &run.error) {
            (Some(stage), Some(e)) => Some(format!("failed at {}: {}", stage, e)),
            _ => None,
        };
        Output::run_info(&title, &run.stage.to_string(), &styles, error.as_deref());
    }
    Ok(())
}

/// List generated articles.
pub fn run_articles(video: Option<&str>, settings: Settings) -> Result<()> {
    let store = SqliteStore::new(&settings.db_path())?;

    let video_id = match video {
        Some(youtube_id) => match store.find_video_by_youtube_id(youtube_id)? {
            Some(v) => Some(v.id),
            None => {
                Output::error(&format!("No video with id '{}'", youtube_id));
                return Ok(());
            }
        },
        None => None,
    };

    let articles = store.list_articles(video_id)?;
    if articles.is_empty() {
        Output::info("No articles generated yet.");
        return Ok(());
    }

    Output::header(&format!("Articles ({})", articles.len()));
    println!();
    for article in &articles {
        Output::article_info(
            &article.title,
            &article.style.to_string(),
            &article.article_language,
            article.published,
            article.superseded,
        );
    }
    Ok(())
}

fn parse_styles(input: &str) -> Result<Vec<ArticleStyle>> {
    let mut styles = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part == "all" {
            return Ok(ArticleStyle::all().to_vec());
        }
        let style: ArticleStyle = part
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        if !styles.contains(&style) {
            styles.push(style);
        }
    }
    if styles.is_empty() {
        anyhow::bail!("No valid styles in '{}'", input);
    }
    Ok(styles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_styles() {
        assert_eq!(
            parse_styles("blog,wiki").unwrap(),
            vec![ArticleStyle::Blog, ArticleStyle::Wiki]
        );
        assert_eq!(parse_styles("all").unwrap().len(), 4);
        assert_eq!(parse_styles("blog, blog").unwrap(), vec![ArticleStyle::Blog]);
        assert!(parse_styles("sonnet").is_err());
        assert!(parse_styles("").is_err());
    }
}
