//! SQLite-backed relational store.
//!
//! A single `Mutex<Connection>` in WAL mode. Uniqueness invariants are
//! backed by partial unique indexes and re-checked with check-and-insert
//! under a transaction, so concurrent retries cannot create duplicates.

use super::{
    ArticleRecord, KeywordRecord, NewArticle, NewKeyword, NewTranscript, NewVideo,
    PipelineRunRecord, TranscriptRecord, TranscriptSource, VideoRecord,
};
use crate::error::{Result, SkribentError};
use crate::generate::ArticleStyle;
use crate::pipeline::Stage;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS keywords (
    id TEXT PRIMARY KEY,
    keyword TEXT NOT NULL,
    rank INTEGER NOT NULL,
    score INTEGER NOT NULL,
    platform TEXT NOT NULL,
    region TEXT NOT NULL,
    metadata TEXT NOT NULL,
    bucket TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_keywords_identity
    ON keywords(platform, region, keyword, bucket);

CREATE TABLE IF NOT EXISTS videos (
    id TEXT PRIMARY KEY,
    keyword_id TEXT NOT NULL REFERENCES keywords(id),
    youtube_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    category TEXT NOT NULL,
    url TEXT NOT NULL,
    thumbnail_url TEXT,
    duration_seconds INTEGER NOT NULL,
    views INTEGER NOT NULL,
    likes INTEGER NOT NULL,
    comments INTEGER NOT NULL,
    language TEXT NOT NULL,
    media_path TEXT,
    media_complete INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transcripts (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL REFERENCES videos(id),
    text TEXT NOT NULL,
    language TEXT NOT NULL,
    source TEXT NOT NULL,
    low_confidence INTEGER NOT NULL DEFAULT 0,
    coverage_gaps TEXT NOT NULL,
    stale INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_transcripts_video_language
    ON transcripts(video_id, language) WHERE stale = 0;

CREATE TABLE IF NOT EXISTS articles (
    id TEXT PRIMARY KEY,
    keyword_id TEXT NOT NULL REFERENCES keywords(id),
    video_id TEXT NOT NULL REFERENCES videos(id),
    transcript_id TEXT NOT NULL REFERENCES transcripts(id),
    style TEXT NOT NULL,
    article_language TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    tags TEXT NOT NULL,
    seo_metadata TEXT NOT NULL,
    published INTEGER NOT NULL DEFAULT 0,
    superseded INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_generation
    ON articles(video_id, transcript_id, style) WHERE superseded = 0;

CREATE TABLE IF NOT EXISTS pipeline_runs (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL REFERENCES videos(id),
    styles TEXT NOT NULL,
    language TEXT NOT NULL,
    stage TEXT NOT NULL,
    failed_stage TEXT,
    error TEXT,
    analysis_json TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_video ON pipeline_runs(video_id);
"#;

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SkribentError::Store(format!("Failed to acquire lock: {}", e)))
    }

    // ========================================================================
    // Keywords
    // ========================================================================

    /// Insert a keyword, or return the existing row with the same identity
    /// (platform, region, keyword, bucket). Existing rows get their rank
    /// and score refreshed.
    #[instrument(skip(self, new), fields(keyword = %new.keyword))]
    pub fn insert_or_get_keyword(&self, new: NewKeyword) -> Result<KeywordRecord> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let existing = tx
            .query_row(
                "SELECT id FROM keywords
                 WHERE platform = ?1 AND region = ?2 AND keyword = ?3 AND bucket = ?4",
                params![new.platform, new.region, new.keyword, new.bucket],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        let id = match existing {
            Some(id_str) => {
                tx.execute(
                    "UPDATE keywords SET rank = ?1, score = ?2, updated_at = ?3 WHERE id = ?4",
                    params![new.rank, new.score, Utc::now().to_rfc3339(), id_str],
                )?;
                id_str
            }
            None => {
                let id = Uuid::new_v4().to_string();
                let now = Utc::now().to_rfc3339();
                tx.execute(
                    "INSERT INTO keywords
                     (id, keyword, rank, score, platform, region, metadata, bucket, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        id,
                        new.keyword,
                        new.rank,
                        new.score,
                        new.platform,
                        new.region,
                        new.metadata.to_string(),
                        new.bucket,
                        now,
                        now,
                    ],
                )?;
                id
            }
        };

        let record = keyword_by_id(&tx, &id)?
            .ok_or_else(|| SkribentError::Store("Keyword vanished during insert".into()))?;
        tx.commit()?;
        Ok(record)
    }

    /// Fetch a keyword by id.
    pub fn get_keyword(&self, id: Uuid) -> Result<Option<KeywordRecord>> {
        let conn = self.conn()?;
        keyword_by_id(&conn, &id.to_string())
    }

    // ========================================================================
    // Videos
    // ========================================================================

    /// Insert a video, or return the existing row for the same YouTube id.
    /// Existing rows get their engagement counters refreshed; content
    /// fields are left untouched.
    #[instrument(skip(self, new), fields(youtube_id = %new.youtube_id))]
    pub fn insert_or_get_video(&self, new: NewVideo) -> Result<VideoRecord> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let existing = tx
            .query_row(
                "SELECT id FROM videos WHERE youtube_id = ?1",
                params![new.youtube_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        let id = match existing {
            Some(id_str) => {
                tx.execute(
                    "UPDATE videos SET views = ?1, likes = ?2, comments = ?3, updated_at = ?4
                     WHERE id = ?5",
                    params![
                        new.views,
                        new.likes,
                        new.comments,
                        Utc::now().to_rfc3339(),
                        id_str
                    ],
                )?;
                debug!("Refreshed engagement for existing video");
                id_str
            }
            None => {
                let id = Uuid::new_v4().to_string();
                let now = Utc::now().to_rfc3339();
                tx.execute(
                    "INSERT INTO videos
                     (id, keyword_id, youtube_id, title, category, url, thumbnail_url,
                      duration_seconds, views, likes, comments, language,
                      media_path, media_complete, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL, 0, ?13, ?14)",
                    params![
                        id,
                        new.keyword_id.to_string(),
                        new.youtube_id,
                        new.title,
                        new.category,
                        new.url,
                        new.thumbnail_url,
                        new.duration_seconds,
                        new.views,
                        new.likes,
                        new.comments,
                        new.language,
                        now,
                        now,
                    ],
                )?;
                id
            }
        };

        let record = video_by_id(&tx, &id)?
            .ok_or_else(|| SkribentError::Store("Video vanished during insert".into()))?;
        tx.commit()?;
        Ok(record)
    }

    /// Fetch a video by id.
    pub fn get_video(&self, id: Uuid) -> Result<Option<VideoRecord>> {
        let conn = self.conn()?;
        video_by_id(&conn, &id.to_string())
    }

    /// Fetch a video by its YouTube id.
    pub fn find_video_by_youtube_id(&self, youtube_id: &str) -> Result<Option<VideoRecord>> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT id FROM videos WHERE youtube_id = ?1",
                params![youtube_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match id {
            Some(id) => video_by_id(&conn, &id),
            None => Ok(None),
        }
    }

    /// Record the verified media artifact for a video. This is the
    /// mark-complete step: path and flag are set in one statement, only
    /// after integrity verification succeeded.
    pub fn set_media_artifact(&self, video_id: Uuid, path: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE videos SET media_path = ?1, media_complete = 1, updated_at = ?2 WHERE id = ?3",
            params![path, Utc::now().to_rfc3339(), video_id.to_string()],
        )?;
        if updated == 0 {
            return Err(SkribentError::Store(format!(
                "No video row for {}",
                video_id
            )));
        }
        Ok(())
    }

    /// Drop a video's media artifact record (failed verification or
    /// deliberate re-download).
    pub fn clear_media_artifact(&self, video_id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE videos SET media_path = NULL, media_complete = 0, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), video_id.to_string()],
        )?;
        Ok(())
    }

    // ========================================================================
    // Transcripts
    // ========================================================================

    /// Insert a transcript, or return the existing non-stale row for the
    /// same (video, language). The partial unique index makes this safe
    /// under concurrent retries.
    #[instrument(skip(self, new), fields(video_id = %new.video_id, language = %new.language))]
    pub fn insert_or_get_transcript(&self, new: NewTranscript) -> Result<TranscriptRecord> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        if video_by_id(&tx, &new.video_id.to_string())?.is_none() {
            return Err(SkribentError::Integrity(format!(
                "Transcript references missing video {}",
                new.video_id
            )));
        }

        let existing = transcript_for(&tx, &new.video_id.to_string(), &new.language)?;
        if let Some(record) = existing {
            debug!("Returning existing transcript {}", record.id);
            tx.commit()?;
            return Ok(record);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let gaps_json = serde_json::to_string(&new.coverage_gaps)?;
        tx.execute(
            "INSERT INTO transcripts
             (id, video_id, text, language, source, low_confidence, coverage_gaps, stale,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9)",
            params![
                id,
                new.video_id.to_string(),
                new.text,
                new.language,
                new.source.to_string(),
                new.low_confidence as i64,
                gaps_json,
                now,
                now,
            ],
        )?;

        let record = transcript_by_id(&tx, &id)?
            .ok_or_else(|| SkribentError::Store("Transcript vanished during insert".into()))?;
        tx.commit()?;
        info!("Stored transcript {} ({})", record.id, record.source);
        Ok(record)
    }

    /// The current (non-stale) transcript for a (video, language) pair.
    pub fn find_transcript(&self, video_id: Uuid, language: &str) -> Result<Option<TranscriptRecord>> {
        let conn = self.conn()?;
        transcript_for(&conn, &video_id.to_string(), language)
    }

    /// Fetch a transcript by id, stale or not.
    pub fn get_transcript(&self, id: Uuid) -> Result<Option<TranscriptRecord>> {
        let conn = self.conn()?;
        transcript_by_id(&conn, &id.to_string())
    }

    /// Mark the current transcript for (video, language) stale so a fresh
    /// row can supersede it. Returns the number of rows marked.
    pub fn supersede_transcript(&self, video_id: Uuid, language: &str) -> Result<usize> {
        let conn = self.conn()?;
        let marked = conn.execute(
            "UPDATE transcripts SET stale = 1, updated_at = ?1
             WHERE video_id = ?2 AND language = ?3 AND stale = 0",
            params![Utc::now().to_rfc3339(), video_id.to_string(), language],
        )?;
        if marked > 0 {
            info!("Marked {} transcript(s) stale for supersede", marked);
        }
        Ok(marked)
    }

    // ========================================================================
    // Articles
    // ========================================================================

    /// Insert an article after verifying the (keyword, video, transcript)
    /// triple is mutually consistent. If a non-superseded row already
    /// exists for (video, transcript, style), it is returned unchanged
    /// unless `supersede` is set, in which case the old row is marked
    /// superseded and the new row inserted.
    #[instrument(skip(self, new), fields(video_id = %new.video_id, style = %new.style))]
    pub fn insert_article(&self, new: NewArticle, supersede: bool) -> Result<ArticleRecord> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let video = video_by_id(&tx, &new.video_id.to_string())?.ok_or_else(|| {
            SkribentError::Integrity(format!("Article references missing video {}", new.video_id))
        })?;
        let transcript = transcript_by_id(&tx, &new.transcript_id.to_string())?.ok_or_else(|| {
            SkribentError::Integrity(format!(
                "Article references missing transcript {}",
                new.transcript_id
            ))
        })?;

        if transcript.video_id != new.video_id {
            return Err(SkribentError::Integrity(format!(
                "Transcript {} belongs to video {}, not {}",
                new.transcript_id, transcript.video_id, new.video_id
            )));
        }
        if video.keyword_id != new.keyword_id {
            return Err(SkribentError::Integrity(format!(
                "Video {} belongs to keyword {}, not {}",
                new.video_id, video.keyword_id, new.keyword_id
            )));
        }
        if new.article_language != transcript.language {
            return Err(SkribentError::Integrity(format!(
                "Article language '{}' does not match transcript language '{}'",
                new.article_language, transcript.language
            )));
        }

        let existing = tx
            .query_row(
                "SELECT id FROM articles
                 WHERE video_id = ?1 AND transcript_id = ?2 AND style = ?3 AND superseded = 0",
                params![
                    new.video_id.to_string(),
                    new.transcript_id.to_string(),
                    new.style.to_string()
                ],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        if let Some(existing_id) = existing {
            if !supersede {
                let record = article_by_id(&tx, &existing_id)?
                    .ok_or_else(|| SkribentError::Store("Article vanished".into()))?;
                tx.commit()?;
                return Ok(record);
            }
            tx.execute(
                "UPDATE articles SET superseded = 1, updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), existing_id],
            )?;
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO articles
             (id, keyword_id, video_id, transcript_id, style, article_language, title, content,
              tags, seo_metadata, published, superseded, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, 0, ?11, ?12)",
            params![
                id,
                new.keyword_id.to_string(),
                new.video_id.to_string(),
                new.transcript_id.to_string(),
                new.style.to_string(),
                new.article_language,
                new.title,
                new.content,
                serde_json::to_string(&new.tags)?,
                serde_json::to_string(&new.seo_metadata)?,
                now,
                now,
            ],
        )?;

        let record = article_by_id(&tx, &id)?
            .ok_or_else(|| SkribentError::Store("Article vanished during insert".into()))?;
        tx.commit()?;
        info!("Stored {} article '{}'", record.style, record.title);
        Ok(record)
    }

    /// The current (non-superseded) article for a (video, transcript,
    /// style) combination.
    pub fn find_article(
        &self,
        video_id: Uuid,
        transcript_id: Uuid,
        style: ArticleStyle,
    ) -> Result<Option<ArticleRecord>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT * FROM articles
                 WHERE video_id = ?1 AND transcript_id = ?2 AND style = ?3 AND superseded = 0",
                params![
                    video_id.to_string(),
                    transcript_id.to_string(),
                    style.to_string()
                ],
                article_from_row,
            )
            .optional()?)
    }

    /// List articles, optionally restricted to a single video. Superseded
    /// rows are included; callers filter as needed.
    pub fn list_articles(&self, video_id: Option<Uuid>) -> Result<Vec<ArticleRecord>> {
        let conn = self.conn()?;
        let mut out = Vec::new();
        match video_id {
            Some(vid) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM articles WHERE video_id = ?1 ORDER BY created_at",
                )?;
                let rows = stmt.query_map(params![vid.to_string()], article_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare("SELECT * FROM articles ORDER BY created_at")?;
                let rows = stmt.query_map([], article_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    /// Toggle an article's published flag (driven by an external
    /// publishing step).
    pub fn set_published(&self, article_id: Uuid, published: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE articles SET published = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                published as i64,
                Utc::now().to_rfc3339(),
                article_id.to_string()
            ],
        )?;
        if updated == 0 {
            return Err(SkribentError::Store(format!(
                "No article row for {}",
                article_id
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Pipeline runs
    // ========================================================================

    /// Create a run row for a unit of work.
    pub fn create_run(
        &self,
        video_id: Uuid,
        styles: &[ArticleStyle],
        language: &str,
    ) -> Result<PipelineRunRecord> {
        let conn = self.conn()?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let styles_csv = styles
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");
        conn.execute(
            "INSERT INTO pipeline_runs
             (id, video_id, styles, language, stage, failed_stage, error, analysis_json,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, NULL, ?6, ?7)",
            params![
                id,
                video_id.to_string(),
                styles_csv,
                language,
                Stage::Pending.to_string(),
                now,
                now,
            ],
        )?;
        run_by_id(&conn, &id)?.ok_or_else(|| SkribentError::Store("Run vanished".into()))
    }

    /// The non-terminal run for a video, if one exists (resume target).
    pub fn find_active_run(&self, video_id: Uuid) -> Result<Option<PipelineRunRecord>> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT id FROM pipeline_runs
                 WHERE video_id = ?1 AND stage NOT IN ('complete', 'failed')
                 ORDER BY created_at DESC LIMIT 1",
                params![video_id.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match id {
            Some(id) => run_by_id(&conn, &id),
            None => Ok(None),
        }
    }

    /// Fetch a run by id.
    pub fn get_run(&self, id: Uuid) -> Result<Option<PipelineRunRecord>> {
        let conn = self.conn()?;
        run_by_id(&conn, &id.to_string())
    }

    /// All runs, newest first.
    pub fn list_runs(&self) -> Result<Vec<PipelineRunRecord>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT * FROM pipeline_runs ORDER BY created_at DESC")?;
        let rows = stmt.query_map([], run_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Advance a run to a new stage.
    pub fn update_run_stage(&self, run_id: Uuid, stage: Stage) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE pipeline_runs SET stage = ?1, updated_at = ?2 WHERE id = ?3",
            params![stage.to_string(), Utc::now().to_rfc3339(), run_id.to_string()],
        )?;
        Ok(())
    }

    /// Persist the analyzed content and advance to ANALYZED in one write,
    /// so the stage is only ever marked reached with its output present.
    pub fn set_run_analysis(&self, run_id: Uuid, analysis_json: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE pipeline_runs SET analysis_json = ?1, stage = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                analysis_json,
                Stage::Analyzed.to_string(),
                Utc::now().to_rfc3339(),
                run_id.to_string()
            ],
        )?;
        Ok(())
    }

    /// Mark a run failed at a stage, recording the originating error.
    pub fn mark_run_failed(&self, run_id: Uuid, failed_stage: Stage, error: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE pipeline_runs SET stage = 'failed', failed_stage = ?1, error = ?2,
             updated_at = ?3 WHERE id = ?4",
            params![
                failed_stage.to_string(),
                error,
                Utc::now().to_rfc3339(),
                run_id.to_string()
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_default()
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn keyword_from_row(row: &Row<'_>) -> rusqlite::Result<KeywordRecord> {
    Ok(KeywordRecord {
        id: parse_uuid(row.get("id")?),
        keyword: row.get("keyword")?,
        rank: row.get("rank")?,
        score: row.get("score")?,
        platform: row.get("platform")?,
        region: row.get("region")?,
        metadata: serde_json::from_str(&row.get::<_, String>("metadata")?)
            .unwrap_or(serde_json::Value::Null),
        bucket: row.get("bucket")?,
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRecord> {
    Ok(VideoRecord {
        id: parse_uuid(row.get("id")?),
        keyword_id: parse_uuid(row.get("keyword_id")?),
        youtube_id: row.get("youtube_id")?,
        title: row.get("title")?,
        category: row.get("category")?,
        url: row.get("url")?,
        thumbnail_url: row.get("thumbnail_url")?,
        duration_seconds: row.get("duration_seconds")?,
        views: row.get("views")?,
        likes: row.get("likes")?,
        comments: row.get("comments")?,
        language: row.get("language")?,
        media_path: row.get("media_path")?,
        media_complete: row.get::<_, i64>("media_complete")? != 0,
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

fn transcript_from_row(row: &Row<'_>) -> rusqlite::Result<TranscriptRecord> {
    Ok(TranscriptRecord {
        id: parse_uuid(row.get("id")?),
        video_id: parse_uuid(row.get("video_id")?),
        text: row.get("text")?,
        language: row.get("language")?,
        source: row
            .get::<_, String>("source")?
            .parse()
            .unwrap_or(TranscriptSource::Stt),
        low_confidence: row.get::<_, i64>("low_confidence")? != 0,
        coverage_gaps: serde_json::from_str(&row.get::<_, String>("coverage_gaps")?)
            .unwrap_or_default(),
        stale: row.get::<_, i64>("stale")? != 0,
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

fn article_from_row(row: &Row<'_>) -> rusqlite::Result<ArticleRecord> {
    Ok(ArticleRecord {
        id: parse_uuid(row.get("id")?),
        keyword_id: parse_uuid(row.get("keyword_id")?),
        video_id: parse_uuid(row.get("video_id")?),
        transcript_id: parse_uuid(row.get("transcript_id")?),
        style: row
            .get::<_, String>("style")?
            .parse()
            .unwrap_or(ArticleStyle::Blog),
        article_language: row.get("article_language")?,
        title: row.get("title")?,
        content: row.get("content")?,
        tags: serde_json::from_str(&row.get::<_, String>("tags")?).unwrap_or_default(),
        seo_metadata: serde_json::from_str(&row.get::<_, String>("seo_metadata")?)
            .unwrap_or_default(),
        published: row.get::<_, i64>("published")? != 0,
        superseded: row.get::<_, i64>("superseded")? != 0,
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<PipelineRunRecord> {
    let styles_csv: String = row.get("styles")?;
    Ok(PipelineRunRecord {
        id: parse_uuid(row.get("id")?),
        video_id: parse_uuid(row.get("video_id")?),
        styles: styles_csv
            .split(',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect(),
        language: row.get("language")?,
        stage: row
            .get::<_, String>("stage")?
            .parse()
            .unwrap_or(Stage::Pending),
        failed_stage: row.get("failed_stage")?,
        error: row.get("error")?,
        analysis_json: row.get("analysis_json")?,
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

fn keyword_by_id(conn: &Connection, id: &str) -> Result<Option<KeywordRecord>> {
    Ok(conn
        .query_row("SELECT * FROM keywords WHERE id = ?1", params![id], keyword_from_row)
        .optional()?)
}

fn video_by_id(conn: &Connection, id: &str) -> Result<Option<VideoRecord>> {
    Ok(conn
        .query_row("SELECT * FROM videos WHERE id = ?1", params![id], video_from_row)
        .optional()?)
}

fn transcript_by_id(conn: &Connection, id: &str) -> Result<Option<TranscriptRecord>> {
    Ok(conn
        .query_row("SELECT * FROM transcripts WHERE id = ?1", params![id], transcript_from_row)
        .optional()?)
}

fn transcript_for(
    conn: &Connection,
    video_id: &str,
    language: &str,
) -> Result<Option<TranscriptRecord>> {
    Ok(conn
        .query_row(
            "SELECT * FROM transcripts WHERE video_id = ?1 AND language = ?2 AND stale = 0",
            params![video_id, language],
            transcript_from_row,
        )
        .optional()?)
}

fn article_by_id(conn: &Connection, id: &str) -> Result<Option<ArticleRecord>> {
    Ok(conn
        .query_row("SELECT * FROM articles WHERE id = ?1", params![id], article_from_row)
        .optional()?)
}

fn run_by_id(conn: &Connection, id: &str) -> Result<Option<PipelineRunRecord>> {
    Ok(conn
        .query_row("SELECT * FROM pipeline_runs WHERE id = ?1", params![id], run_from_row)
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::SeoMetadata;

    fn seed_keyword(store: &SqliteStore) -> KeywordRecord {
        store
            .insert_or_get_keyword(NewKeyword {
                keyword: "rust async".into(),
                rank: 1,
                score: 90,
                platform: "manual".into(),
                region: "US".into(),
                metadata: serde_json::json!({}),
                bucket: "2026-01-01".into(),
            })
            .unwrap()
    }

    fn seed_video(store: &SqliteStore, keyword_id: Uuid) -> VideoRecord {
        store
            .insert_or_get_video(NewVideo {
                keyword_id,
                youtube_id: "dQw4w9WgXcQ".into(),
                title: "Test Video".into(),
                category: "education".into(),
                url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
                thumbnail_url: None,
                duration_seconds: 300,
                views: 1000,
                likes: 50,
                comments: 10,
                language: "en".into(),
            })
            .unwrap()
    }

    fn seed_transcript(store: &SqliteStore, video_id: Uuid) -> TranscriptRecord {
        store
            .insert_or_get_transcript(NewTranscript {
                video_id,
                text: "hello world".into(),
                language: "en".into(),
                source: TranscriptSource::Captions,
                low_confidence: false,
                coverage_gaps: vec![],
            })
            .unwrap()
    }

    #[test]
    fn test_keyword_identity_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        let first = seed_keyword(&store);
        let second = seed_keyword(&store);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_video_insert_refreshes_engagement() {
        let store = SqliteStore::in_memory().unwrap();
        let keyword = seed_keyword(&store);
        let first = seed_video(&store, keyword.id);

        let second = store
            .insert_or_get_video(NewVideo {
                keyword_id: keyword.id,
                youtube_id: "dQw4w9WgXcQ".into(),
                title: "Different Title Ignored".into(),
                category: "education".into(),
                url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
                thumbnail_url: None,
                duration_seconds: 300,
                views: 2000,
                likes: 80,
                comments: 15,
                language: "en".into(),
            })
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.views, 2000);
        // Content fields are immutable.
        assert_eq!(second.title, "Test Video");
    }

    #[test]
    fn test_media_artifact_mark_complete() {
        let store = SqliteStore::in_memory().unwrap();
        let keyword = seed_keyword(&store);
        let video = seed_video(&store, keyword.id);
        assert!(!video.media_complete);

        store
            .set_media_artifact(video.id, "/tmp/media/dQw4w9WgXcQ.mp4")
            .unwrap();
        let reloaded = store.get_video(video.id).unwrap().unwrap();
        assert!(reloaded.media_complete);
        assert_eq!(
            reloaded.media_path.as_deref(),
            Some("/tmp/media/dQw4w9WgXcQ.mp4")
        );

        store.clear_media_artifact(video.id).unwrap();
        let cleared = store.get_video(video.id).unwrap().unwrap();
        assert!(!cleared.media_complete);
        assert!(cleared.media_path.is_none());
    }

    #[test]
    fn test_transcript_uniqueness_per_video_language() {
        let store = SqliteStore::in_memory().unwrap();
        let keyword = seed_keyword(&store);
        let video = seed_video(&store, keyword.id);

        let first = seed_transcript(&store, video.id);
        let second = store
            .insert_or_get_transcript(NewTranscript {
                video_id: video.id,
                text: "different text".into(),
                language: "en".into(),
                source: TranscriptSource::Stt,
                low_confidence: false,
                coverage_gaps: vec![],
            })
            .unwrap();

        // Second insert returns the existing row unchanged.
        assert_eq!(first.id, second.id);
        assert_eq!(second.text, "hello world");

        // A different language creates its own row.
        let jp = store
            .insert_or_get_transcript(NewTranscript {
                video_id: video.id,
                text: "konnichiwa".into(),
                language: "ja".into(),
                source: TranscriptSource::Stt,
                low_confidence: false,
                coverage_gaps: vec![],
            })
            .unwrap();
        assert_ne!(jp.id, first.id);
    }

    #[test]
    fn test_transcript_supersede_keeps_old_row() {
        let store = SqliteStore::in_memory().unwrap();
        let keyword = seed_keyword(&store);
        let video = seed_video(&store, keyword.id);
        let old = seed_transcript(&store, video.id);

        let marked = store.supersede_transcript(video.id, "en").unwrap();
        assert_eq!(marked, 1);

        let fresh = store
            .insert_or_get_transcript(NewTranscript {
                video_id: video.id,
                text: "regenerated".into(),
                language: "en".into(),
                source: TranscriptSource::Stt,
                low_confidence: false,
                coverage_gaps: vec![],
            })
            .unwrap();

        assert_ne!(fresh.id, old.id);
        assert_eq!(fresh.text, "regenerated");

        // Old row still exists, flagged stale.
        let old_reloaded = store.get_transcript(old.id).unwrap().unwrap();
        assert!(old_reloaded.stale);
    }

    #[test]
    fn test_article_integrity_checks() {
        let store = SqliteStore::in_memory().unwrap();
        let keyword = seed_keyword(&store);
        let video = seed_video(&store, keyword.id);
        let transcript = seed_transcript(&store, video.id);

        // Wrong keyword.
        let err = store
            .insert_article(
                NewArticle {
                    keyword_id: Uuid::new_v4(),
                    video_id: video.id,
                    transcript_id: transcript.id,
                    style: ArticleStyle::Blog,
                    article_language: "en".into(),
                    title: "T".into(),
                    content: "C".into(),
                    tags: vec![],
                    seo_metadata: SeoMetadata::default(),
                },
                false,
            )
            .unwrap_err();
        assert!(matches!(err, SkribentError::Integrity(_)));

        // Language mismatch with the transcript.
        let err = store
            .insert_article(
                NewArticle {
                    keyword_id: keyword.id,
                    video_id: video.id,
                    transcript_id: transcript.id,
                    style: ArticleStyle::Blog,
                    article_language: "ja".into(),
                    title: "T".into(),
                    content: "C".into(),
                    tags: vec![],
                    seo_metadata: SeoMetadata::default(),
                },
                false,
            )
            .unwrap_err();
        assert!(matches!(err, SkribentError::Integrity(_)));
    }

    #[test]
    fn test_article_uniqueness_and_supersede() {
        let store = SqliteStore::in_memory().unwrap();
        let keyword = seed_keyword(&store);
        let video = seed_video(&store, keyword.id);
        let transcript = seed_transcript(&store, video.id);

        let make = |title: &str| NewArticle {
            keyword_id: keyword.id,
            video_id: video.id,
            transcript_id: transcript.id,
            style: ArticleStyle::Listicle,
            article_language: "en".into(),
            title: title.into(),
            content: "1. First\n2. Second".into(),
            tags: vec!["test".into()],
            seo_metadata: SeoMetadata::default(),
        };

        let first = store.insert_article(make("First"), false).unwrap();
        let dup = store.insert_article(make("Duplicate"), false).unwrap();
        assert_eq!(first.id, dup.id);
        assert_eq!(dup.title, "First");

        let regenerated = store.insert_article(make("Regenerated"), true).unwrap();
        assert_ne!(regenerated.id, first.id);

        let all = store.list_articles(Some(video.id)).unwrap();
        assert_eq!(all.len(), 2);
        let old = all.iter().find(|a| a.id == first.id).unwrap();
        assert!(old.superseded);
    }

    #[test]
    fn test_run_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        let keyword = seed_keyword(&store);
        let video = seed_video(&store, keyword.id);

        let run = store
            .create_run(video.id, &[ArticleStyle::Blog, ArticleStyle::Wiki], "en")
            .unwrap();
        assert_eq!(run.stage, Stage::Pending);
        assert_eq!(run.styles.len(), 2);

        store.update_run_stage(run.id, Stage::Acquired).unwrap();
        let active = store.find_active_run(video.id).unwrap().unwrap();
        assert_eq!(active.id, run.id);
        assert_eq!(active.stage, Stage::Acquired);

        store.set_run_analysis(run.id, "{\"sections\":[]}").unwrap();
        let analyzed = store.get_run(run.id).unwrap().unwrap();
        assert_eq!(analyzed.stage, Stage::Analyzed);
        assert!(analyzed.analysis_json.is_some());

        store.update_run_stage(run.id, Stage::Complete).unwrap();
        assert!(store.find_active_run(video.id).unwrap().is_none());

        let runs = store.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn test_run_failure_records_stage_and_error() {
        let store = SqliteStore::in_memory().unwrap();
        let keyword = seed_keyword(&store);
        let video = seed_video(&store, keyword.id);
        let run = store.create_run(video.id, &[ArticleStyle::Blog], "en").unwrap();

        store
            .mark_run_failed(run.id, Stage::Transcribed, "whisper timed out")
            .unwrap();
        let failed = store.get_run(run.id).unwrap().unwrap();
        assert_eq!(failed.stage, Stage::Failed);
        assert_eq!(failed.failed_stage.as_deref(), Some("transcribed"));
        assert_eq!(failed.error.as_deref(), Some("whisper timed out"));
        // Terminal: not an active run anymore.
        assert!(store.find_active_run(video.id).unwrap().is_none());
    }
}
