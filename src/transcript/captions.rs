//! WebVTT caption parsing and the usability policy.
//!
//! Native captions are never assumed trustworthy: the resolver judges
//! language match, coverage and timing gaps before taking the cheap path.

use super::TranscriptSegment;
use crate::config::CaptionSettings;
use tracing::debug;

/// Parse a WebVTT document into timed segments.
///
/// Handles the header, NOTE/STYLE blocks, optional cue identifiers, cue
/// settings after the timestamp line, and strips inline markup tags.
/// Consecutive cues with identical text (common in auto-generated
/// rolling captions) are collapsed into one segment.
pub fn parse_vtt(content: &str) -> Vec<TranscriptSegment> {
    let mut segments: Vec<TranscriptSegment> = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let line = line.trim_start_matches('\u{feff}').trim();

        if line.is_empty() || line.starts_with("WEBVTT") {
            continue;
        }
        if line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION") {
            // Skip the whole block
            for skipped in lines.by_ref() {
                if skipped.trim().is_empty() {
                    break;
                }
            }
            continue;
        }

        // Either a cue identifier followed by a timing line, or the
        // timing line itself.
        let timing_line = if line.contains("-->") {
            line.to_string()
        } else {
            match lines.next() {
                Some(next) if next.contains("-->") => next.trim().to_string(),
                _ => continue,
            }
        };

        let Some((start, end)) = parse_timing_line(&timing_line) else {
            continue;
        };

        let mut text_lines = Vec::new();
        for text_line in lines.by_ref() {
            let text_line = text_line.trim();
            if text_line.is_empty() {
                break;
            }
            let cleaned = strip_markup(text_line);
            if !cleaned.is_empty() {
                text_lines.push(cleaned);
            }
        }

        if text_lines.is_empty() {
            continue;
        }
        let text = text_lines.join(" ");

        // Collapse rolling repeats
        if let Some(last) = segments.last_mut() {
            if last.text == text {
                last.end_seconds = end;
                continue;
            }
        }

        segments.push(TranscriptSegment::new(start, end, text));
    }

    debug!("Parsed {} caption segments", segments.len());
    segments
}

/// Parse "00:00:01.000 --> 00:00:04.000 position:10%" into (start, end).
fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let mut parts = line.split("-->");
    let start = parse_timestamp(parts.next()?.trim())?;
    // Cue settings may follow the end timestamp.
    let end_part = parts.next()?.trim();
    let end_str = end_part.split_whitespace().next()?;
    let end = parse_timestamp(end_str)?;
    Some((start, end))
}

/// Parse "HH:MM:SS.mmm" or "MM:SS.mmm" into seconds.
fn parse_timestamp(ts: &str) -> Option<f64> {
    let fields: Vec<&str> = ts.split(':').collect();
    let (h, m, s) = match fields.len() {
        3 => (
            fields[0].parse::<f64>().ok()?,
            fields[1].parse::<f64>().ok()?,
            fields[2].replace(',', ".").parse::<f64>().ok()?,
        ),
        2 => (
            0.0,
            fields[0].parse::<f64>().ok()?,
            fields[1].replace(',', ".").parse::<f64>().ok()?,
        ),
        _ => return None,
    };
    Some(h * 3600.0 + m * 60.0 + s)
}

/// Remove inline VTT/HTML markup such as <c>, <i>, <00:00:01.000>.
fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Judge whether caption segments are usable as a transcript for media of
/// the given duration: coverage fraction must meet the configured minimum
/// and no inter-segment gap may exceed the configured maximum.
pub fn captions_usable(
    segments: &[TranscriptSegment],
    media_duration: f64,
    policy: &CaptionSettings,
) -> bool {
    if segments.is_empty() || media_duration <= 0.0 {
        return false;
    }

    let covered: f64 = segments.iter().map(|s| s.duration().max(0.0)).sum();
    let coverage = (covered / media_duration).min(1.0);
    if coverage < policy.min_coverage {
        debug!(
            "Captions rejected: coverage {:.0}% below minimum {:.0}%",
            coverage * 100.0,
            policy.min_coverage * 100.0
        );
        return false;
    }

    let mut prev_end = 0.0f64;
    for segment in segments {
        if segment.start_seconds - prev_end > policy.max_gap_seconds {
            debug!(
                "Captions rejected: {:.0}s gap at {:.0}s exceeds maximum {:.0}s",
                segment.start_seconds - prev_end,
                prev_end,
                policy.max_gap_seconds
            );
            return false;
        }
        prev_end = prev_end.max(segment.end_seconds);
    }
    if media_duration - prev_end > policy.max_gap_seconds {
        debug!("Captions rejected: trailing gap exceeds maximum");
        return false;
    }

    true
}
