//! WebVTT reader, including the inline tags of YouTube auto-captions.

use anyhow::{anyhow, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::parse_timing_line;
use crate::subtitle_processor::SubtitleEntry;

// Karaoke timestamps plus class, voice, language and ruby spans
static INLINE_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\d{1,2}:\d{2}(?::\d{2})?\.\d{3}>|</?(?:c|v|lang|ruby|rt)(?:[.\s][^>]*)?>")
        .expect("inline tag regex is valid")
});

/// Parse WebVTT content into cues in document order
pub fn parse(content: &str) -> Result<Vec<SubtitleEntry>> {
    let mut lines = content.lines().peekable();

    match lines.peek() {
        Some(first) if first.trim_start().starts_with("WEBVTT") => {}
        _ => return Err(anyhow!("Missing WEBVTT header")),
    }

    let mut entries = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in lines.chain(std::iter::once("")) {
        if !line.trim().is_empty() {
            block.push(line);
            continue;
        }
        if block.is_empty() {
            continue;
        }

        if let Some(entry) = parse_block(&block, entries.len() + 1) {
            entries.push(entry);
        }
        block.clear();
    }

    Ok(entries)
}

/// Parse one blank-line separated block; header, NOTE, STYLE and REGION blocks yield nothing
fn parse_block(block: &[&str], seq_num: usize) -> Option<SubtitleEntry> {
    let first = block.first()?.trim();
    if first.starts_with("WEBVTT") || first.starts_with("NOTE") || first.starts_with("STYLE") || first.starts_with("REGION") {
        return None;
    }

    // An optional cue identifier precedes the timing line
    let timing_idx = block.iter().position(|line| parse_timing_line(line).is_some())?;
    let (start_ms, end_ms) = match parse_timing_line(block[timing_idx])? {
        Ok(timing) => timing,
        Err(e) => {
            warn!("Skipping WebVTT cue {}: {}", seq_num, e);
            return None;
        }
    };

    let text = block[timing_idx + 1..]
        .iter()
        .map(|line| clean_text(line))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        debug!("Skipping empty WebVTT cue at {}ms", start_ms);
        return None;
    }

    match SubtitleEntry::new_validated(seq_num, start_ms, end_ms, text) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Skipping invalid WebVTT cue {}: {}", seq_num, e);
            None
        }
    }
}

/// Strip non-styling inline tags and decode the common entities
fn clean_text(line: &str) -> String {
    INLINE_TAG_REGEX
        .replace_all(line.trim(), "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
