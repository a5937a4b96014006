//! SubRip reader.

use anyhow::{anyhow, Result};
use log::warn;

use super::parse_timing_line;
use crate::subtitle_processor::SubtitleEntry;

/// Parse SRT content into cues in document order.
///
/// Sequence numbers are optional; a block starts at its timing line and runs
/// until the next blank line. A block whose timestamps are out of range is skipped.
pub fn parse(content: &str) -> Result<Vec<SubtitleEntry>> {
    let mut entries = Vec::new();
    let mut current: Option<(u64, u64)> = None;
    let mut current_text = String::new();
    let mut saw_timing = false;
    let mut skipping = false;

    for (line_no, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            if current.is_some() {
                finish_cue(current.take(), &mut current_text, &mut entries);
            }
            skipping = false;
            continue;
        }

        if let Some(timing) = parse_timing_line(trimmed) {
            // A timing line without a blank line before it still opens a new cue
            if current.is_some() {
                finish_cue(current.take(), &mut current_text, &mut entries);
            }
            saw_timing = true;
            match timing {
                Ok(timing) => {
                    current = Some(timing);
                    skipping = false;
                }
                Err(e) => {
                    warn!("Skipping subtitle at line {}: {}", line_no + 1, e);
                    skipping = true;
                }
            }
            continue;
        }

        if skipping {
            continue;
        }

        if current.is_some() {
            if !current_text.is_empty() {
                current_text.push('\n');
            }
            current_text.push_str(trimmed);
        } else if trimmed.parse::<usize>().is_err() {
            warn!("Unexpected text at line {} before a timestamp: {}", line_no + 1, trimmed);
        }
    }
    finish_cue(current.take(), &mut current_text, &mut entries);

    if !saw_timing {
        return Err(anyhow!("No SRT timing lines found"));
    }

    Ok(entries)
}

fn finish_cue(timing: Option<(u64, u64)>, text: &mut String, entries: &mut Vec<SubtitleEntry>) {
    if let Some((start_ms, end_ms)) = timing {
        let seq_num = entries.len() + 1;
        match SubtitleEntry::new_validated(seq_num, start_ms, end_ms, text.clone()) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping invalid subtitle entry {}: {}", seq_num, e),
        }
    }
    text.clear();
}
