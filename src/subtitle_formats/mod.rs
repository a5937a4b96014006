/*!
 * Subtitle file formats.
 *
 * Readers for SRT, WebVTT and ASS/SSA, and writers for SRT and ASS. The
 * renderer consumes ASS; the other formats are only read.
 */

use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::subtitle_processor::SubtitleEntry;

pub mod ass;
pub mod srt;
pub mod vtt;

pub use ass::{AssEventFields, AssHeader};

// @const: Cue timing line shared by SRT and WebVTT, hours optional
static TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(\d+):)?(\d{1,2}):(\d{2})[,.](\d{1,3})\s*-->\s*(?:(\d+):)?(\d{1,2}):(\d{2})[,.](\d{1,3})",
    )
    .expect("timing regex is valid")
});

/// Subtitle file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    WebVtt,
    Ass,
}

impl SubtitleFormat {
    /// Detect the format from content; the extension only settles header-less ASS
    pub fn detect(content: &str, path: &Path) -> Option<Self> {
        let head = content.trim_start_matches('\u{feff}').trim_start();

        if head.starts_with("WEBVTT") {
            return Some(Self::WebVtt);
        }
        if head.starts_with("[Script Info]") || content.contains("\n[Events]") {
            return Some(Self::Ass);
        }
        // Header-less cue blocks are SRT whatever the file is called
        if content.lines().any(|line| TIMING_REGEX.is_match(line)) {
            return Some(Self::Srt);
        }

        match Self::from_extension(path) {
            Some(Self::Ass) if content.contains("Dialogue:") => Some(Self::Ass),
            _ => None,
        }
    }

    /// Format implied by a file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::WebVtt),
            "ass" | "ssa" => Some(Self::Ass),
            _ => None,
        }
    }

    /// Canonical file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::WebVtt => "vtt",
            Self::Ass => "ass",
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Srt => "SRT",
            Self::WebVtt => "WebVTT",
            Self::Ass => "ASS",
        };
        f.write_str(name)
    }
}

/// Result of parsing a subtitle document
#[derive(Debug, Default)]
pub struct ParsedSubtitles {
    /// Cues in document order
    pub entries: Vec<SubtitleEntry>,
    /// Script info and styles, for ASS documents
    pub ass_header: Option<AssHeader>,
}

/// Parse a decoded document in the given format
pub fn parse(content: &str, format: SubtitleFormat) -> Result<ParsedSubtitles> {
    let content = content.trim_start_matches('\u{feff}');
    match format {
        SubtitleFormat::Srt => Ok(ParsedSubtitles {
            entries: srt::parse(content)?,
            ass_header: None,
        }),
        SubtitleFormat::WebVtt => Ok(ParsedSubtitles {
            entries: vtt::parse(content)?,
            ass_header: None,
        }),
        SubtitleFormat::Ass => ass::parse(content),
    }
}

/// Parse a `start --> end` timing line into milliseconds.
///
/// `None` when the line is not a timing line; `Some(Err)` when it is one but a
/// timestamp does not fit in milliseconds.
pub(crate) fn parse_timing_line(line: &str) -> Option<Result<(u64, u64)>> {
    let caps = TIMING_REGEX.captures(line)?;
    Some(
        capture_ms(&caps, 1)
            .zip(capture_ms(&caps, 5))
            .ok_or_else(|| anyhow!("timestamp out of range: {}", line.trim())),
    )
}

/// Timestamp from four capture groups (hours, minutes, seconds, fraction)
fn capture_ms(caps: &regex::Captures, start_idx: usize) -> Option<u64> {
    let number = |idx: usize| -> Option<u64> { caps.get(idx).map_or(Some(0), |m| m.as_str().parse().ok()) };

    // A short fraction is a decimal fraction of a second: ",5" is 500ms
    let fraction = match caps.get(start_idx + 3) {
        Some(m) => {
            let digits = m.as_str();
            digits.parse::<u64>().ok()? * 10u64.pow(3 - digits.len() as u32)
        }
        None => 0,
    };

    timestamp_ms(number(start_idx)?, number(start_idx + 1)?, number(start_idx + 2)?, fraction)
}

/// Sum clock components into milliseconds, `None` on overflow
pub(crate) fn timestamp_ms(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<u64> {
    hours
        .checked_mul(3_600_000)?
        .checked_add(minutes.checked_mul(60_000)?)?
        .checked_add(seconds.checked_mul(1_000)?)?
        .checked_add(millis)
}
