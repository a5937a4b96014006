/*!
 * Advanced SubStation Alpha reader and writer.
 *
 * ASS is what the renderer burns in. Tracks read from ASS keep their script
 * info, styles and per-event fields; tracks from other formats get a single
 * default style.
 */

use std::fmt::Write;

use anyhow::{anyhow, Result};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ParsedSubtitles, timestamp_ms};
use crate::subtitle_processor::{SubtitleEntry, SubtitleTrack};

const EVENT_FORMAT: &str = "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

const DEFAULT_HEADER: &str = "[Script Info]
; Script generated by subclip
ScriptType: v4.00+
WrapStyle: 0
ScaledBorderAndShadow: yes
Collisions: Normal

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Default,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,2,2,10,10,10,1
";

static OVERRIDE_BLOCK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("override regex is valid"));

static HTML_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([a-zA-Z]+)[^>]*>").expect("html tag regex is valid"));

/// Everything in an ASS document before its `[Events]` section, verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssHeader {
    pub text: String,
}

/// Per-event fields other than timing and text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssEventFields {
    pub layer: String,
    pub style: String,
    pub name: String,
    pub margin_l: String,
    pub margin_r: String,
    pub margin_v: String,
    pub effect: String,
}

impl Default for AssEventFields {
    fn default() -> Self {
        Self {
            layer: "0".to_string(),
            style: "Default".to_string(),
            name: String::new(),
            margin_l: "0".to_string(),
            margin_r: "0".to_string(),
            margin_v: "0".to_string(),
            effect: String::new(),
        }
    }
}

/// Parse an ASS/SSA document
pub fn parse(content: &str) -> Result<ParsedSubtitles> {
    let mut header = String::new();
    let mut entries = Vec::new();
    let mut in_events = false;
    let mut saw_events = false;
    let mut format: Vec<String> = EVENT_FORMAT["Format:".len()..]
        .split(',')
        .map(|f| f.trim().to_lowercase())
        .collect();

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            in_events = trimmed.eq_ignore_ascii_case("[events]");
            saw_events |= in_events;
            if !in_events {
                header.push_str(line);
                header.push('\n');
            }
            continue;
        }

        if !in_events {
            header.push_str(line);
            header.push('\n');
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("Format:") {
            format = rest.split(',').map(|f| f.trim().to_lowercase()).collect();
        } else if let Some(rest) = trimmed.strip_prefix("Dialogue:") {
            let seq_num = entries.len() + 1;
            match parse_dialogue(rest, &format, seq_num) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping invalid ASS event {}: {}", seq_num, e),
            }
        }
    }

    if !saw_events {
        return Err(anyhow!("No [Events] section found"));
    }

    let header = header.trim_end().to_string();
    Ok(ParsedSubtitles {
        entries,
        ass_header: (!header.is_empty()).then(|| AssHeader { text: header }),
    })
}

fn parse_dialogue(rest: &str, format: &[String], seq_num: usize) -> Result<SubtitleEntry> {
    // Text is always last and may itself contain commas
    let values: Vec<&str> = rest.trim_start().splitn(format.len(), ',').collect();
    if values.len() != format.len() {
        return Err(anyhow!("expected {} fields, found {}", format.len(), values.len()));
    }

    let field = |name: &str| event_field(format, &values, name);

    let start = parse_time(field("start").ok_or_else(|| anyhow!("missing Start field"))?)?;
    let end = parse_time(field("end").ok_or_else(|| anyhow!("missing End field"))?)?;
    let text = format
        .iter()
        .position(|f| f == "text")
        .map(|idx| values[idx])
        .ok_or_else(|| anyhow!("missing Text field"))?;

    let defaults = AssEventFields::default();
    let layer = field("layer")
        .filter(|v| v.parse::<i64>().is_ok())
        .unwrap_or(defaults.layer.as_str());
    let fields = AssEventFields {
        layer: layer.to_string(),
        style: field("style").unwrap_or(defaults.style.as_str()).to_string(),
        name: field("name").unwrap_or_default().to_string(),
        margin_l: field("marginl").unwrap_or(defaults.margin_l.as_str()).to_string(),
        margin_r: field("marginr").unwrap_or(defaults.margin_r.as_str()).to_string(),
        margin_v: field("marginv").unwrap_or(defaults.margin_v.as_str()).to_string(),
        effect: field("effect").unwrap_or_default().to_string(),
    };

    Ok(SubtitleEntry::new_validated(seq_num, start, end, text.to_string())?.with_ass_fields(fields))
}

fn event_field<'a>(format: &[String], values: &[&'a str], name: &str) -> Option<&'a str> {
    format.iter().position(|f| f == name).map(|idx| values[idx].trim())
}

/// Parse `H:MM:SS.cc` into milliseconds
pub fn parse_time(value: &str) -> Result<u64> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() != 3 {
        return Err(anyhow!("Invalid ASS timestamp: {}", value));
    }
    let hours: u64 = parts[0].parse().map_err(|_| anyhow!("Invalid ASS hours: {}", value))?;
    let minutes: u64 = parts[1].parse().map_err(|_| anyhow!("Invalid ASS minutes: {}", value))?;
    let seconds: f64 = parts[2].parse().map_err(|_| anyhow!("Invalid ASS seconds: {}", value))?;
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis < 0.0 || millis >= u64::MAX as f64 {
        return Err(anyhow!("Invalid ASS seconds: {}", value));
    }

    timestamp_ms(hours, minutes, 0, millis as u64).ok_or_else(|| anyhow!("ASS timestamp out of range: {}", value))
}

/// Format milliseconds as `H:MM:SS.cc`.
///
/// Centiseconds are truncated so a 1ms clamp gap can never round up into the next cue.
pub fn format_time(ms: u64) -> String {
    let centis = ms / 10;
    let hours = centis / 360_000;
    let minutes = (centis % 360_000) / 6_000;
    let seconds = (centis % 6_000) / 100;
    let cs = centis % 100;

    format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, cs)
}

/// Serialize a track as an ASS document
pub fn render(track: &SubtitleTrack) -> String {
    let mut out = String::new();

    match &track.ass_header {
        Some(header) => out.push_str(&header.text),
        None => out.push_str(DEFAULT_HEADER.trim_end()),
    }
    out.push_str("\n\n[Events]\n");
    out.push_str(EVENT_FORMAT);
    out.push('\n');

    let defaults = AssEventFields::default();
    for entry in &track.entries {
        let (fields, text) = match &entry.ass_fields {
            Some(fields) => (fields, entry.text.clone()),
            None => (&defaults, srt_to_ass_text(&entry.text)),
        };
        let _ = writeln!(
            out,
            "Dialogue: {},{},{},{},{},{},{},{},{},{}",
            fields.layer,
            format_time(entry.start_time_ms),
            format_time(entry.end_time_ms),
            fields.style,
            fields.name,
            fields.margin_l,
            fields.margin_r,
            fields.margin_v,
            fields.effect,
            text
        );
    }

    out
}

/// Convert SRT-style text to ASS: basic tags become overrides, the rest are dropped
pub fn srt_to_ass_text(text: &str) -> String {
    let converted = HTML_TAG_REGEX.replace_all(text, |caps: &regex::Captures| {
        let closing = &caps[1] == "/";
        match caps[2].to_lowercase().as_str() {
            tag @ ("i" | "b" | "u" | "s") => format!("{{\\{}{}}}", tag, if closing { 0 } else { 1 }),
            _ => String::new(),
        }
    });
    converted.replace("\r\n", "\n").replace('\n', "\\N")
}

/// Convert ASS text back to plain SRT text
pub fn ass_to_srt_text(text: &str) -> String {
    OVERRIDE_BLOCK_REGEX
        .replace_all(text, "")
        .replace("\\N", "\n")
        .replace("\\n", "\n")
        .replace("\\h", " ")
}
