/*!
 * Human time expressions and validated clip ranges.
 *
 * A time spec is either `H:MM:SS` (three colon-separated integers) or a plain
 * number of seconds such as `45` or `12.5`.
 */

use std::fmt;

use crate::errors::TimeSpecError;

/// Parse a time spec into a non-negative number of seconds
pub fn parse_time_spec(spec: &str) -> Result<f64, TimeSpecError> {
    let trimmed = spec.trim();
    let invalid = || TimeSpecError::InvalidTimeSpec(spec.to_string());

    if trimmed.contains(':') {
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let mut fields = [0u64; 3];
        for (field, part) in fields.iter_mut().zip(&parts) {
            *field = part.trim().parse::<u64>().map_err(|_| invalid())?;
        }
        let [hours, minutes, seconds] = fields;

        // Out-of-range minutes/seconds ("00:90:00") are accepted and simply summed
        let total = hours
            .checked_mul(3600)
            .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
            .and_then(|hm| hm.checked_add(seconds))
            .ok_or_else(invalid)?;
        return Ok(total as f64);
    }

    let seconds: f64 = trimmed.parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }

    Ok(seconds)
}

/// A validated `[start, end]` window in seconds, with `end > start`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    start: f64,
    end: f64,
}

impl TimeRange {
    /// Create a range, rejecting empty, inverted, or non-finite windows
    pub fn new(start: f64, end: f64) -> Result<Self, TimeSpecError> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return Err(TimeSpecError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from time specs
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeSpecError> {
        Self::new(parse_time_spec(start)?, parse_time_spec(end)?)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Start of the window in whole milliseconds
    pub fn start_ms(&self) -> u64 {
        (self.start * 1000.0).round() as u64
    }

    /// End of the window in whole milliseconds
    pub fn end_ms(&self) -> u64 {
        (self.end * 1000.0).round() as u64
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_seconds(self.start), format_seconds(self.end))
    }
}

/// Format seconds as `HH:MM:SS.mmm`, the form ffmpeg and yt-dlp accept
pub fn format_seconds(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}
