/*!
 * Overlap repair for subtitle tracks.
 *
 * Cues are put in start order (ties keep their original order) and a single
 * forward pass clamps each cue to end 1ms before its successor starts, so no
 * two adjacent cues are on screen at once.
 *
 * Known limitation: the pass never revisits a pair. Clamping only ever
 * shortens a cue, so a cue that starts at or after its successor's start ends
 * up with a zero or negative duration. Such cues are counted in the report
 * but not removed; callers that need strictly positive durations must check
 * `SubtitleEntry::is_degenerate` themselves.
 */

use std::path::Path;

use log::{debug, info, warn};

use crate::encoding::SubtitleEncoding;
use crate::errors::SubtitleError;
use crate::subtitle_processor::SubtitleTrack;

/// Gap left between a clamped cue and its successor
pub const MIN_GAP_MS: u64 = 1;

/// What a normalization pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Cues whose end time was clamped
    pub clamped: usize,
    /// Cues left with a zero or negative duration
    pub degenerate: usize,
}

/// Return a copy of `track` with overlapping cues clamped
pub fn normalize(track: &SubtitleTrack) -> (SubtitleTrack, NormalizeReport) {
    let mut normalized = track.clone();
    normalized.sort_by_start();

    let mut report = NormalizeReport::default();
    let entries = &mut normalized.entries;

    for i in 0..entries.len().saturating_sub(1) {
        let next_start = entries[i + 1].start_time_ms;
        if entries[i].end_time_ms > next_start {
            entries[i].end_time_ms = next_start.saturating_sub(MIN_GAP_MS);
            report.clamped += 1;
        }
    }

    report.degenerate = entries.iter().filter(|e| e.is_degenerate()).count();

    (normalized, report)
}

/// Load `input`, repair overlaps, and write the renderer-ready result to `output`
pub fn normalize_file(
    input: &Path,
    encoding: SubtitleEncoding,
    output: &Path,
) -> Result<NormalizeReport, SubtitleError> {
    let track = SubtitleTrack::load(input, encoding)?;
    let (normalized, report) = normalize(&track);

    if report.clamped > 0 {
        info!("Clamped {} overlapping subtitle cue(s)", report.clamped);
    }
    if report.degenerate > 0 {
        warn!("{} subtitle cue(s) have no positive duration after clamping", report.degenerate);
    }

    normalized.save(output)?;
    debug!("Wrote normalized subtitles to {:?}", output);

    Ok(report)
}
