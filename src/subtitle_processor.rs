use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::{debug, warn};

use crate::encoding::SubtitleEncoding;
use crate::errors::SubtitleError;
use crate::subtitle_formats::{self, AssEventFields, AssHeader, SubtitleFormat};
use crate::time_spec::TimeRange;

// @module: Subtitle tracks and cues

// @struct: Single subtitle cue
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    // @field: Sequence number
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Display text (ASS markup for ASS sources, SRT-style tags otherwise)
    pub text: String,

    // @field: Original ASS event fields, kept so they survive re-serialization
    pub ass_fields: Option<AssEventFields>,
}

impl SubtitleEntry {
    /// Creates a new subtitle entry
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Self {
        SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text,
            ass_fields: None,
        }
    }

    // @creates: Validated subtitle entry
    // @validates: Time range and non-empty text
    pub fn new_validated(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Result<Self> {
        if end_time_ms <= start_time_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} <= start time {}",
                end_time_ms, start_time_ms
            ));
        }

        let trimmed_text = text.trim();
        if trimmed_text.is_empty() {
            return Err(anyhow!("Empty subtitle text for entry {}", seq_num));
        }

        Ok(SubtitleEntry::new(seq_num, start_time_ms, end_time_ms, trimmed_text.to_string()))
    }

    /// Attach original ASS event fields
    pub fn with_ass_fields(mut self, fields: AssEventFields) -> Self {
        self.ass_fields = Some(fields);
        self
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_time_ms)
    }

    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_time_ms)
    }

    /// Whether the cue has no positive duration
    pub fn is_degenerate(&self) -> bool {
        self.end_time_ms <= self.start_time_ms
    }

    /// Text with ASS markup turned back into SRT-style text
    pub fn plain_text(&self) -> String {
        if self.ass_fields.is_some() {
            subtitle_formats::ass::ass_to_srt_text(&self.text)
        } else {
            self.text.clone()
        }
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.plain_text())?;
        writeln!(f)
    }
}

/// An ordered subtitle track with the encoding it was decoded from
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleTrack {
    /// File the track was loaded from
    pub source_file: PathBuf,

    /// Cues in start-time order
    pub entries: Vec<SubtitleEntry>,

    /// Encoding used to decode the source file
    pub encoding: SubtitleEncoding,

    /// Format of the source file
    pub format: SubtitleFormat,

    /// Script info and styles of an ASS source
    pub ass_header: Option<AssHeader>,
}

impl SubtitleTrack {
    /// Create an empty track
    pub fn new(source_file: PathBuf, encoding: SubtitleEncoding, format: SubtitleFormat) -> Self {
        SubtitleTrack {
            source_file,
            entries: Vec::new(),
            encoding,
            format,
            ass_header: None,
        }
    }

    /// Create a track from cues, ordering them by start time
    pub fn from_entries(
        source_file: PathBuf,
        encoding: SubtitleEncoding,
        format: SubtitleFormat,
        entries: Vec<SubtitleEntry>,
    ) -> Self {
        let mut track = Self::new(source_file, encoding, format);
        track.entries = entries;
        track.sort_by_start();
        track
    }

    /// Load a subtitle file, decoding it with the given encoding
    pub fn load<P: AsRef<Path>>(path: P, encoding: SubtitleEncoding) -> Result<Self, SubtitleError> {
        let path = path.as_ref();

        let bytes = fs::read(path).map_err(|e| SubtitleError::load(path, e.to_string()))?;
        let content = encoding
            .decode(&bytes)
            .map_err(|e| SubtitleError::load(path, format!("cannot decode as {}: {}", encoding, e)))?;

        let format = SubtitleFormat::detect(&content, path)
            .ok_or_else(|| SubtitleError::load(path, "not a recognized subtitle format"))?;

        let parsed = subtitle_formats::parse(&content, format)
            .map_err(|e| SubtitleError::load(path, format!("{:#}", e)))?;

        if parsed.entries.is_empty() {
            return Err(SubtitleError::load(path, "no valid subtitle entries found"));
        }

        let mut track = Self::from_entries(path.to_path_buf(), encoding, format, parsed.entries);
        track.ass_header = parsed.ass_header;

        let overlaps = track.overlap_count();
        if overlaps > 0 {
            warn!("Found {} overlapping subtitle entries in {:?}", overlaps, path);
        }
        debug!("Loaded {} {} cues from {:?}", track.entries.len(), format, path);

        Ok(track)
    }

    /// Stable sort by start time, then renumber
    pub fn sort_by_start(&mut self) {
        self.entries.sort_by_key(|entry| entry.start_time_ms);
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.seq_num = i + 1;
        }
    }

    /// Number of adjacent pairs whose cues overlap
    pub fn overlap_count(&self) -> usize {
        self.entries
            .windows(2)
            .filter(|pair| pair[0].end_time_ms > pair[1].start_time_ms)
            .count()
    }

    /// Shift a source-timed track onto a clip window.
    ///
    /// Cues outside the window are dropped; the rest move by `-window.start`
    /// and are clipped to the window end.
    pub fn rebase(&self, window: &TimeRange) -> Self {
        let window_start = window.start_ms();
        let window_end = window.end_ms();

        let entries: Vec<SubtitleEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.end_time_ms > window_start && entry.start_time_ms < window_end)
            .map(|entry| {
                let mut shifted = entry.clone();
                shifted.start_time_ms = entry.start_time_ms.saturating_sub(window_start);
                shifted.end_time_ms = entry.end_time_ms.min(window_end) - window_start;
                shifted
            })
            .collect();

        let mut rebased = Self::from_entries(self.source_file.clone(), self.encoding, self.format, entries);
        rebased.ass_header = self.ass_header.clone();
        rebased
    }

    /// Write the track as SRT
    pub fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> Result<(), SubtitleError> {
        let path = path.as_ref();
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(&entry.to_string());
        }
        write_file(path, &content)
    }

    /// Write the track as ASS, the format the renderer consumes
    pub fn write_to_ass<P: AsRef<Path>>(&self, path: P) -> Result<(), SubtitleError> {
        let path = path.as_ref();
        let content = subtitle_formats::ass::render(self);
        write_file(path, &content)
    }

    /// Write in the format implied by the file extension (ASS unless `.srt`)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SubtitleError> {
        let path = path.as_ref();
        match SubtitleFormat::from_extension(path) {
            Some(SubtitleFormat::Srt) => self.write_to_srt(path),
            Some(SubtitleFormat::Ass) | None => self.write_to_ass(path),
            Some(SubtitleFormat::WebVtt) => Err(SubtitleError::write(path, "writing WebVTT is not supported")),
        }
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), SubtitleError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| SubtitleError::write(path, e.to_string()))?;
        }
    }
    fs::write(path, content).map_err(|e| SubtitleError::write(path, e.to_string()))
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Track")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Format: {}", self.format)?;
        writeln!(f, "Encoding: {}", self.encoding)?;
        writeln!(f, "Entries: {}", self.entries.len())?;
        Ok(())
    }
}
