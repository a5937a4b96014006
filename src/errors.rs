/*!
 * Error types for the subclip application.
 *
 * Each pipeline stage has its own error enum so the clip assembler can decide,
 * per stage, whether a failure aborts the run or degrades it. All of them are
 * defined with the thiserror crate; application glue wraps them in anyhow.
 */

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced while parsing human time expressions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeSpecError {
    /// The text is neither `H:MM:SS` nor a number of seconds
    #[error("Invalid time spec '{0}': expected HH:MM:SS or seconds")]
    InvalidTimeSpec(String),

    /// End of a range is not after its start
    #[error("Invalid time range: end {end}s must be after start {start}s")]
    InvalidRange { start: f64, end: f64 },
}

/// Errors from running an external tool as a child process
#[derive(Error, Debug)]
pub enum ToolError {
    /// The binary could not be found on PATH
    #[error("{program} not found, is it installed?")]
    NotFound { program: String },

    /// The tool ran and exited unsuccessfully
    #[error("{program} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The tool did not finish within its time budget
    #[error("{program} timed out after {}s", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    /// Spawning or waiting on the process failed for another reason
    #[error("Failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    /// Whether the tool is missing, as opposed to having run and failed
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors from the range fetcher
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network, auth, missing tool, or unavailable resource
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Requested range lies outside the source video
    #[error("Range error: {0}")]
    Range(String),

    /// A fetch tool failed
    #[error("Fetch tool error: {0}")]
    Tool(#[from] ToolError),
}

/// Errors from the subtitle aligner
#[derive(Error, Debug)]
pub enum AlignError {
    /// The aligner binary is not installed
    #[error("Subtitle aligner unavailable: {0}")]
    AlignerUnavailable(String),

    /// The aligner ran but produced no usable result
    #[error("Subtitle alignment failed: {0}")]
    AlignmentFailed(String),
}

impl From<ToolError> for AlignError {
    fn from(error: ToolError) -> Self {
        if error.is_not_found() {
            Self::AlignerUnavailable(error.to_string())
        } else {
            Self::AlignmentFailed(error.to_string())
        }
    }
}

/// Errors that can occur during subtitle processing
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// The file could not be read, decoded, or recognized
    #[error("Failed to load subtitles from {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// The normalized track could not be written
    #[error("Failed to write subtitles to {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },
}

impl SubtitleError {
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the external renderer
#[derive(Error, Debug)]
pub enum RenderError {
    /// The render tool failed
    #[error("Render failed: {0}")]
    Tool(#[from] ToolError),

    /// The render finished but no output was produced
    #[error("Render produced no output at {0:?}")]
    MissingOutput(PathBuf),

    /// Moving the staged render into place failed
    #[error("Failed to finalize output {path:?}: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal errors that end a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Bad time input
    #[error(transparent)]
    TimeSpec(#[from] TimeSpecError),

    /// Source video could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Output could not be rendered
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Work directory could not be prepared
    #[error("Work directory error: {0}")]
    WorkDir(String),
}
