/*!
 * External collaborators of the clip pipeline.
 *
 * Each collaborator is a trait so the assembler can be driven by the real
 * command-line tools or by in-process fakes:
 * - `RangeFetcher`: yt-dlp for remote locators, ffmpeg for local files
 * - `SubtitleAligner`: ffsubsync
 * - `Renderer`: ffmpeg with the libass `subtitles` filter
 */

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::encoding::SubtitleEncoding;
use crate::errors::{AlignError, FetchError, RenderError};
use crate::time_spec::TimeRange;

pub mod aligner;
pub mod fetcher;
pub mod process;
pub mod renderer;

pub use aligner::FfsubsyncAligner;
pub use fetcher::{LocalFileFetcher, YtDlpFetcher};
pub use renderer::FfmpegRenderer;

/// A fetched video and where it sits on the source timeline
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedVideo {
    /// Fetched file, normally the requested destination
    pub path: PathBuf,
    /// Source time in seconds of the file's first frame; at or before the requested start
    pub start: f64,
}

impl FetchedVideo {
    /// A file whose first frame is exactly the start of `range`
    pub fn exact(path: impl Into<PathBuf>, range: &TimeRange) -> Self {
        Self {
            path: path.into(),
            start: range.start(),
        }
    }
}

/// Produces local video files covering a time range of a source
#[async_trait]
pub trait RangeFetcher: Send + Sync + Debug {
    /// Fetch at least `range` of `locator` into `destination`.
    ///
    /// A cut that snaps back to an earlier keyframe reports the earlier start,
    /// so source-timed subtitles can be shifted onto the file's own timeline.
    async fn fetch(&self, locator: &str, range: &TimeRange, destination: &Path) -> Result<FetchedVideo, FetchError>;

    /// Fetch a subtitle track in `language` for `locator` into `destination`.
    ///
    /// `Ok(None)` means the source has no track in that language.
    async fn fetch_subtitles(
        &self,
        locator: &str,
        language: &str,
        destination: &Path,
    ) -> Result<Option<PathBuf>, FetchError>;

    /// File extension of the subtitle files this fetcher produces
    fn subtitle_extension(&self) -> &'static str {
        "vtt"
    }
}

/// Retimes a subtitle file against a video's audio
#[async_trait]
pub trait SubtitleAligner: Send + Sync + Debug {
    /// Write an aligned copy of `subtitles` to `destination`
    async fn align(
        &self,
        video: &Path,
        subtitles: &Path,
        encoding: SubtitleEncoding,
        destination: &Path,
    ) -> Result<PathBuf, AlignError>;
}

/// Encoding targets for the final video
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderSettings {
    /// Output frame rate; the source rate is kept when unset
    pub frame_rate: Option<u32>,
    /// Video bitrate such as `5000k`
    pub video_bitrate: Option<String>,
    /// Audio bitrate such as `192k`
    pub audio_bitrate: Option<String>,
}

/// Transcodes a video, optionally burning in a subtitle overlay
#[async_trait]
pub trait Renderer: Send + Sync + Debug {
    /// Render `video` to `output`, burning `subtitles` in when given
    async fn render(
        &self,
        video: &Path,
        subtitles: Option<&Path>,
        settings: &RenderSettings,
        output: &Path,
    ) -> Result<(), RenderError>;
}
