/*!
 * In-process stand-ins for yt-dlp, ffsubsync and ffmpeg
 *
 * Each fake writes plain files where the real tool would write media, and
 * records what it was asked to do so tests can assert on the pipeline's
 * choices without any external process.
 */

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use subclip::app_controller::Toolbox;
use subclip::artifacts::ArtifactRole;
use subclip::encoding::SubtitleEncoding;
use subclip::errors::{AlignError, FetchError, RenderError, ToolError};
use subclip::time_spec::TimeRange;
use subclip::tools::{FetchedVideo, RangeFetcher, RenderSettings, Renderer, SubtitleAligner};

/// How the fake fetcher should behave
#[derive(Debug, Clone)]
pub enum FetchBehavior {
    /// Write a video file
    Succeed,
    /// Write a video file whose first frame is the keyframe at this source time
    SucceedFromKeyframe(f64),
    /// Write a video file, then put a directory where this run's artifact of
    /// the given role and extension will be written
    SucceedAndBlock(ArtifactRole, &'static str),
    /// Fail like a network error
    FailFetch,
    /// Fail like a range past the end of the video
    FailRange,
    /// Write half a file, then fail
    FailAfterPartialWrite,
}

/// How the fake fetcher answers subtitle requests
#[derive(Debug, Clone)]
pub enum SubtitleSource {
    /// No track in the requested language
    Unavailable,
    /// A track with this content
    Track(String),
    /// The subtitle download itself fails
    Error,
}

#[derive(Debug)]
pub struct FakeFetcher {
    pub behavior: FetchBehavior,
    pub subtitles: SubtitleSource,
    pub fetched_ranges: Mutex<Vec<TimeRange>>,
    pub subtitle_requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new(behavior: FetchBehavior, subtitles: SubtitleSource) -> Self {
        Self {
            behavior,
            subtitles,
            fetched_ranges: Mutex::new(Vec::new()),
            subtitle_requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RangeFetcher for FakeFetcher {
    async fn fetch(&self, locator: &str, range: &TimeRange, destination: &Path) -> Result<FetchedVideo, FetchError> {
        self.fetched_ranges.lock().unwrap().push(*range);

        match self.behavior {
            FetchBehavior::Succeed => {
                fs::write(destination, format!("video of {} {}", locator, range)).unwrap();
                Ok(FetchedVideo::exact(destination, range))
            }
            FetchBehavior::SucceedFromKeyframe(start) => {
                fs::write(destination, format!("video of {} from {}", locator, start)).unwrap();
                Ok(FetchedVideo {
                    path: destination.to_path_buf(),
                    start,
                })
            }
            FetchBehavior::SucceedAndBlock(role, extension) => {
                fs::write(destination, b"video").unwrap();
                let name = destination.file_name().unwrap().to_string_lossy().to_string();
                let source_suffix = format!(".{}.mp4", ArtifactRole::SourceVideo.slug());
                let blocked = name.replace(&source_suffix, &format!(".{}.{}", role.slug(), extension));
                fs::create_dir_all(destination.with_file_name(blocked)).unwrap();
                Ok(FetchedVideo::exact(destination, range))
            }
            FetchBehavior::FailFetch => Err(FetchError::Fetch("HTTP Error 403: Forbidden".to_string())),
            FetchBehavior::FailRange => Err(FetchError::Range(format!("{} is past the end of the video", range))),
            FetchBehavior::FailAfterPartialWrite => {
                fs::write(destination, b"partial").unwrap();
                Err(ToolError::Failed {
                    program: "yt-dlp".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "connection reset".to_string(),
                }
                .into())
            }
        }
    }

    async fn fetch_subtitles(
        &self,
        _locator: &str,
        language: &str,
        destination: &Path,
    ) -> Result<Option<PathBuf>, FetchError> {
        self.subtitle_requests.lock().unwrap().push(language.to_string());

        match &self.subtitles {
            SubtitleSource::Unavailable => Ok(None),
            SubtitleSource::Track(content) => {
                fs::write(destination, content).unwrap();
                Ok(Some(destination.to_path_buf()))
            }
            SubtitleSource::Error => Err(FetchError::Fetch("subtitle download failed".to_string())),
        }
    }
}

/// How the fake aligner should behave
#[derive(Debug, Clone, Copy)]
pub enum AlignBehavior {
    /// Copy the input, shifted later by the given milliseconds
    Shift(u64),
    /// Not installed
    Unavailable,
    /// Ran and failed
    Fail,
}

#[derive(Debug)]
pub struct FakeAligner {
    pub behavior: AlignBehavior,
    pub calls: Mutex<usize>,
}

impl FakeAligner {
    pub fn new(behavior: AlignBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl SubtitleAligner for FakeAligner {
    async fn align(
        &self,
        _video: &Path,
        subtitles: &Path,
        encoding: SubtitleEncoding,
        destination: &Path,
    ) -> Result<PathBuf, AlignError> {
        *self.calls.lock().unwrap() += 1;

        match self.behavior {
            AlignBehavior::Shift(offset_ms) => {
                let mut track = subclip::SubtitleTrack::load(subtitles, encoding)
                    .map_err(|e| AlignError::AlignmentFailed(e.to_string()))?;
                for entry in &mut track.entries {
                    entry.start_time_ms += offset_ms;
                    entry.end_time_ms += offset_ms;
                }
                track
                    .save(destination)
                    .map_err(|e| AlignError::AlignmentFailed(e.to_string()))?;
                Ok(destination.to_path_buf())
            }
            AlignBehavior::Unavailable => Err(ToolError::NotFound {
                program: "ffsubsync".to_string(),
            }
            .into()),
            AlignBehavior::Fail => Err(AlignError::AlignmentFailed("no speech detected".to_string())),
        }
    }
}

/// One render the fake renderer was asked to do
#[derive(Debug, Clone)]
pub struct RenderCall {
    pub video: PathBuf,
    /// Content of the subtitle overlay at render time
    pub subtitles: Option<String>,
    pub settings: RenderSettings,
    pub output: PathBuf,
}

#[derive(Debug, Default)]
pub struct FakeRenderer {
    pub fail: bool,
    pub calls: Mutex<Vec<RenderCall>>,
}

impl FakeRenderer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn last_call(&self) -> Option<RenderCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(
        &self,
        video: &Path,
        subtitles: Option<&Path>,
        settings: &RenderSettings,
        output: &Path,
    ) -> Result<(), RenderError> {
        self.calls.lock().unwrap().push(RenderCall {
            video: video.to_path_buf(),
            subtitles: subtitles.map(|p| fs::read_to_string(p).unwrap()),
            settings: settings.clone(),
            output: output.to_path_buf(),
        });

        if self.fail {
            // ffmpeg leaves a truncated file behind when it dies mid-encode
            fs::write(output, b"trunc").unwrap();
            return Err(ToolError::Failed {
                program: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Error opening filters!".to_string(),
            }
            .into());
        }

        fs::write(output, b"rendered video").unwrap();
        Ok(())
    }
}

/// Handles to the fakes behind a `Toolbox`
pub struct FakeTools {
    pub fetcher: Arc<FakeFetcher>,
    pub aligner: Arc<FakeAligner>,
    pub renderer: Arc<FakeRenderer>,
}

impl FakeTools {
    pub fn new(fetcher: FakeFetcher, aligner: FakeAligner, renderer: FakeRenderer) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            aligner: Arc::new(aligner),
            renderer: Arc::new(renderer),
        }
    }

    /// Fetch succeeds, no subtitles online, aligner shifts by nothing, render succeeds
    pub fn happy() -> Self {
        Self::new(
            FakeFetcher::new(FetchBehavior::Succeed, SubtitleSource::Unavailable),
            FakeAligner::new(AlignBehavior::Shift(0)),
            FakeRenderer::default(),
        )
    }

    /// The same fake fetcher serves remote and local locators
    pub fn toolbox(&self) -> Toolbox {
        Toolbox {
            remote: self.fetcher.clone(),
            local: self.fetcher.clone(),
            aligner: self.aligner.clone(),
            renderer: self.renderer.clone(),
        }
    }

    pub fn assembler(&self) -> subclip::ClipAssembler {
        subclip::ClipAssembler::new(self.fetcher.clone(), self.aligner.clone(), self.renderer.clone())
    }
}
