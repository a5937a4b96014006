/*!
 * The clip pipeline.
 *
 * A run moves through Fetching, SubtitleSourcing, Aligning, Normalizing and
 * Rendering. Fetch and render failures are fatal. A subtitle track that
 * cannot be aligned is burned in unaligned with a warning; one that cannot be
 * loaded or rewritten is dropped and the clip is rendered without subtitles
 * (a degraded run). Every intermediate file is recorded in an
 * `ArtifactLedger` and deleted when the run ends, however it ends.
 */

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::artifacts::{ArtifactLedger, ArtifactRole};
use crate::encoding::SubtitleEncoding;
use crate::errors::{AlignError, FetchError, PipelineError, RenderError, SubtitleError};
use crate::normalizer;
use crate::subtitle_formats::SubtitleFormat;
use crate::subtitle_processor::SubtitleTrack;
use crate::time_spec::TimeRange;
use crate::tools::{FetchedVideo, RangeFetcher, RenderSettings, Renderer, SubtitleAligner};

/// Everything needed for one pipeline run
#[derive(Debug, Clone)]
pub struct ClipRequest {
    /// URL or local path of the source video
    pub locator: String,

    /// Part of the source to keep; `None` burns the whole local file
    pub range: Option<TimeRange>,

    /// Final video path
    pub output: PathBuf,

    /// Subtitle file supplied by the user
    pub subtitle_file: Option<PathBuf>,

    /// Language to auto-fetch when no file is supplied
    pub subtitle_language: Option<String>,

    /// Run the aligner on the subtitle track
    pub align: bool,

    /// Encoding of the supplied subtitle file
    pub encoding: SubtitleEncoding,

    /// The supplied file is timed against the full source, not the clip
    pub source_timed: bool,

    pub render: RenderSettings,

    /// Directory for intermediates; defaults to the output's directory
    pub work_dir: Option<PathBuf>,
}

impl ClipRequest {
    /// A clip of `locator` with default subtitle handling
    pub fn new(locator: impl Into<String>, range: TimeRange, output: impl Into<PathBuf>) -> Self {
        Self {
            locator: locator.into(),
            range: Some(range),
            output: output.into(),
            subtitle_file: None,
            subtitle_language: None,
            align: true,
            encoding: SubtitleEncoding::default(),
            source_timed: false,
            render: RenderSettings::default(),
            work_dir: None,
        }
    }

    /// Burn `subtitles` into the whole of a local `video`
    pub fn whole_file(video: impl Into<PathBuf>, subtitles: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let video: PathBuf = video.into();
        Self {
            locator: video.to_string_lossy().to_string(),
            range: None,
            output: output.into(),
            subtitle_file: Some(subtitles.into()),
            subtitle_language: None,
            align: false,
            encoding: SubtitleEncoding::default(),
            source_timed: false,
            render: RenderSettings::default(),
            work_dir: None,
        }
    }

    /// Directory intermediates are written to
    pub fn effective_work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(|| parent_dir(&self.output))
    }
}

/// Pipeline states, reported to the stage observer on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Fetching,
    SubtitleSourcing,
    Aligning,
    Normalizing,
    /// Subtitles were discarded; rendering continues without them
    Degraded,
    Rendering,
    Cleanup,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fetching => "Fetching video",
            Self::SubtitleSourcing => "Sourcing subtitles",
            Self::Aligning => "Aligning subtitles",
            Self::Normalizing => "Normalizing subtitles",
            Self::Degraded => "Dropping subtitles",
            Self::Rendering => "Rendering",
            Self::Cleanup => "Cleaning up",
            Self::Done => "Done",
            Self::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// Callback notified of state transitions
pub type StageObserver = Box<dyn Fn(PipelineState) + Send + Sync>;

/// How a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Rendered, but the subtitle track had to be discarded
    Degraded,
}

/// What happened to the subtitle track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleOutcome {
    /// No track was supplied or available
    None,
    /// Burned in after alignment
    Aligned,
    /// Burned in with its original timing
    Unaligned,
    /// Dropped because it could not be processed
    Discarded,
}

/// Kind of a recoverable problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    SubtitleFetchFailed,
    NoCuesInRange,
    AlignerUnavailable,
    AlignmentFailed,
    SubtitlesDiscarded,
}

/// A recoverable problem reported alongside a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl PipelineWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of a run that produced an output file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub output: PathBuf,
    pub status: RunStatus,
    pub subtitles: SubtitleOutcome,
    pub warnings: Vec<PipelineWarning>,
}

/// Machine-readable reason for a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidTimeSpec,
    InvalidInput,
    FetchError,
    RangeError,
    RenderError,
    WorkDirError,
}

/// A run that produced no output
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message}")]
pub struct PipelineFailure {
    /// Absent when the run was rejected before it started
    pub run_id: Option<String>,
    pub reason: FailureReason,
    pub message: String,
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineFailure {
    /// A failure detected before any pipeline work
    pub fn rejected(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            run_id: None,
            reason,
            message: message.into(),
            warnings: Vec::new(),
        }
    }

    fn from_error(error: &PipelineError, run_id: Option<String>, warnings: Vec<PipelineWarning>) -> Self {
        let reason = match error {
            PipelineError::TimeSpec(_) => FailureReason::InvalidTimeSpec,
            PipelineError::Fetch(FetchError::Range(_)) => FailureReason::RangeError,
            PipelineError::Fetch(_) => FailureReason::FetchError,
            PipelineError::Render(_) => FailureReason::RenderError,
            PipelineError::WorkDir(_) => FailureReason::WorkDirError,
        };

        Self {
            run_id,
            reason,
            message: error.to_string(),
            warnings,
        }
    }
}

impl From<PipelineError> for PipelineFailure {
    fn from(error: PipelineError) -> Self {
        Self::from_error(&error, None, Vec::new())
    }
}

/// A subtitle file on its way to the renderer
#[derive(Debug, Clone)]
struct StagedSubtitles {
    path: PathBuf,
    encoding: SubtitleEncoding,
    aligned: bool,
}

/// Per-run mutable state
struct RunContext {
    ledger: ArtifactLedger,
    warnings: Vec<PipelineWarning>,
}

impl RunContext {
    fn warn(&mut self, kind: WarningKind, message: String) {
        warn!("{}", message);
        self.warnings.push(PipelineWarning::new(kind, message));
    }
}

/// Drives a clip request through fetch, subtitle processing and render
pub struct ClipAssembler {
    fetcher: Arc<dyn RangeFetcher>,
    aligner: Arc<dyn SubtitleAligner>,
    renderer: Arc<dyn Renderer>,
    observer: Option<StageObserver>,
}

impl fmt::Debug for ClipAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipAssembler")
            .field("fetcher", &self.fetcher)
            .field("aligner", &self.aligner)
            .field("renderer", &self.renderer)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl ClipAssembler {
    pub fn new(
        fetcher: Arc<dyn RangeFetcher>,
        aligner: Arc<dyn SubtitleAligner>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            fetcher,
            aligner,
            renderer,
            observer: None,
        }
    }

    /// Notify `observer` of every state transition
    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    fn enter(&self, state: PipelineState) {
        debug!("Pipeline state: {:?}", state);
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }

    /// Run the pipeline. Intermediates are removed before this returns.
    pub async fn run(&self, request: &ClipRequest) -> Result<PipelineOutcome, PipelineFailure> {
        let work_dir = request.effective_work_dir();
        if let Err(e) = prepare_dirs(&work_dir, &request.output) {
            self.enter(PipelineState::Failed);
            return Err(e.into());
        }

        let mut ctx = RunContext {
            ledger: ArtifactLedger::new(&work_dir, &request.output),
            warnings: Vec::new(),
        };
        info!("Starting run {} for {}", ctx.ledger.run_id(), request.locator);

        let result = self.execute(request, &mut ctx).await;

        self.enter(PipelineState::Cleanup);
        let report = ctx.ledger.cleanup();
        debug!(
            "Cleanup removed {} artifact(s) and {} stray file(s), {} never created, {} failed",
            report.removed, report.swept, report.missing, report.failed
        );

        let run_id = ctx.ledger.run_id().to_string();
        match result {
            Ok((status, subtitles)) => {
                self.enter(PipelineState::Done);
                info!("Wrote {:?}", request.output);
                Ok(PipelineOutcome {
                    run_id,
                    output: request.output.clone(),
                    status,
                    subtitles,
                    warnings: ctx.warnings,
                })
            }
            Err(e) => {
                self.enter(PipelineState::Failed);
                error!("Run {} failed: {}", run_id, e);
                Err(PipelineFailure::from_error(&e, Some(run_id), ctx.warnings))
            }
        }
    }

    async fn execute(
        &self,
        request: &ClipRequest,
        ctx: &mut RunContext,
    ) -> Result<(RunStatus, SubtitleOutcome), PipelineError> {
        self.enter(PipelineState::Fetching);
        let video = self.fetch_video(request, ctx).await?;

        self.enter(PipelineState::SubtitleSourcing);
        let mut status = RunStatus::Completed;
        let mut subtitles = self.source_subtitles(request, ctx).await;

        if let (Some(staged), Some(range)) = (subtitles.clone(), request.range.as_ref()) {
            if self.is_source_timed(request) {
                let window = subtitle_window(range, video.start);
                subtitles = match rebase(&staged, &window, ctx) {
                    Ok(rebased) => rebased,
                    Err(e) => {
                        status = self.degrade(e, ctx);
                        None
                    }
                };
            }
        }

        if request.align {
            if let Some(staged) = subtitles.as_mut() {
                self.enter(PipelineState::Aligning);
                self.align(&video.path, staged, ctx).await;
            }
        }

        let mut normalized = None;
        if let Some(staged) = &subtitles {
            self.enter(PipelineState::Normalizing);
            match normalize(staged, ctx) {
                Ok(path) => normalized = Some(path),
                Err(e) => status = self.degrade(e, ctx),
            }
        }

        let outcome = match (&normalized, &subtitles) {
            (Some(_), Some(staged)) if staged.aligned => SubtitleOutcome::Aligned,
            (Some(_), Some(_)) => SubtitleOutcome::Unaligned,
            _ if status == RunStatus::Degraded => SubtitleOutcome::Discarded,
            _ => SubtitleOutcome::None,
        };

        self.enter(PipelineState::Rendering);
        self.render(&video.path, normalized.as_deref(), request, ctx).await?;

        Ok((status, outcome))
    }

    async fn fetch_video(&self, request: &ClipRequest, ctx: &mut RunContext) -> Result<FetchedVideo, PipelineError> {
        let Some(range) = &request.range else {
            // Whole-file burns read the source in place; it is never an artifact
            let source = PathBuf::from(&request.locator);
            if !source.is_file() {
                return Err(FetchError::Fetch(format!("Video file not found: {:?}", source)).into());
            }
            return Ok(FetchedVideo { path: source, start: 0.0 });
        };

        let destination = ctx.ledger.allocate(ArtifactRole::SourceVideo, "mp4");
        let fetched = self.fetcher.fetch(&request.locator, range, &destination).await?;
        ctx.ledger.track(ArtifactRole::SourceVideo, fetched.path.clone());

        Ok(fetched)
    }

    async fn source_subtitles(&self, request: &ClipRequest, ctx: &mut RunContext) -> Option<StagedSubtitles> {
        if let Some(file) = &request.subtitle_file {
            info!("Using subtitle file {:?}", file);
            return Some(StagedSubtitles {
                path: file.clone(),
                encoding: request.encoding,
                aligned: false,
            });
        }

        let Some(language) = &request.subtitle_language else {
            info!("No subtitles requested");
            return None;
        };

        let destination = ctx
            .ledger
            .allocate(ArtifactRole::FetchedSubtitles, self.fetcher.subtitle_extension());

        match self.fetcher.fetch_subtitles(&request.locator, language, &destination).await {
            Ok(Some(path)) => {
                ctx.ledger.track(ArtifactRole::FetchedSubtitles, path.clone());
                Some(StagedSubtitles {
                    path,
                    encoding: SubtitleEncoding::Utf8,
                    aligned: false,
                })
            }
            Ok(None) => {
                info!("No '{}' subtitles available; rendering without subtitles", language);
                None
            }
            Err(e) => {
                ctx.warn(
                    WarningKind::SubtitleFetchFailed,
                    format!("Could not fetch '{}' subtitles, rendering without: {}", language, e),
                );
                None
            }
        }
    }

    /// Auto-fetched tracks always follow the source's timeline
    fn is_source_timed(&self, request: &ClipRequest) -> bool {
        request.subtitle_file.is_none() || request.source_timed
    }

    async fn align(&self, video: &Path, staged: &mut StagedSubtitles, ctx: &mut RunContext) {
        // ffsubsync writes the format named by the output extension; keep ASS styling, else SRT
        let extension = match SubtitleFormat::from_extension(&staged.path) {
            Some(SubtitleFormat::Ass) => SubtitleFormat::Ass.extension(),
            _ => SubtitleFormat::Srt.extension(),
        };
        let destination = ctx.ledger.allocate(ArtifactRole::AlignedSubtitles, extension);

        match self.aligner.align(video, &staged.path, staged.encoding, &destination).await {
            Ok(path) => {
                ctx.ledger.track(ArtifactRole::AlignedSubtitles, path.clone());
                staged.path = path;
                staged.encoding = SubtitleEncoding::Utf8;
                staged.aligned = true;
            }
            Err(AlignError::AlignerUnavailable(reason)) => ctx.warn(
                WarningKind::AlignerUnavailable,
                format!("Subtitle aligner unavailable, using original timing: {}", reason),
            ),
            Err(AlignError::AlignmentFailed(reason)) => ctx.warn(
                WarningKind::AlignmentFailed,
                format!("Subtitle alignment failed, using original timing: {}", reason),
            ),
        }
    }

    fn degrade(&self, error: SubtitleError, ctx: &mut RunContext) -> RunStatus {
        self.enter(PipelineState::Degraded);
        ctx.warn(
            WarningKind::SubtitlesDiscarded,
            format!("Rendering without subtitles: {}", error),
        );
        RunStatus::Degraded
    }

    async fn render(
        &self,
        video: &Path,
        subtitles: Option<&Path>,
        request: &ClipRequest,
        ctx: &mut RunContext,
    ) -> Result<(), PipelineError> {
        let extension = request
            .output
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "mp4".to_string());
        let staged = ctx
            .ledger
            .allocate_in(&parent_dir(&request.output), ArtifactRole::StagedOutput, &extension);

        self.renderer.render(video, subtitles, &request.render, &staged).await?;

        fs::rename(&staged, &request.output).map_err(|e| RenderError::Finalize {
            path: request.output.clone(),
            source: e,
        })?;
        ctx.ledger.release(&staged);

        Ok(())
    }
}

/// The part of the source timeline the fetched file covers: from its first
/// frame, which may sit on a keyframe before the requested start, to the requested end
fn subtitle_window(range: &TimeRange, fetched_start: f64) -> TimeRange {
    if fetched_start >= range.start() {
        return *range;
    }
    match TimeRange::new(fetched_start, range.end()) {
        Ok(window) => {
            debug!("Fetched video starts at {:.3}s, before the requested {}", fetched_start, range);
            window
        }
        Err(_) => *range,
    }
}

/// Shift a source-timed track onto the clip window. `None` when no cue falls inside it.
fn rebase(
    staged: &StagedSubtitles,
    range: &TimeRange,
    ctx: &mut RunContext,
) -> Result<Option<StagedSubtitles>, SubtitleError> {
    let track = SubtitleTrack::load(&staged.path, staged.encoding)?;
    let rebased = track.rebase(range);

    if rebased.entries.is_empty() {
        ctx.warn(
            WarningKind::NoCuesInRange,
            format!("No subtitle cues fall inside {}; rendering without subtitles", range),
        );
        return Ok(None);
    }

    let extension = match track.format {
        SubtitleFormat::Ass => SubtitleFormat::Ass.extension(),
        _ => SubtitleFormat::Srt.extension(),
    };
    let destination = ctx.ledger.allocate(ArtifactRole::RebasedSubtitles, extension);
    rebased.save(&destination)?;
    debug!("Rebased {} of {} cue(s) onto {}", rebased.entries.len(), track.entries.len(), range);

    Ok(Some(StagedSubtitles {
        path: destination,
        encoding: SubtitleEncoding::Utf8,
        aligned: staged.aligned,
    }))
}

fn normalize(staged: &StagedSubtitles, ctx: &mut RunContext) -> Result<PathBuf, SubtitleError> {
    let destination = ctx.ledger.allocate(ArtifactRole::NormalizedSubtitles, "ass");
    normalizer::normalize_file(&staged.path, staged.encoding, &destination)?;
    Ok(destination)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn prepare_dirs(work_dir: &Path, output: &Path) -> Result<(), PipelineError> {
    for dir in [work_dir.to_path_buf(), parent_dir(output)] {
        fs::create_dir_all(&dir).map_err(|e| PipelineError::WorkDir(format!("cannot create {:?}: {}", dir, e)))?;
    }
    Ok(())
}
