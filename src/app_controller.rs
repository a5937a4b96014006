use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::clip_assembler::{ClipAssembler, ClipRequest, FailureReason, PipelineFailure, PipelineOutcome, RunStatus};
use crate::encoding::SubtitleEncoding;
use crate::file_utils::{DEFAULT_CLIP_OUTPUT, FileManager, SourceLocator};
use crate::language_utils;
use crate::time_spec::TimeRange;
use crate::tools::{
    FfmpegRenderer, FfsubsyncAligner, LocalFileFetcher, RangeFetcher, RenderSettings, Renderer, SubtitleAligner,
    YtDlpFetcher,
};

// @module: Application controller for clip requests

/// Options of the `clip` command
#[derive(Debug, Clone, Default)]
pub struct ClipOptions {
    pub locator: String,
    pub start: String,
    pub end: String,
    pub fps: u32,
    pub output: Option<PathBuf>,
    pub subtitle_file: Option<PathBuf>,
    pub language: Option<String>,
    pub no_sync: bool,
    pub encoding: Option<SubtitleEncoding>,
    pub source_timed: bool,
}

/// Options of the `burn` command
#[derive(Debug, Clone, Default)]
pub struct BurnOptions {
    pub video: PathBuf,
    pub subtitles: PathBuf,
    pub output: Option<PathBuf>,
    pub sync: bool,
    pub encoding: Option<SubtitleEncoding>,
}

/// The external collaborators a controller can hand to the pipeline
#[derive(Debug, Clone)]
pub struct Toolbox {
    pub remote: Arc<dyn RangeFetcher>,
    pub local: Arc<dyn RangeFetcher>,
    pub aligner: Arc<dyn SubtitleAligner>,
    pub renderer: Arc<dyn Renderer>,
}

impl Toolbox {
    /// The real command-line tools, as configured
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.tools;
        Self {
            remote: Arc::new(YtDlpFetcher::new(
                tools.ytdlp.program.clone(),
                config.render.download_format.clone(),
                tools.ytdlp.timeout(),
            )),
            local: Arc::new(LocalFileFetcher::new(
                tools.ffmpeg.program.clone(),
                tools.ffprobe.program.clone(),
                tools.ffmpeg.timeout(),
                tools.ffprobe.timeout(),
            )),
            aligner: Arc::new(FfsubsyncAligner::new(tools.ffsubsync.program.clone(), tools.ffsubsync.timeout())),
            renderer: Arc::new(FfmpegRenderer::new(tools.ffmpeg.program.clone(), tools.ffmpeg.timeout())),
        }
    }
}

/// Main application controller: validates user input and runs the pipeline
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Pipeline collaborators
    toolbox: Toolbox,
    // @field: Show a spinner while the pipeline runs
    show_progress: bool,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Self {
        let toolbox = Toolbox::from_config(&config);
        Self::with_toolbox(config, toolbox)
    }

    /// Create a controller driving the given collaborators
    pub fn with_toolbox(config: Config, toolbox: Toolbox) -> Self {
        Self {
            config,
            toolbox,
            show_progress: true,
        }
    }

    /// Disable the progress spinner
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cut, subtitle and render a clip
    pub async fn clip(&self, options: ClipOptions) -> Result<PipelineOutcome, PipelineFailure> {
        let request = self.clip_request(options)?;
        self.execute(request).await
    }

    /// Burn subtitles into a whole local video
    pub async fn burn(&self, options: BurnOptions) -> Result<PipelineOutcome, PipelineFailure> {
        let request = self.burn_request(options)?;
        self.execute(request).await
    }

    /// Validate `clip` options and turn them into a pipeline request
    pub fn clip_request(&self, options: ClipOptions) -> Result<ClipRequest, PipelineFailure> {
        let range = TimeRange::parse(&options.start, &options.end)
            .map_err(|e| PipelineFailure::rejected(FailureReason::InvalidTimeSpec, e.to_string()))?;

        if options.fps == 0 {
            return Err(invalid_input("Frame rate must be a positive integer"));
        }

        if let Some(file) = &options.subtitle_file {
            if !FileManager::file_exists(file) {
                return Err(invalid_input(format!("Subtitle file not found: {:?}", file)));
            }
        }

        let language = options
            .language
            .clone()
            .or_else(|| self.config.subtitles.default_language.clone());
        if let Some(code) = &language {
            language_utils::validate_language_code(code).map_err(|e| invalid_input(e.to_string()))?;
        }

        let output = options.output.unwrap_or_else(|| PathBuf::from(DEFAULT_CLIP_OUTPUT));
        if let SourceLocator::Local(path) = SourceLocator::classify(&options.locator) {
            if FileManager::same_file(&path, &output) {
                return Err(invalid_input("Output would overwrite the source video"));
            }
        }

        Ok(ClipRequest {
            locator: options.locator,
            range: Some(range),
            output,
            subtitle_file: options.subtitle_file,
            subtitle_language: language,
            align: self.config.subtitles.align && !options.no_sync,
            encoding: options.encoding.unwrap_or(self.config.subtitles.default_encoding),
            source_timed: options.source_timed,
            render: self.render_settings(Some(options.fps)),
            work_dir: self.config.work_dir.clone(),
        })
    }

    /// Validate `burn` options and turn them into a pipeline request
    pub fn burn_request(&self, options: BurnOptions) -> Result<ClipRequest, PipelineFailure> {
        if !FileManager::file_exists(&options.video) {
            return Err(invalid_input(format!("Video file not found: {:?}", options.video)));
        }
        if !FileManager::file_exists(&options.subtitles) {
            return Err(invalid_input(format!("Subtitle file not found: {:?}", options.subtitles)));
        }

        let output = options
            .output
            .unwrap_or_else(|| FileManager::burn_output_path(&options.video));
        if FileManager::same_file(&options.video, &output) {
            return Err(invalid_input("Output would overwrite the source video"));
        }

        let mut request = ClipRequest::whole_file(options.video, options.subtitles, output);
        request.align = options.sync;
        request.encoding = options.encoding.unwrap_or(self.config.subtitles.default_encoding);
        request.render = self.render_settings(None);
        request.work_dir = self.config.work_dir.clone();

        Ok(request)
    }

    fn render_settings(&self, frame_rate: Option<u32>) -> RenderSettings {
        RenderSettings {
            frame_rate,
            video_bitrate: Some(self.config.render.video_bitrate.clone()),
            audio_bitrate: Some(self.config.render.audio_bitrate.clone()),
        }
    }

    /// Choose the fetcher for a locator: URLs go to yt-dlp, everything else is a local file
    fn fetcher_for(&self, locator: &str) -> Arc<dyn RangeFetcher> {
        if SourceLocator::classify(locator).is_remote() {
            Arc::clone(&self.toolbox.remote)
        } else {
            Arc::clone(&self.toolbox.local)
        }
    }

    async fn execute(&self, request: ClipRequest) -> Result<PipelineOutcome, PipelineFailure> {
        let start_time = Instant::now();

        let mut assembler = ClipAssembler::new(
            self.fetcher_for(&request.locator),
            Arc::clone(&self.toolbox.aligner),
            Arc::clone(&self.toolbox.renderer),
        );

        let spinner = self.show_progress.then(|| {
            let spinner = ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner
        });

        if let Some(spinner) = &spinner {
            let observer = spinner.clone();
            assembler = assembler.with_observer(Box::new(move |state| observer.set_message(state.to_string())));
        }

        let result = assembler.run(&request).await;

        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        let elapsed = Self::format_duration(start_time.elapsed());
        match &result {
            Ok(outcome) if outcome.status == RunStatus::Degraded => {
                warn!("Finished in {} without subtitles: {}", elapsed, outcome.output.display())
            }
            Ok(outcome) => info!("Finished in {}: {}", elapsed, outcome.output.display()),
            Err(failure) => warn!("Gave up after {}: {}", elapsed, failure.message),
        }

        result
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

fn invalid_input(message: impl Into<String>) -> PipelineFailure {
    PipelineFailure::rejected(FailureReason::InvalidInput, message)
}
