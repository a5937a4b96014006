// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use subclip::app_config::{Config, LogLevel};
use subclip::app_controller::{BurnOptions, ClipOptions, Controller};
use subclip::clip_assembler::{FailureReason, PipelineFailure, PipelineOutcome, RunStatus};
use subclip::encoding::SubtitleEncoding;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cut a time range out of a video and burn subtitles into it
    Clip(ClipArgs),

    /// Burn a subtitle file into a whole local video
    Burn(BurnArgs),

    /// Generate shell completions for subclip
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct ClipArgs {
    /// Video URL or local file
    #[arg(value_name = "LOCATOR")]
    locator: String,

    /// Clip start, as HH:MM:SS or seconds
    #[arg(value_name = "START")]
    start: String,

    /// Clip end, as HH:MM:SS or seconds
    #[arg(value_name = "END")]
    end: String,

    /// Output frame rate
    #[arg(value_name = "FPS", value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    output: PathBuf,

    /// Subtitle file to burn in instead of fetching one
    #[arg(short, long, value_name = "SUBTITLE_FILE")]
    subtitles: Option<PathBuf>,

    /// Language of the subtitles to fetch (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    language: Option<String>,

    /// Skip aligning subtitles to the audio
    #[arg(long)]
    no_sync: bool,

    /// Encoding of the subtitle file (utf-8, utf-8-sig, utf-16, latin-1, ...)
    #[arg(short, long)]
    encoding: Option<SubtitleEncoding>,

    /// The subtitle file is timed against the full video, not the clip
    #[arg(long, requires = "subtitles")]
    source_timed: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct BurnArgs {
    /// Local video file
    #[arg(value_name = "VIDEO")]
    video: PathBuf,

    /// Subtitle file to burn in
    #[arg(value_name = "SUBTITLE")]
    subtitles: PathBuf,

    /// Output video file [default: <VIDEO stem>_subtitled.mp4]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Align subtitles to the audio before burning
    #[arg(long)]
    sync: bool,

    /// Encoding of the subtitle file
    #[arg(short, long)]
    encoding: Option<SubtitleEncoding>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

/// subclip - cut video clips with burned-in subtitles
#[derive(Parser, Debug)]
#[command(name = "subclip")]
#[command(version)]
#[command(about = "Cut video clips with burned-in subtitles")]
#[command(long_about = "subclip fetches a time range of a video, finds or takes a subtitle track, aligns it to the
audio, repairs overlapping cues and renders the clip with the subtitles burned in.

EXAMPLES:
    subclip clip https://youtu.be/abc 1:02:00 1:03:30 30             # Auto-fetch English subtitles
    subclip clip movie.mkv 90 120 24 -s movie.srt --source-timed     # Local file, full-length subtitles
    subclip clip https://youtu.be/abc 0 45 30 -l es --no-sync -o es.mp4
    subclip burn movie.mp4 movie.ass                                 # Whole file, movie_subtitled.mp4
    subclip completions bash > subclip.bash

CONFIGURATION:
    Configuration is stored in subclip.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.

EXTERNAL TOOLS:
    yt-dlp    - downloads ranges of remote videos and their subtitles
    ffmpeg    - cuts local files and renders the output
    ffprobe   - probes local files
    ffsubsync - aligns subtitles to the audio (optional)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "subclip.json", global = true)]
    config: PathBuf,

    /// Set logging level
    #[arg(long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger; the level filter is adjusted later with `log::set_max_level`
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Machine-readable run summary printed with `--json`
#[derive(Serialize, Debug)]
struct Report<'a> {
    status: &'static str,
    output: Option<&'a Path>,
    warnings: Vec<&'a str>,
    reason: Option<FailureReason>,
    message: Option<&'a str>,
}

impl<'a> Report<'a> {
    fn from_result(result: &'a Result<PipelineOutcome, PipelineFailure>) -> Self {
        match result {
            Ok(outcome) => Report {
                status: match outcome.status {
                    RunStatus::Completed => "completed",
                    RunStatus::Degraded => "degraded",
                },
                output: Some(outcome.output.as_path()),
                warnings: outcome.warnings.iter().map(|w| w.message.as_str()).collect(),
                reason: None,
                message: None,
            },
            Err(failure) => Report {
                status: "failed",
                output: None,
                warnings: failure.warnings.iter().map(|w| w.message.as_str()).collect(),
                reason: Some(failure.reason),
                message: Some(failure.message.as_str()),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Some(level) = cli.log_level {
        log::set_max_level(LogLevel::from(level).to_level_filter());
    }

    let (result, json) = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subclip", &mut std::io::stdout());
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Clip(args) => {
            let controller = build_controller(&cli.config, cli.log_level)?;
            let json = args.json;
            let options = ClipOptions {
                locator: args.locator,
                start: args.start,
                end: args.end,
                fps: args.fps,
                output: Some(args.output),
                subtitle_file: args.subtitles,
                language: args.language,
                no_sync: args.no_sync,
                encoding: args.encoding,
                source_timed: args.source_timed,
            };
            (controller.clip(options).await, json)
        }
        Commands::Burn(args) => {
            let controller = build_controller(&cli.config, cli.log_level)?;
            let json = args.json;
            let options = BurnOptions {
                video: args.video,
                subtitles: args.subtitles,
                output: args.output,
                sync: args.sync,
                encoding: args.encoding,
            };
            (controller.burn(options).await, json)
        }
    };

    print_report(&result, json)?;

    Ok(if result.is_ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Load and validate the configuration, then build the controller
fn build_controller(config_path: &Path, cli_log_level: Option<CliLogLevel>) -> Result<Controller> {
    let mut config = Config::load_or_create(config_path)?;

    // Update log level in config if specified via command line
    if let Some(level) = cli_log_level {
        config.log_level = level.into();
    }

    config.validate().context("Configuration validation failed")?;

    // If log level was not set via command line, take it from the config now
    if cli_log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    Ok(Controller::with_config(config))
}

fn print_report(result: &Result<PipelineOutcome, PipelineFailure>, json: bool) -> Result<()> {
    let mut stdout = std::io::stdout();

    if json {
        let report = Report::from_result(result);
        let text = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        writeln!(stdout, "{}", text)?;
        return Ok(());
    }

    match result {
        Ok(outcome) => {
            match outcome.status {
                RunStatus::Completed => writeln!(stdout, "Done: {}", outcome.output.display())?,
                RunStatus::Degraded => writeln!(stdout, "Done without subtitles: {}", outcome.output.display())?,
            }
            for warning in &outcome.warnings {
                writeln!(stdout, "  warning: {}", warning)?;
            }
        }
        Err(failure) => {
            writeln!(stdout, "Failed ({}): {}", reason_label(failure.reason), failure.message)?;
            for warning in &failure.warnings {
                writeln!(stdout, "  warning: {}", warning)?;
            }
        }
    }

    Ok(())
}

fn reason_label(reason: FailureReason) -> String {
    serde_json::to_value(reason)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", reason))
}
