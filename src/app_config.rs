use anyhow::{Context, Result, anyhow};
use log::{LevelFilter, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::encoding::SubtitleEncoding;
use crate::tools::fetcher::DEFAULT_DOWNLOAD_FORMAT;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// External tool locations and time budgets
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Output encoding settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Subtitle defaults
    #[serde(default)]
    pub subtitles: SubtitleConfig,

    /// Directory for intermediate files; the output's directory when unset
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

// @const: Bitrates as ffmpeg accepts them, e.g. 5000k, 1.5M, 192000
static BITRATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)?[kKmM]?$").expect("bitrate regex is valid"));

/// One external program
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolConfig {
    // @field: Binary name or path
    pub program: String,

    // @field: Seconds before the process is killed
    pub timeout_secs: u64,
}

impl ToolConfig {
    pub fn new(program: &str, timeout_secs: u64) -> Self {
        Self {
            program: program.to_string(),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// External tools used by the pipeline
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolsConfig {
    /// Remote downloader
    #[serde(default = "default_ytdlp")]
    pub ytdlp: ToolConfig,

    /// Cutting, subtitle extraction and rendering
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: ToolConfig,

    /// Duration and stream probing
    #[serde(default = "default_ffprobe")]
    pub ffprobe: ToolConfig,

    /// Subtitle aligner
    #[serde(default = "default_ffsubsync")]
    pub ffsubsync: ToolConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp: default_ytdlp(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            ffsubsync: default_ffsubsync(),
        }
    }
}

/// Output encoding settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RenderConfig {
    /// Video bitrate passed to ffmpeg
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// Audio bitrate passed to ffmpeg
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// yt-dlp format selection
    #[serde(default = "default_download_format")]
    pub download_format: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            video_bitrate: default_video_bitrate(),
            audio_bitrate: default_audio_bitrate(),
            download_format: default_download_format(),
        }
    }
}

/// Subtitle defaults
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubtitleConfig {
    /// Language auto-fetched when no subtitle file is given; `null` disables auto-fetch
    #[serde(default = "default_language")]
    pub default_language: Option<String>,

    /// Encoding assumed for supplied subtitle files
    #[serde(default)]
    pub default_encoding: SubtitleEncoding,

    /// Align subtitles to the audio unless told otherwise
    #[serde(default = "default_true")]
    pub align: bool,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            default_encoding: SubtitleEncoding::default(),
            align: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_ytdlp() -> ToolConfig {
    // Downloads of long sections can take a while
    ToolConfig::new("yt-dlp", 1800)
}

fn default_ffmpeg() -> ToolConfig {
    ToolConfig::new("ffmpeg", 3600)
}

fn default_ffprobe() -> ToolConfig {
    ToolConfig::new("ffprobe", 60)
}

fn default_ffsubsync() -> ToolConfig {
    ToolConfig::new("ffsubsync", 900)
}

fn default_video_bitrate() -> String {
    "5000k".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_download_format() -> String {
    DEFAULT_DOWNLOAD_FORMAT.to_string()
}

fn default_language() -> Option<String> {
    Some("en".to_string())
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load `path`, writing a default configuration there first if it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path).with_context(|| format!("Failed to open config file: {:?}", path))?;
            let reader = BufReader::new(file);
            return serde_json::from_reader(reader).with_context(|| format!("Failed to parse config file: {:?}", path));
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();

        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {:?}", path))?;

        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if let Some(language) = &self.subtitles.default_language {
            crate::language_utils::get_language_name(language)
                .with_context(|| format!("Invalid default subtitle language '{}'", language))?;
        }

        for (name, bitrate) in [
            ("video", &self.render.video_bitrate),
            ("audio", &self.render.audio_bitrate),
        ] {
            if !BITRATE_REGEX.is_match(bitrate) {
                return Err(anyhow!("Invalid {} bitrate '{}': expected e.g. 5000k", name, bitrate));
            }
        }

        if self.render.download_format.trim().is_empty() {
            return Err(anyhow!("Download format must not be empty"));
        }

        for (name, tool) in [
            ("ytdlp", &self.tools.ytdlp),
            ("ffmpeg", &self.tools.ffmpeg),
            ("ffprobe", &self.tools.ffprobe),
            ("ffsubsync", &self.tools.ffsubsync),
        ] {
            if tool.program.trim().is_empty() {
                return Err(anyhow!("Program for tool '{}' must not be empty", name));
            }
            if tool.timeout_secs == 0 {
                return Err(anyhow!("Timeout for tool '{}' must be positive", name));
            }
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            tools: ToolsConfig::default(),
            render: RenderConfig::default(),
            subtitles: SubtitleConfig::default(),
            work_dir: None,
            log_level: LogLevel::default(),
        }
    }
}
