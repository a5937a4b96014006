use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::{Value, from_str};

use crate::errors::{FetchError, ToolError};
use crate::language_utils;
use crate::time_spec::TimeRange;

use super::process::run_tool;
use super::{FetchedVideo, RangeFetcher};

/// Default yt-dlp format selection: mp4 video with m4a audio when available
pub const DEFAULT_DOWNLOAD_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// How far before the requested start to look for the keyframe a stream copy snaps to
const KEYFRAME_SEARCH_SECS: f64 = 60.0;

/// Fetches ranges of remote videos with yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: String,
    format: String,
    timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<String>, format: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
            timeout,
        }
    }

    fn fetch_args(&self, locator: &str, range: &TimeRange, destination: &Path) -> Vec<String> {
        vec![
            "--no-playlist".to_string(),
            "-f".to_string(),
            self.format.clone(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--download-sections".to_string(),
            format!("*{:.3}-{:.3}", range.start(), range.end()),
            "--force-keyframes-at-cuts".to_string(),
            "--force-overwrites".to_string(),
            "-o".to_string(),
            destination.to_string_lossy().to_string(),
            locator.to_string(),
        ]
    }

    fn subtitle_args(&self, locator: &str, language: &str, template: &str) -> Vec<String> {
        vec![
            "--no-playlist".to_string(),
            "--write-subs".to_string(),
            "--write-auto-subs".to_string(),
            "--sub-langs".to_string(),
            language.to_string(),
            "--skip-download".to_string(),
            "--sub-format".to_string(),
            "vtt".to_string(),
            "-o".to_string(),
            template.to_string(),
            locator.to_string(),
        ]
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new("yt-dlp", DEFAULT_DOWNLOAD_FORMAT, Duration::from_secs(1800))
    }
}

#[async_trait]
impl RangeFetcher for YtDlpFetcher {
    async fn fetch(&self, locator: &str, range: &TimeRange, destination: &Path) -> Result<FetchedVideo, FetchError> {
        info!("Downloading {} of {}", range, locator);

        run_tool(&self.program, &self.fetch_args(locator, range, destination), self.timeout)
            .await
            .map_err(classify_download_error)?;

        if !destination.exists() {
            return Err(FetchError::Fetch(format!(
                "{} finished but wrote no file at {:?}",
                self.program, destination
            )));
        }

        // --force-keyframes-at-cuts re-encodes around the cut, so the file starts on time
        Ok(FetchedVideo::exact(destination, range))
    }

    async fn fetch_subtitles(
        &self,
        locator: &str,
        language: &str,
        destination: &Path,
    ) -> Result<Option<PathBuf>, FetchError> {
        // yt-dlp names subtitle files `<template stem>.<lang>.vtt`
        let stem = destination.with_extension("");
        let template = format!("{}.%(ext)s", stem.to_string_lossy());

        run_tool(&self.program, &self.subtitle_args(locator, language, &template), self.timeout).await?;

        let Some(written) = find_written_subtitle(&stem, language)? else {
            debug!("No '{}' subtitles available for {}", language, locator);
            return Ok(None);
        };

        fs::rename(&written, destination)
            .map_err(|e| FetchError::Fetch(format!("Failed to move {:?} to {:?}: {}", written, destination, e)))?;

        Ok(Some(destination.to_path_buf()))
    }
}

/// yt-dlp reports sections past the end of a video as a download error
fn classify_download_error(error: ToolError) -> FetchError {
    match &error {
        ToolError::Failed { stderr, .. }
            if stderr.contains("--download-sections") || stderr.contains("No sections to download") =>
        {
            FetchError::Range(stderr.clone())
        }
        _ => FetchError::Tool(error),
    }
}

/// Locate the subtitle file yt-dlp wrote next to `stem`, preferring the exact language tag
fn find_written_subtitle(stem: &Path, language: &str) -> Result<Option<PathBuf>, FetchError> {
    let exact = PathBuf::from(format!("{}.{}.vtt", stem.to_string_lossy(), language));
    if exact.exists() {
        return Ok(Some(exact));
    }

    // Auto captions can come back with a regional tag such as `en-US`
    let Some(dir) = stem.parent() else {
        return Ok(None);
    };
    let prefix = format!(
        "{}.",
        stem.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
    );
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };

    let entries = fs::read_dir(dir).map_err(|e| FetchError::Fetch(format!("Failed to read {:?}: {}", dir, e)))?;
    let found = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .find(|path| {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            name.starts_with(&prefix) && name.ends_with(".vtt")
        });

    Ok(found)
}

/// Embedded subtitle stream as reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedSubtitle {
    /// Stream index within the container
    pub index: usize,
    pub codec_name: String,
    pub language: Option<String>,
    pub title: Option<String>,
}

impl EmbeddedSubtitle {
    /// Bitmap tracks (PGS, VobSub) cannot be converted to text
    pub fn is_bitmap(&self) -> bool {
        matches!(
            self.codec_name.as_str(),
            "hdmv_pgs_subtitle" | "dvd_subtitle" | "dvb_subtitle" | "xsub"
        )
    }
}

/// Cuts ranges out of local video files with ffmpeg
#[derive(Debug, Clone)]
pub struct LocalFileFetcher {
    ffmpeg: String,
    ffprobe: String,
    ffmpeg_timeout: Duration,
    ffprobe_timeout: Duration,
}

impl LocalFileFetcher {
    pub fn new(
        ffmpeg: impl Into<String>,
        ffprobe: impl Into<String>,
        ffmpeg_timeout: Duration,
        ffprobe_timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            ffmpeg_timeout,
            ffprobe_timeout,
        }
    }

    /// Container duration in seconds
    pub async fn probe_duration(&self, path: &Path) -> Result<f64, FetchError> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = run_tool(&self.ffprobe, &args, self.ffprobe_timeout).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        stdout
            .trim()
            .parse::<f64>()
            .map_err(|_| FetchError::Fetch(format!("Could not read duration of {:?}: '{}'", path, stdout.trim())))
    }

    /// List the subtitle streams embedded in `path`
    pub async fn list_subtitle_tracks(&self, path: &Path) -> Result<Vec<EmbeddedSubtitle>, FetchError> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_streams".to_string(),
            "-select_streams".to_string(),
            "s".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = run_tool(&self.ffprobe, &args, self.ffprobe_timeout).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        parse_ffprobe_streams(&stdout)
    }

    /// Time of the last video keyframe at or before `at`, where a stream copy cut begins.
    ///
    /// `None` when the file has no video stream or no keyframe was reported.
    pub async fn probe_keyframe_before(&self, path: &Path, at: f64) -> Result<Option<f64>, FetchError> {
        let from = (at - KEYFRAME_SEARCH_SECS).max(0.0);
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-skip_frame".to_string(),
            "nokey".to_string(),
            "-show_entries".to_string(),
            "frame=pts_time".to_string(),
            "-of".to_string(),
            "csv=p=0".to_string(),
            "-read_intervals".to_string(),
            format!("{:.3}%{:.3}", from, at + 0.001),
            path.to_string_lossy().to_string(),
        ];
        let output = run_tool(&self.ffprobe, &args, self.ffprobe_timeout).await?;

        Ok(last_keyframe_at_or_before(&String::from_utf8_lossy(&output.stdout), at))
    }
}

impl Default for LocalFileFetcher {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe", Duration::from_secs(600), Duration::from_secs(60))
    }
}

#[async_trait]
impl RangeFetcher for LocalFileFetcher {
    async fn fetch(&self, locator: &str, range: &TimeRange, destination: &Path) -> Result<FetchedVideo, FetchError> {
        let source = Path::new(locator);
        if !source.is_file() {
            return Err(FetchError::Fetch(format!("Video file not found: {:?}", source)));
        }

        let duration = self.probe_duration(source).await?;
        if range.start() >= duration {
            return Err(FetchError::Range(format!(
                "range {} starts after the end of the video ({:.3}s)",
                range, duration
            )));
        }
        if range.end() > duration {
            warn!("Range {} extends past the end of the video ({:.3}s); clip will be shorter", range, duration);
        }

        // Input seeking with stream copy starts at the keyframe at or before `start`
        let start = match self.probe_keyframe_before(source, range.start()).await? {
            Some(keyframe) => keyframe,
            None => {
                debug!("No keyframe reported before {:.3}s in {:?}", range.start(), source);
                range.start()
            }
        };
        if start < range.start() {
            info!(
                "Cutting {} out of {:?} from the keyframe at {:.3}s",
                range, source, start
            );
        } else {
            info!("Cutting {} out of {:?}", range, source);
        }

        let args = vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", range.start()),
            "-i".to_string(),
            source.to_string_lossy().to_string(),
            "-t".to_string(),
            format!("{:.3}", range.duration()),
            "-map".to_string(),
            "0:v?".to_string(),
            "-map".to_string(),
            "0:a?".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-avoid_negative_ts".to_string(),
            "make_zero".to_string(),
            destination.to_string_lossy().to_string(),
        ];
        run_tool(&self.ffmpeg, &args, self.ffmpeg_timeout).await?;

        if !destination.exists() {
            return Err(FetchError::Fetch(format!("ffmpeg wrote no file at {:?}", destination)));
        }

        Ok(FetchedVideo {
            path: destination.to_path_buf(),
            start,
        })
    }

    async fn fetch_subtitles(
        &self,
        locator: &str,
        language: &str,
        destination: &Path,
    ) -> Result<Option<PathBuf>, FetchError> {
        let source = Path::new(locator);
        let tracks = self.list_subtitle_tracks(source).await?;

        let Some(track) = select_subtitle_track(&tracks, language) else {
            debug!("No text subtitle track in '{}' inside {:?}", language, source);
            return Ok(None);
        };

        info!("Extracting subtitle track {} ({}) from {:?}", track.index, track.codec_name, source);
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            source.to_string_lossy().to_string(),
            "-map".to_string(),
            format!("0:{}", track.index),
            "-c:s".to_string(),
            "srt".to_string(),
            destination.to_string_lossy().to_string(),
        ];
        run_tool(&self.ffmpeg, &args, self.ffmpeg_timeout).await?;

        let written = fs::metadata(destination).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            warn!("Subtitle track {} extracted to an empty file", track.index);
            return Ok(None);
        }

        Ok(Some(destination.to_path_buf()))
    }

    fn subtitle_extension(&self) -> &'static str {
        "srt"
    }
}

/// Parse `ffprobe -show_streams` JSON into subtitle stream descriptions
pub fn parse_ffprobe_streams(json: &str) -> Result<Vec<EmbeddedSubtitle>, FetchError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value =
        from_str(json).map_err(|e| FetchError::Fetch(format!("Failed to parse ffprobe output: {}", e)))?;

    let Some(streams) = value.get("streams").and_then(|s| s.as_array()) else {
        return Ok(Vec::new());
    };

    let tag = |stream: &Value, name: &str| {
        stream
            .get("tags")
            .and_then(|t| t.get(name))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    Ok(streams
        .iter()
        .map(|stream| EmbeddedSubtitle {
            index: stream.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
            codec_name: stream
                .get("codec_name")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            language: tag(stream, "language"),
            title: tag(stream, "title"),
        })
        .collect())
}

/// Latest `frame=pts_time` line of ffprobe csv output that is not after `at`
pub fn last_keyframe_at_or_before(csv: &str, at: f64) -> Option<f64> {
    csv.lines()
        .filter_map(|line| line.trim().trim_end_matches(',').parse::<f64>().ok())
        .filter(|t| t.is_finite() && *t >= 0.0 && *t <= at + 0.001)
        .fold(None, |latest: Option<f64>, t| Some(latest.map_or(t, |l| l.max(t))))
        .map(|t| t.min(at))
}

/// First text track whose language tag matches `language`
pub fn select_subtitle_track<'a>(tracks: &'a [EmbeddedSubtitle], language: &str) -> Option<&'a EmbeddedSubtitle> {
    tracks.iter().filter(|t| !t.is_bitmap()).find(|t| {
        t.language
            .as_deref()
            .is_some_and(|tag| language_utils::language_codes_match(tag, language))
    })
}
