use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::info;

use crate::errors::RenderError;

use super::process::run_tool;
use super::{RenderSettings, Renderer};

/// Transcodes with ffmpeg, burning subtitles in through the libass `subtitles` filter
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    program: String,
    timeout: Duration,
}

impl FfmpegRenderer {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub(crate) fn args(
        video: &Path,
        subtitles: Option<&Path>,
        settings: &RenderSettings,
        output: &Path,
    ) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-i".to_string(), video.to_string_lossy().to_string()];

        if let Some(subs) = subtitles {
            args.push("-vf".to_string());
            args.push(format!("subtitles={}", escape_filter_path(subs)));
        }
        if let Some(fps) = settings.frame_rate {
            args.push("-r".to_string());
            args.push(fps.to_string());
        }
        if let Some(bitrate) = &settings.video_bitrate {
            args.push("-b:v".to_string());
            args.push(bitrate.clone());
        }
        if let Some(bitrate) = &settings.audio_bitrate {
            args.push("-b:a".to_string());
            args.push(bitrate.clone());
        }

        args.push(output.to_string_lossy().to_string());
        args
    }
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new("ffmpeg", Duration::from_secs(3600))
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(
        &self,
        video: &Path,
        subtitles: Option<&Path>,
        settings: &RenderSettings,
        output: &Path,
    ) -> Result<(), RenderError> {
        match subtitles {
            Some(subs) => info!("Rendering {:?} with subtitles from {:?}", video, subs),
            None => info!("Rendering {:?} without subtitles", video),
        }

        run_tool(&self.program, &Self::args(video, subtitles, settings, output), self.timeout).await?;

        match std::fs::metadata(output) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(RenderError::MissingOutput(output.to_path_buf())),
        }
    }
}

/// Escape a path for use as a filter argument inside an ffmpeg filtergraph.
///
/// Two levels apply: the filter's own option parser (`\`, `'`, `:`), then the
/// filtergraph parser (`\`, `'`, `[`, `]`, `,`, `;`).
pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy();

    let mut option_level = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }

    let mut graph_level = String::with_capacity(option_level.len());
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }

    graph_level
}
