use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::info;

use crate::encoding::SubtitleEncoding;
use crate::errors::AlignError;

use super::SubtitleAligner;
use super::process::run_tool;

/// Aligns subtitles to a video's audio track with ffsubsync
#[derive(Debug, Clone)]
pub struct FfsubsyncAligner {
    program: String,
    timeout: Duration,
}

impl FfsubsyncAligner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn args(video: &Path, subtitles: &Path, encoding: SubtitleEncoding, destination: &Path) -> Vec<String> {
        vec![
            video.to_string_lossy().to_string(),
            "-i".to_string(),
            subtitles.to_string_lossy().to_string(),
            "-o".to_string(),
            destination.to_string_lossy().to_string(),
            "--encoding".to_string(),
            encoding.label().to_string(),
        ]
    }
}

impl Default for FfsubsyncAligner {
    fn default() -> Self {
        Self::new("ffsubsync", Duration::from_secs(900))
    }
}

#[async_trait]
impl SubtitleAligner for FfsubsyncAligner {
    async fn align(
        &self,
        video: &Path,
        subtitles: &Path,
        encoding: SubtitleEncoding,
        destination: &Path,
    ) -> Result<PathBuf, AlignError> {
        info!("Aligning {:?} against {:?}", subtitles, video);

        run_tool(&self.program, &Self::args(video, subtitles, encoding, destination), self.timeout).await?;

        // ffsubsync can exit cleanly without writing when it finds no speech
        match std::fs::metadata(destination) {
            Ok(meta) if meta.len() > 0 => Ok(destination.to_path_buf()),
            _ => Err(AlignError::AlignmentFailed(format!(
                "{} produced no output at {:?}",
                self.program, destination
            ))),
        }
    }
}
