use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

// @module: File, path and locator utilities

/// Default output file of the clip command
pub const DEFAULT_CLIP_OUTPUT: &str = "output.mp4";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @generates: `<stem>_subtitled.mp4` beside the input video
    pub fn burn_output_path<P: AsRef<Path>>(video: P) -> PathBuf {
        let video = video.as_ref();
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());

        video.with_file_name(format!("{}_subtitled.mp4", stem))
    }

    /// Whether two paths name the same file, resolving them when they exist
    pub fn same_file<P1: AsRef<Path>, P2: AsRef<Path>>(a: P1, b: P2) -> bool {
        let (a, b) = (a.as_ref(), b.as_ref());
        match (fs::canonicalize(a), fs::canonicalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        }
    }
}

/// Where a source video lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// Anything yt-dlp can download
    Remote(Url),
    /// A file on disk
    Local(PathBuf),
}

impl SourceLocator {
    /// Existing paths win; otherwise anything with a URL scheme is remote.
    ///
    /// Single-letter schemes are Windows drive letters, not URLs.
    pub fn classify(locator: &str) -> Self {
        let path = Path::new(locator);
        if path.exists() {
            return Self::Local(path.to_path_buf());
        }

        match Url::parse(locator) {
            Ok(url) if url.scheme().len() > 1 => Self::Remote(url),
            _ => Self::Local(path.to_path_buf()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}
