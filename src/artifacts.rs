/*!
 * Per-run ledger of intermediate files.
 *
 * Every file a pipeline run creates is recorded here with its role before the
 * step that writes it runs, so a step that fails halfway is still cleaned up.
 * Names embed a per-run UUID, which keeps concurrent runs from touching each
 * other's files. Cleanup also sweeps every file carrying the run's prefix, so
 * siblings an external tool derives from a recorded path (`.part`, `.ytdl`,
 * per-language subtitle files) go with it.
 */

use std::fmt;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use uuid::Uuid;

/// What an intermediate file is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    /// Raw video returned by the range fetcher
    SourceVideo,
    /// Subtitle track downloaded or extracted for the requested language
    FetchedSubtitles,
    /// Source-timed track shifted onto the clip window
    RebasedSubtitles,
    /// Output of the subtitle aligner
    AlignedSubtitles,
    /// Overlap-free ASS track handed to the renderer
    NormalizedSubtitles,
    /// Render in progress, renamed onto the output path on success
    StagedOutput,
}

impl ArtifactRole {
    /// Short tag used in file names
    pub fn slug(&self) -> &'static str {
        match self {
            Self::SourceVideo => "source",
            Self::FetchedSubtitles => "subs",
            Self::RebasedSubtitles => "rebased",
            Self::AlignedSubtitles => "aligned",
            Self::NormalizedSubtitles => "normalized",
            Self::StagedOutput => "render",
        }
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// One recorded intermediate file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub role: ArtifactRole,
    pub path: PathBuf,
}

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files deleted
    pub removed: usize,
    /// Recorded files that were never created
    pub missing: usize,
    /// Files that could not be deleted
    pub failed: usize,
    /// Untracked files removed because they carry the run prefix
    pub swept: usize,
}

/// Artifacts created by a single pipeline run
#[derive(Debug)]
pub struct ArtifactLedger {
    run_id: String,
    work_dir: PathBuf,
    stem: String,
    artifacts: Vec<Artifact>,
    /// Directories artifacts were allocated in, swept on cleanup
    dirs: BTreeSet<PathBuf>,
    /// Paths handed over to the caller, never swept
    released: Vec<PathBuf>,
}

impl ArtifactLedger {
    /// Start a ledger for a run producing `output`, keeping intermediates in `work_dir`
    pub fn new(work_dir: impl Into<PathBuf>, output: &Path) -> Self {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "clip".to_string());

        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            work_dir: work_dir.into(),
            stem,
            artifacts: Vec::new(),
            dirs: BTreeSet::new(),
            released: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Recorded artifacts, in creation order
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Name prefix shared by every artifact of this run
    pub fn file_prefix(&self) -> String {
        format!(".{}.{}", self.stem, self.run_id)
    }

    /// Record and return a fresh path in the work directory
    pub fn allocate(&mut self, role: ArtifactRole, extension: &str) -> PathBuf {
        let dir = self.work_dir.clone();
        self.allocate_in(&dir, role, extension)
    }

    /// Record and return a fresh path in `dir`, for files that must share a
    /// filesystem with their final destination
    pub fn allocate_in(&mut self, dir: &Path, role: ArtifactRole, extension: &str) -> PathBuf {
        let path = dir.join(format!("{}.{}.{}", self.file_prefix(), role.slug(), extension));
        self.dirs.insert(dir.to_path_buf());
        self.track(role, path.clone());
        path
    }

    /// Record a path chosen elsewhere, e.g. by an external tool
    pub fn track(&mut self, role: ArtifactRole, path: PathBuf) {
        if !self.artifacts.iter().any(|a| a.path == path) {
            debug!("Tracking {} artifact {:?}", role, path);
            self.artifacts.push(Artifact { role, path });
        }
    }

    /// Stop tracking a path, e.g. once it has become the final output
    pub fn release(&mut self, path: &Path) -> Option<Artifact> {
        let idx = self.artifacts.iter().position(|a| a.path == path)?;
        self.released.push(path.to_path_buf());
        Some(self.artifacts.remove(idx))
    }

    /// Delete every recorded artifact, then any other file in an allocation
    /// directory whose name starts with the run prefix. Failures are logged
    /// and otherwise ignored.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for artifact in self.artifacts.drain(..) {
            match fs::remove_file(&artifact.path) {
                Ok(()) => {
                    debug!("Removed {} artifact {:?}", artifact.role, artifact.path);
                    report.removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => report.missing += 1,
                Err(e) => {
                    debug!("Could not remove {} artifact {:?}: {}", artifact.role, artifact.path, e);
                    report.failed += 1;
                }
            }
        }

        let prefix = self.file_prefix();
        for dir in std::mem::take(&mut self.dirs) {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for path in entries.filter_map(|entry| entry.ok().map(|e| e.path())) {
                let owned = path
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with(&prefix));
                if !owned || self.released.contains(&path) || !path.is_file() {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => {
                        debug!("Swept untracked file {:?}", path);
                        report.swept += 1;
                    }
                    Err(e) => {
                        debug!("Could not sweep {:?}: {}", path, e);
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }
}

impl Drop for ArtifactLedger {
    fn drop(&mut self) {
        if !self.artifacts.is_empty() || !self.dirs.is_empty() {
            self.cleanup();
        }
    }
}
