/*!
 * Canonical on-disk layout of pipeline stage outputs
 *
 * Every stage writes under a fixed subdirectory of the configured output
 * root. Directories are created lazily, right before the stage that needs
 * them, and are never deleted or cleared: a re-run must be able to resume
 * or overwrite individual files without losing unrelated prior outputs.
 */

use std::path::{Path, PathBuf};

use crate::error::Result;

/// The six stage output directories under the output root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageDir {
    Geotransform,
    Mask,
    Skeleton,
    Axis,
    Migration,
    Bars,
}

impl StageDir {
    /// Fixed, non-configurable subdirectory name
    pub fn subdir(&self) -> &'static str {
        match self {
            StageDir::Geotransform => "geotransf",
            StageDir::Mask => "mask",
            StageDir::Skeleton => "skeleton",
            StageDir::Axis => "axis",
            StageDir::Migration => "migration",
            StageDir::Bars => "bars",
        }
    }

    /// All six directories, in pipeline order
    pub fn all() -> [StageDir; 6] {
        [
            StageDir::Geotransform,
            StageDir::Mask,
            StageDir::Skeleton,
            StageDir::Axis,
            StageDir::Migration,
            StageDir::Bars,
        ]
    }
}

/// Derived directory layout rooted at `Data.output`
#[derive(Debug, Clone)]
pub struct StagePaths {
    root: PathBuf,
}

impl StagePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory for a stage, without touching the filesystem
    pub fn dir(&self, which: StageDir) -> PathBuf {
        self.root.join(which.subdir())
    }

    /// Create the directory for a stage (parents included) if absent and
    /// return its absolute path. Idempotent; a concurrent creation by
    /// another process counts as success.
    pub fn ensure(&self, which: StageDir) -> Result<PathBuf> {
        let dir = self.dir(which);
        std::fs::create_dir_all(&dir)?;
        Ok(std::path::absolute(&dir)?)
    }
}

/// Whether a directory exists and holds at least one entry
pub fn dir_is_populated(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_some(),
        Err(_) => false,
    }
}
