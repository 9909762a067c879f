/*!
 * Axis input-source resolution for the migration stage
 *
 * A migration run reads its ordered centerline files from exactly one of
 * three origins: the pipeline's own axis directory, an explicit file list,
 * or an explicit directory. The resolver picks one origin per run and
 * refuses ambiguous combinations instead of guessing.
 */

use std::path::{Path, PathBuf};

use glob::glob;

use crate::error::{MeanderError, Result};

/// Exactly one origin of ordered centerline files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisSource {
    /// The axis-stage output directory derived from the configuration
    FromPipeline(PathBuf),
    /// Explicit file paths, caller order preserved (typically chronological)
    FromFileList(Vec<PathBuf>),
    /// An explicit directory, files ordered lexicographically by name
    FromDirectory(PathBuf),
}

impl AxisSource {
    /// Materialize the ordered centerline file list
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        match self {
            AxisSource::FromFileList(files) => Ok(files.clone()),
            AxisSource::FromDirectory(dir) | AxisSource::FromPipeline(dir) => {
                list_files_sorted(dir)
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AxisSource::FromPipeline(dir) => format!("pipeline axis directory {}", dir.display()),
            AxisSource::FromFileList(files) => format!("{} explicit axis files", files.len()),
            AxisSource::FromDirectory(dir) => format!("axis directory {}", dir.display()),
        }
    }
}

/// Resolve the single authoritative axis source for one migration run.
///
/// `configured` is whether a configuration file is in play for this run.
/// Precedence: explicit files and explicit directory together are
/// ambiguous; so is a configuration combined with either explicit source.
pub fn resolve(
    configured: bool,
    files: &[PathBuf],
    dir: Option<&Path>,
    pipeline_axis_dir: Option<&Path>,
) -> Result<AxisSource> {
    let has_files = !files.is_empty();
    let has_dir = dir.is_some();

    if has_files && has_dir {
        return Err(MeanderError::AmbiguousSource(
            "both --axis-files and --axis-dir were given".to_string(),
        ));
    }
    if configured && (has_files || has_dir) {
        return Err(MeanderError::AmbiguousSource(
            "a configuration file and an explicit axis source were both given".to_string(),
        ));
    }
    if has_files {
        return Ok(AxisSource::FromFileList(files.to_vec()));
    }
    if let Some(dir) = dir {
        return Ok(AxisSource::FromDirectory(dir.to_path_buf()));
    }
    if configured {
        let axis_dir = pipeline_axis_dir.ok_or_else(|| {
            MeanderError::MissingSource("configuration supplies no axis directory".to_string())
        })?;
        return Ok(AxisSource::FromPipeline(axis_dir.to_path_buf()));
    }
    Err(MeanderError::MissingSource(
        "run with a configuration file, --axis-files or --axis-dir".to_string(),
    ))
}

/// List the plain files of a directory, sorted lexicographically by name
fn list_files_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*", dir.display());
    let entries = glob(&pattern).map_err(|e| {
        MeanderError::Config(format!("invalid axis directory {}: {}", dir.display(), e))
    })?;
    let mut files: Vec<PathBuf> = entries.flatten().filter(|p| p.is_file()).collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
