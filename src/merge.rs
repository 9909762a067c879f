/*!
 * Band-merge engine for Landsat acquisition cohorts
 *
 * Merges the band files of several acquisitions covering one area/time
 * cohort into a single per-band raster, by driving an external merge tool
 * (gdal_merge) once per band. Band 6 carries a sensor-specific filename
 * fallback: some products ship the thermal band as `<name>_B6_VCID_1.TIF`
 * instead of `<name>_B6.TIF`.
 */

use std::path::{Path, PathBuf};
use std::process::Command;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::error::{MeanderError, Result};

/// Landsat band indices merged per cohort
pub const BAND_RANGE: std::ops::RangeInclusive<u8> = 1..=7;

/// The thermal band with the VCID filename variant
pub const THERMAL_BAND: u8 = 6;

/// One satellite pass's folder of band files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandsatAcquisition {
    path: PathBuf,
    name: String,
}

impl LandsatAcquisition {
    /// Wrap a source acquisition folder
    pub fn from_dir(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(MeanderError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("acquisition folder not found: {}", path.display()),
            )));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MeanderError::Config(format!(
                    "acquisition folder name is not valid UTF-8: {}",
                    path.display()
                ))
            })?
            .to_string();
        Ok(Self {
            path: path.to_path_buf(),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the on-disk file for a band. The primary pattern is
    /// `<name>_B<n>.TIF`; only band 6 falls back to the VCID variant when
    /// the primary file is absent.
    pub fn band_file(&self, band: u8) -> Result<PathBuf> {
        let primary = self.path.join(format!("{}_B{}.TIF", self.name, band));
        if primary.is_file() {
            return Ok(primary);
        }
        let mut attempted = vec![primary];
        if band == THERMAL_BAND {
            let vcid = self.path.join(format!("{}_B{}_VCID_1.TIF", self.name, band));
            if vcid.is_file() {
                return Ok(vcid);
            }
            attempted.push(vcid);
        }
        Err(MeanderError::MissingBandFile {
            acquisition: self.name.clone(),
            band,
            attempted,
        })
    }
}

/// The external per-band merge tool
pub trait MergeTool {
    /// Merge `sources` into `dest`. `Err` carries the tool's diagnostic
    /// output verbatim.
    fn run(&self, sources: &[PathBuf], dest: &Path) -> std::result::Result<(), String>;
}

/// gdal_merge discovered on PATH
#[derive(Debug, Clone)]
pub struct GdalMerge {
    program: PathBuf,
}

impl GdalMerge {
    /// Executable names probed, in preference order
    pub const CANDIDATES: [&'static str; 2] = ["gdal_merge.py", "gdal_merge"];

    /// Locate the merge tool on the process PATH. This is a separate,
    /// explicit discovery step so a missing GDAL install fails before any
    /// stage runs.
    pub fn locate() -> Result<Self> {
        let path = std::env::var_os("PATH").unwrap_or_default();
        Self::locate_in(std::env::split_paths(&path))
    }

    /// Locate the merge tool in an explicit list of directories
    pub fn locate_in(dirs: impl IntoIterator<Item = PathBuf>) -> Result<Self> {
        let dirs: Vec<PathBuf> = dirs.into_iter().collect();
        for candidate in Self::CANDIDATES {
            for dir in &dirs {
                let program = dir.join(candidate);
                if program.is_file() {
                    debug!(program = %program.display(), "located merge tool");
                    return Ok(Self { program });
                }
            }
        }
        Err(MeanderError::MissingTool {
            tool: Self::CANDIDATES.join(" or "),
        })
    }

    /// Use an explicit executable, bypassing PATH discovery
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl MergeTool for GdalMerge {
    fn run(&self, sources: &[PathBuf], dest: &Path) -> std::result::Result<(), String> {
        let output = Command::new(&self.program)
            .arg("-o")
            .arg(dest)
            .args(["-n", "0"])
            .args(sources)
            .output()
            .map_err(|e| format!("cannot run {}: {}", self.program.display(), e))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            ))
        }
    }
}

/// A completed merge: the cohort, its destination directory, and the
/// per-band rasters written there
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub cohort: Vec<String>,
    pub dest_dir: PathBuf,
    pub outputs: Vec<PathBuf>,
}

/// Assembles per-band merged rasters from a cohort of acquisitions
pub struct BandMergeEngine<'a> {
    tool: &'a dyn MergeTool,
    show_progress: bool,
}

impl<'a> BandMergeEngine<'a> {
    pub fn new(tool: &'a dyn MergeTool) -> Self {
        Self {
            tool,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Merge every band of the cohort into
    /// `<dest_root>/<first>/<first>_B<n>.TIF`. Bands are processed in
    /// increasing numeric order; a tool failure aborts the job and leaves
    /// already-merged bands on disk.
    pub fn merge(
        &self,
        acquisitions: &[LandsatAcquisition],
        dest_root: &Path,
    ) -> Result<MergeJob> {
        let first = acquisitions.first().ok_or_else(|| {
            MeanderError::Config("merge requested with no acquisition folders".to_string())
        })?;

        if let Some(parent) = first.path().parent() {
            if same_path(parent, dest_root) {
                return Err(MeanderError::InvalidOutputPath {
                    dest: dest_root.to_path_buf(),
                    source_parent: parent.to_path_buf(),
                });
            }
        }

        let dest_dir = dest_root.join(first.name());
        std::fs::create_dir_all(&dest_dir)?;

        let progress = if self.show_progress {
            let pb = ProgressBar::new(BAND_RANGE.count() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] band {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut outputs = Vec::new();
        for band in BAND_RANGE {
            let sources = acquisitions
                .iter()
                .map(|a| a.band_file(band))
                .collect::<Result<Vec<_>>>()?;
            let dest = dest_dir.join(format!("{}_B{}.TIF", first.name(), band));

            info!(band, dest = %dest.display(), "merging band");
            self.tool
                .run(&sources, &dest)
                .map_err(|detail| MeanderError::MergeTool { band, detail })?;

            outputs.push(dest);
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        Ok(MergeJob {
            cohort: acquisitions.iter().map(|a| a.name().to_string()).collect(),
            dest_dir,
            outputs,
        })
    }
}

/// Path identity that tolerates a not-yet-created side
fn same_path(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => std::path::absolute(a).ok() == std::path::absolute(b).ok(),
    }
}
