/*!
 * Adapters for the external algorithmic collaborators
 *
 * The orchestrator never computes masks, skeletons, centerlines, migration
 * rates or bars itself. Each of those lives behind one typed method of
 * [`StageAdapters`]; the production binding runs an external executable per
 * stage, located on PATH at invocation time. Collaborators own all file
 * naming beneath the output directory they are handed.
 */

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::{Configuration, TOOLS_SECTION};
use crate::error::{MeanderError, Result};

/// Segmentation-stage parameters resolved by the sequencer
#[derive(Debug, Clone, Default)]
pub struct SegmentationParams {
    /// Label-selection mode (`auto`, `all`, or a numeric label)
    pub label: Option<String>,
}

/// Skeletonization-stage parameters
#[derive(Debug, Clone)]
pub struct SkeletonParams {
    /// Whether outputs are georeferenced through the geotransform directory
    pub georeference: bool,
}

/// Migration-stage parameters, already defaulted by the sequencer
#[derive(Debug, Clone)]
pub struct MigrationParams {
    /// Zero-based x/y column indices in the centerline files
    pub columns: (usize, usize),
    /// Point-interpolation frequency along the centerline
    pub pfreq: usize,
    /// Display results interactively
    pub show: bool,
}

/// Bar-detection parameters
#[derive(Debug, Clone, Default)]
pub struct BarsParams {
    pub show: bool,
}

/// Typed call signatures into the five algorithmic collaborators plus the
/// mask-cleaning step. One method per pipeline stage the orchestrator does
/// not implement itself.
pub trait StageAdapters {
    /// Segment channel masks out of the acquisitions under `input`
    fn segment(
        &self,
        input: &Path,
        geo_dir: &Path,
        mask_dir: &Path,
        cfg: &Configuration,
        params: &SegmentationParams,
    ) -> Result<()>;

    /// Clean previously segmented masks in place
    fn clean_masks(&self, mask_dir: &Path, cfg: &Configuration) -> Result<()>;

    /// Reduce masks to one-pixel-wide skeletons
    fn skeletonize(
        &self,
        mask_dir: &Path,
        skeleton_dir: &Path,
        cfg: &Configuration,
        params: &SkeletonParams,
    ) -> Result<()>;

    /// Vectorize skeletons into ordered centerline files
    fn extract_axes(
        &self,
        skeleton_dir: &Path,
        axis_dir: &Path,
        geo_dir: Option<&Path>,
        cfg: &Configuration,
    ) -> Result<()>;

    /// Compute migration rates between time-ordered centerlines
    fn compute_migration(
        &self,
        axis_files: &[PathBuf],
        output_dir: &Path,
        params: &MigrationParams,
    ) -> Result<()>;

    /// Detect depositional bars from the migration history
    fn detect_bars(
        &self,
        migration_dir: &Path,
        bars_dir: &Path,
        cfg: &Configuration,
        params: &BarsParams,
    ) -> Result<()>;
}

const DEFAULT_TOOLS: [(&str, &str); 6] = [
    ("segmentation", "meander-segment"),
    ("clean", "meander-clean"),
    ("skeletonization", "meander-skeleton"),
    ("axis", "meander-axis"),
    ("migration", "meander-migration"),
    ("bars", "meander-bars"),
];

/// Production binding: one external executable per stage, overridable
/// through the `Tools` configuration section
pub struct ProcessAdapters {
    tools: Vec<(String, String)>,
    config_path: Option<PathBuf>,
}

impl ProcessAdapters {
    pub fn new(cfg: Option<&Configuration>, config_path: Option<&Path>) -> Self {
        let tools = DEFAULT_TOOLS
            .iter()
            .map(|&(key, default)| {
                let name = cfg
                    .and_then(|c| c.get(TOOLS_SECTION, key))
                    .unwrap_or(default);
                (key.to_string(), name.to_string())
            })
            .collect();
        Self {
            tools,
            config_path: config_path.map(Path::to_path_buf),
        }
    }

    /// The executable configured for a stage key
    pub fn tool(&self, key: &str) -> &str {
        self.tools
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, name)| name.as_str())
            .unwrap_or("")
    }

    fn command(&self, key: &str) -> Result<Command> {
        let program = locate_on_path(self.tool(key))?;
        let mut cmd = Command::new(program);
        if let Some(path) = &self.config_path {
            cmd.arg("--config").arg(path);
        }
        Ok(cmd)
    }

    fn run(stage: &str, cmd: &mut Command) -> Result<()> {
        debug!(stage, command = ?cmd, "invoking stage tool");
        let output = cmd.output().map_err(|e| MeanderError::StageFailed {
            stage: stage.to_string(),
            detail: e.to_string(),
        })?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(MeanderError::StageFailed {
                stage: stage.to_string(),
                detail: format!("exited with {}: {}", output.status, stderr.trim()),
            })
        }
    }
}

impl StageAdapters for ProcessAdapters {
    fn segment(
        &self,
        input: &Path,
        geo_dir: &Path,
        mask_dir: &Path,
        _cfg: &Configuration,
        params: &SegmentationParams,
    ) -> Result<()> {
        let mut cmd = self.command("segmentation")?;
        cmd.arg("--input").arg(input);
        cmd.arg("--geo-dir").arg(geo_dir);
        cmd.arg("--output").arg(mask_dir);
        if let Some(label) = &params.label {
            cmd.arg("--label").arg(label);
        }
        Self::run("segmentation", &mut cmd)
    }

    fn clean_masks(&self, mask_dir: &Path, _cfg: &Configuration) -> Result<()> {
        let mut cmd = self.command("clean")?;
        cmd.arg("--mask-dir").arg(mask_dir);
        Self::run("mask-cleaning", &mut cmd)
    }

    fn skeletonize(
        &self,
        mask_dir: &Path,
        skeleton_dir: &Path,
        _cfg: &Configuration,
        params: &SkeletonParams,
    ) -> Result<()> {
        let mut cmd = self.command("skeletonization")?;
        cmd.arg("--mask-dir").arg(mask_dir);
        cmd.arg("--output").arg(skeleton_dir);
        if !params.georeference {
            cmd.arg("--no-geo");
        }
        Self::run("skeletonization", &mut cmd)
    }

    fn extract_axes(
        &self,
        skeleton_dir: &Path,
        axis_dir: &Path,
        geo_dir: Option<&Path>,
        _cfg: &Configuration,
    ) -> Result<()> {
        let mut cmd = self.command("axis")?;
        cmd.arg("--input").arg(skeleton_dir);
        cmd.arg("--output").arg(axis_dir);
        if let Some(geo) = geo_dir {
            cmd.arg("--geo-dir").arg(geo);
        }
        Self::run("axis-extraction", &mut cmd)
    }

    fn compute_migration(
        &self,
        axis_files: &[PathBuf],
        output_dir: &Path,
        params: &MigrationParams,
    ) -> Result<()> {
        let mut cmd = self.command("migration")?;
        cmd.arg("--output").arg(output_dir);
        cmd.arg("--columns");
        cmd.arg(params.columns.0.to_string());
        cmd.arg(params.columns.1.to_string());
        cmd.arg("--pfreq").arg(params.pfreq.to_string());
        if params.show {
            cmd.arg("--show");
        }
        cmd.args(axis_files);
        Self::run("migration", &mut cmd)
    }

    fn detect_bars(
        &self,
        migration_dir: &Path,
        bars_dir: &Path,
        _cfg: &Configuration,
        params: &BarsParams,
    ) -> Result<()> {
        let mut cmd = self.command("bars")?;
        cmd.arg("--input").arg(migration_dir);
        cmd.arg("--output").arg(bars_dir);
        if params.show {
            cmd.arg("--show");
        }
        Self::run("bars", &mut cmd)
    }
}

/// Resolve a stage executable. Names with a path separator are used as
/// given; bare names are searched on the process PATH.
fn locate_on_path(program: &str) -> Result<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }
        return Err(MeanderError::MissingTool {
            tool: program.to_string(),
        });
    }
    let path = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path) {
        let full = dir.join(program);
        if full.is_file() {
            return Ok(full);
        }
    }
    Err(MeanderError::MissingTool {
        tool: program.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_tool_names() {
        let adapters = ProcessAdapters::new(None, None);
        assert_eq!(adapters.tool("segmentation"), "meander-segment");
        assert_eq!(adapters.tool("bars"), "meander-bars");
    }

    #[test]
    fn test_tools_section_overrides_names() {
        let mut cfg = Configuration::defaults();
        cfg.set(TOOLS_SECTION, "segmentation", "/opt/river/segment");
        let adapters = ProcessAdapters::new(Some(&cfg), None);
        assert_eq!(adapters.tool("segmentation"), "/opt/river/segment");
        assert_eq!(adapters.tool("axis"), "meander-axis");
    }

    #[test]
    fn test_locate_missing_tool() {
        let err = locate_on_path("meander-definitely-not-installed").unwrap_err();
        match err {
            MeanderError::MissingTool { tool } => {
                assert_eq!(tool, "meander-definitely-not-installed")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_locate_explicit_path() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("segment");
        std::fs::write(&exe, b"#!/bin/sh\n").unwrap();
        assert_eq!(locate_on_path(exe.to_str().unwrap()).unwrap(), exe);

        let missing = dir.path().join("absent");
        assert!(locate_on_path(missing.to_str().unwrap()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_stage_tool_surfaces_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let exe = dir.path().join("clean");
        std::fs::write(&exe, "#!/bin/sh\necho 'no masks found' >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut cfg = Configuration::defaults();
        cfg.set(TOOLS_SECTION, "clean", exe.to_str().unwrap());
        let adapters = ProcessAdapters::new(Some(&cfg), None);

        let err = adapters
            .clean_masks(dir.path(), &cfg)
            .unwrap_err();
        match err {
            MeanderError::StageFailed { stage, detail } => {
                assert_eq!(stage, "mask-cleaning");
                assert!(detail.contains("no masks found"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_stage_tool() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let exe = dir.path().join("clean");
        std::fs::write(&exe, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut cfg = Configuration::defaults();
        cfg.set(TOOLS_SECTION, "clean", exe.to_str().unwrap());
        let adapters = ProcessAdapters::new(Some(&cfg), None);
        adapters.clean_masks(dir.path(), &cfg).unwrap();
    }
}
