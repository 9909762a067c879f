/*!
 * Fixed-order stage sequencer
 *
 * The pipeline order is a constant list; a single loop runs the requested
 * subset in that order, wiring each stage's output directory into the next
 * stage's input. Stages communicate strictly through the filesystem, so a
 * later stage checks that its upstream directory is present and non-empty
 * before invoking its adapter, and fails locally when it is not.
 */

use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::config::{Configuration, DATA_SECTION};
use crate::error::{MeanderError, Result};
use crate::layout::{dir_is_populated, StageDir, StagePaths};
use crate::merge::{BandMergeEngine, LandsatAcquisition, MergeTool};
use crate::request::{StageRequest, DEFAULT_AXIS_COLUMNS, DEFAULT_PFREQ};
use crate::sources::{self, AxisSource};
use crate::stages::{
    BarsParams, MigrationParams, SegmentationParams, SkeletonParams, StageAdapters,
};

/// The seven pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Merge,
    Segmentation,
    MaskCleaning,
    Skeletonization,
    AxisExtraction,
    Migration,
    Bars,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Merge => "merge",
            Stage::Segmentation => "segmentation",
            Stage::MaskCleaning => "mask-cleaning",
            Stage::Skeletonization => "skeletonization",
            Stage::AxisExtraction => "axis-extraction",
            Stage::Migration => "migration",
            Stage::Bars => "bars",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The fixed dependency order; requested stages always execute in this
/// sequence regardless of flag order on the command line
pub const STAGE_ORDER: [Stage; 7] = [
    Stage::Merge,
    Stage::Segmentation,
    Stage::MaskCleaning,
    Stage::Skeletonization,
    Stage::AxisExtraction,
    Stage::Migration,
    Stage::Bars,
];

fn requested(stage: Stage, req: &StageRequest) -> bool {
    match stage {
        Stage::Merge => req.merge.is_some(),
        Stage::Segmentation => req.segmentation,
        Stage::MaskCleaning => req.clean_mask,
        Stage::Skeletonization => req.skeletonization,
        Stage::AxisExtraction => req.axis_extraction,
        Stage::Migration => req.migration,
        Stage::Bars => req.bars,
    }
}

/// Top-level orchestrator over the requested stage subset
pub struct StageSequencer<'a> {
    config: Option<&'a Configuration>,
    adapters: &'a dyn StageAdapters,
    merge_tool: Option<&'a dyn MergeTool>,
    progress: bool,
}

impl<'a> StageSequencer<'a> {
    pub fn new(adapters: &'a dyn StageAdapters) -> Self {
        Self {
            config: None,
            adapters,
            merge_tool: None,
            progress: false,
        }
    }

    pub fn with_config(mut self, config: &'a Configuration) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_merge_tool(mut self, tool: &'a dyn MergeTool) -> Self {
        self.merge_tool = Some(tool);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Execute the requested stages in [`STAGE_ORDER`]. The first failing
    /// stage aborts the run; completed stages keep their outputs.
    pub fn run(&self, request: &StageRequest) -> Result<()> {
        for stage in STAGE_ORDER {
            if !requested(stage, request) {
                continue;
            }
            info!(stage = %stage, "running stage");
            self.run_stage(stage, request)?;
        }
        Ok(())
    }

    fn run_stage(&self, stage: Stage, request: &StageRequest) -> Result<()> {
        match stage {
            Stage::Merge => self.run_merge(request),
            Stage::Segmentation => self.run_segmentation(request),
            Stage::MaskCleaning => self.run_mask_cleaning(),
            Stage::Skeletonization => self.run_skeletonization(request),
            Stage::AxisExtraction => self.run_axis_extraction(request),
            Stage::Migration => self.run_migration(request),
            Stage::Bars => self.run_bars(request),
        }
    }

    fn config(&self, stage: Stage) -> Result<&Configuration> {
        self.config.ok_or_else(|| {
            MeanderError::Config(format!("stage {} requires a configuration file", stage))
        })
    }

    fn stage_paths(&self, stage: Stage) -> Result<StagePaths> {
        let root = self.config(stage)?.require_path(DATA_SECTION, "output")?;
        Ok(StagePaths::new(root))
    }

    fn check_populated(&self, stage: Stage, path: &std::path::Path) -> Result<()> {
        if dir_is_populated(path) {
            Ok(())
        } else {
            Err(MeanderError::MissingUpstreamArtifact {
                stage: stage.name().to_string(),
                path: path.to_path_buf(),
            })
        }
    }

    fn run_merge(&self, request: &StageRequest) -> Result<()> {
        let Some(merge) = &request.merge else {
            return Ok(());
        };
        let tool = self.merge_tool.ok_or_else(|| MeanderError::MissingTool {
            tool: "gdal_merge".to_string(),
        })?;
        let acquisitions = merge
            .sources
            .iter()
            .map(|p| LandsatAcquisition::from_dir(p))
            .collect::<Result<Vec<_>>>()?;
        let job = BandMergeEngine::new(tool)
            .with_progress(self.progress)
            .merge(&acquisitions, &merge.output)?;
        info!(
            cohort = ?job.cohort,
            dest = %job.dest_dir.display(),
            bands = job.outputs.len(),
            "merge complete"
        );
        Ok(())
    }

    fn run_segmentation(&self, request: &StageRequest) -> Result<()> {
        let stage = Stage::Segmentation;
        let cfg = self.config(stage)?;
        let input = cfg.require_path(DATA_SECTION, "input")?;
        self.check_populated(stage, &input)?;

        let paths = self.stage_paths(stage)?;
        let geo_dir = paths.ensure(StageDir::Geotransform)?;
        let mask_dir = paths.ensure(StageDir::Mask)?;

        let label = request
            .label
            .clone()
            .or_else(|| cfg.get("Segmentation", "label").map(String::from));
        self.adapters.segment(
            &input,
            &geo_dir,
            &mask_dir,
            cfg,
            &SegmentationParams { label },
        )
    }

    fn run_mask_cleaning(&self) -> Result<()> {
        let stage = Stage::MaskCleaning;
        let cfg = self.config(stage)?;
        let paths = self.stage_paths(stage)?;
        let mask_dir = paths.dir(StageDir::Mask);
        self.check_populated(stage, &mask_dir)?;
        self.adapters.clean_masks(&mask_dir, cfg)
    }

    fn run_skeletonization(&self, request: &StageRequest) -> Result<()> {
        let stage = Stage::Skeletonization;
        let cfg = self.config(stage)?;
        let paths = self.stage_paths(stage)?;

        let mask_dir = request
            .mask_dir
            .clone()
            .unwrap_or_else(|| paths.dir(StageDir::Mask));
        self.check_populated(stage, &mask_dir)?;

        let skeleton_dir = paths.ensure(StageDir::Skeleton)?;
        self.adapters.skeletonize(
            &mask_dir,
            &skeleton_dir,
            cfg,
            &SkeletonParams {
                georeference: request.georeference,
            },
        )
    }

    fn run_axis_extraction(&self, request: &StageRequest) -> Result<()> {
        let stage = Stage::AxisExtraction;
        let cfg = self.config(stage)?;
        let paths = self.stage_paths(stage)?;

        let skeleton_dir = paths.dir(StageDir::Skeleton);
        self.check_populated(stage, &skeleton_dir)?;

        let axis_dir = paths.ensure(StageDir::Axis)?;
        let geo_dir = request
            .georeference
            .then(|| paths.dir(StageDir::Geotransform));
        self.adapters
            .extract_axes(&skeleton_dir, &axis_dir, geo_dir.as_deref(), cfg)
    }

    fn run_migration(&self, request: &StageRequest) -> Result<()> {
        let stage = Stage::Migration;
        let configured = self.config.is_some();

        let pipeline_axis_dir = if configured {
            Some(self.stage_paths(stage)?.dir(StageDir::Axis))
        } else {
            None
        };
        let source = sources::resolve(
            configured,
            &request.axis_files,
            request.axis_dir.as_deref(),
            pipeline_axis_dir.as_deref(),
        )?;
        info!(source = %source.describe(), "resolved axis source");

        let axis_files = source.files()?;
        if axis_files.is_empty() {
            let path = match &source {
                AxisSource::FromPipeline(dir) | AxisSource::FromDirectory(dir) => dir.clone(),
                AxisSource::FromFileList(_) => PathBuf::new(),
            };
            return Err(MeanderError::MissingUpstreamArtifact {
                stage: stage.name().to_string(),
                path,
            });
        }

        let output_dir = match &request.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.clone()
            }
            None if configured => self.stage_paths(stage)?.ensure(StageDir::Migration)?,
            None => {
                return Err(MeanderError::Config(
                    "migration without a configuration file requires --output-dir".to_string(),
                ))
            }
        };

        let params = MigrationParams {
            columns: self.resolve_columns(request)?,
            pfreq: self.resolve_pfreq(request)?,
            show: request.show,
        };
        self.adapters
            .compute_migration(&axis_files, &output_dir, &params)
    }

    fn run_bars(&self, request: &StageRequest) -> Result<()> {
        let stage = Stage::Bars;
        let cfg = self.config(stage)?;
        let paths = self.stage_paths(stage)?;

        let migration_dir = request
            .output_dir
            .clone()
            .unwrap_or_else(|| paths.dir(StageDir::Migration));
        self.check_populated(stage, &migration_dir)?;

        let bars_dir = paths.ensure(StageDir::Bars)?;
        self.adapters.detect_bars(
            &migration_dir,
            &bars_dir,
            cfg,
            &BarsParams { show: request.show },
        )
    }

    /// Column indices: flag, else configured value, else the fixed default
    fn resolve_columns(&self, request: &StageRequest) -> Result<(usize, usize)> {
        if let Some(columns) = request.axis_columns {
            return Ok(columns);
        }
        match self.config {
            Some(cfg) if cfg.get("Migration", "columns").is_some() => {
                cfg.require_usize_pair("Migration", "columns")
            }
            _ => Ok(DEFAULT_AXIS_COLUMNS),
        }
    }

    /// Interpolation frequency: flag, else configured value, else default
    fn resolve_pfreq(&self, request: &StageRequest) -> Result<usize> {
        if let Some(pfreq) = request.pfreq {
            return Ok(pfreq);
        }
        match self.config {
            Some(cfg) if cfg.get("Migration", "pfreq").is_some() => {
                cfg.require_usize("Migration", "pfreq")
            }
            _ => Ok(DEFAULT_PFREQ),
        }
    }
}
