/*!
 * Meander CLI - Command Line Interface
 *
 * One invocation describes one pipeline run: which stages to execute,
 * where the data lives, and any per-stage overrides. `--init` writes the
 * default configuration and exits without running a stage.
 */

use clap::{Parser, ValueEnum};
use meander::{
    config::{ConfigStore, Configuration, OverrideKey},
    error::{MeanderError, Result, EXIT_SUCCESS},
    logging,
    merge::GdalMerge,
    request::{MergeRequest, StageRequest},
    sequencer::StageSequencer,
    stages::ProcessAdapters,
};
use std::path::PathBuf;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "meander")]
#[command(version, about = "River planform extraction and migration analysis from Landsat imagery", long_about = None)]
struct Cli {
    /// Persisted configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Write the default configuration to CONFIG and exit
    #[arg(long)]
    init: bool,

    /// Acquisition folders to band-merge (requires --output)
    #[arg(long = "merge", value_name = "DIR", num_args = 1.., requires = "output")]
    merge: Vec<PathBuf>,

    /// Destination root for --merge
    #[arg(long = "output", value_name = "DIR", requires = "merge")]
    output: Option<PathBuf>,

    /// Run the segmentation stage
    #[arg(short = 'S', long)]
    segmentation: bool,

    /// Clean previously segmented masks
    #[arg(short = 'C', long = "clean-mask")]
    clean_mask: bool,

    /// Run the skeletonization stage
    #[arg(short = 'K', long)]
    skeletonization: bool,

    /// Run the axis-extraction stage
    #[arg(short = 'A', long = "axis")]
    axis: bool,

    /// Run the migration stage
    #[arg(short = 'M', long)]
    migration: bool,

    /// Run the bar-detection stage
    #[arg(short = 'B', long)]
    bars: bool,

    /// Label-selection mode for segmentation (auto, all, or a label index)
    #[arg(long, value_name = "MODE")]
    label: Option<String>,

    /// Mask directory override for skeletonization
    #[arg(long = "mask-dir", value_name = "DIR")]
    mask_dir: Option<PathBuf>,

    /// Skip georeferencing through the geotransform directory
    #[arg(long = "no-geo")]
    no_geo: bool,

    /// Explicit ordered centerline files for migration
    #[arg(long = "axis-files", value_name = "PATH", num_args = 1..)]
    axis_files: Vec<PathBuf>,

    /// Explicit centerline directory for migration
    #[arg(long = "axis-dir", value_name = "DIR")]
    axis_dir: Option<PathBuf>,

    /// x/y column indices in centerline files
    #[arg(long = "axis-columns", value_name = "COL", num_args = 2)]
    axis_columns: Vec<usize>,

    /// Migration output directory
    #[arg(long = "output-dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Point-interpolation frequency along centerlines
    #[arg(long, value_name = "N")]
    pfreq: Option<usize>,

    /// Display stage results interactively
    #[arg(long)]
    show: bool,

    /// Override a configuration option (repeatable)
    #[arg(long = "set", value_name = "SECTION.OPTION=VALUE")]
    set: Vec<String>,

    /// Log level
    #[arg(long = "log-level", value_enum, default_value = "info")]
    log_level: LogLevelArg,

    /// Log to a file (JSON) instead of stderr
    #[arg(long = "log", value_name = "FILE")]
    log: Option<PathBuf>,

    /// Verbose logging (shorthand for --log-level debug)
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevelArg {
    fn to_level(self) -> Level {
        match self {
            LogLevelArg::Error => Level::ERROR,
            LogLevelArg::Warn => Level::WARN,
            LogLevelArg::Info => Level::INFO,
            LogLevelArg::Debug => Level::DEBUG,
            LogLevelArg::Trace => Level::TRACE,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        cli.log_level.to_level()
    };
    if let Err(e) = logging::init_logging(level, cli.log.as_deref()) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let overrides = cli
        .set
        .iter()
        .map(|raw| OverrideKey::parse(raw))
        .collect::<Result<Vec<_>>>()?;

    // Initialization and execution are mutually exclusive in one invocation
    if cli.init {
        let path = cli.config.clone().ok_or_else(|| {
            MeanderError::Config("--init requires a CONFIG path".to_string())
        })?;
        let mut cfg = Configuration::defaults();
        for (section, option) in cfg.apply_overrides(&overrides) {
            info!("override applied: {}.{}", section, option);
        }
        ConfigStore::save(&cfg, &path)?;
        info!(config = %path.display(), "default configuration written");
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                return Err(MeanderError::Config(format!(
                    "configuration file {} not found (run --init first)",
                    path.display()
                )));
            }
            let mut cfg = ConfigStore::load(path)?;
            let applied = cfg.apply_overrides(&overrides);
            if !applied.is_empty() {
                for (section, option) in &applied {
                    info!("override applied: {}.{}", section, option);
                }
                // Persist mutated values before any stage runs, so a crash
                // mid-pipeline never loses them
                ConfigStore::save(&cfg, path)?;
            }
            Some(cfg)
        }
        None => {
            if !overrides.is_empty() {
                return Err(MeanderError::Config(
                    "--set requires a configuration file".to_string(),
                ));
            }
            None
        }
    };

    let request = build_request(&cli)?;
    if !request.any_stage() {
        warn!("no stage requested; nothing to do");
        return Ok(());
    }

    // Locate the merge tool up front so a missing GDAL install fails
    // before any stage has run
    let merge_tool = if request.merge.is_some() {
        Some(GdalMerge::locate()?)
    } else {
        None
    };

    let adapters = ProcessAdapters::new(config.as_ref(), cli.config.as_deref());
    let mut sequencer = StageSequencer::new(&adapters).with_progress(true);
    if let Some(cfg) = &config {
        sequencer = sequencer.with_config(cfg);
    }
    if let Some(tool) = &merge_tool {
        sequencer = sequencer.with_merge_tool(tool);
    }
    sequencer.run(&request)
}

fn build_request(cli: &Cli) -> Result<StageRequest> {
    let merge = if cli.merge.is_empty() {
        None
    } else {
        let output = cli.output.clone().ok_or_else(|| {
            MeanderError::Config("--merge requires --output".to_string())
        })?;
        Some(MergeRequest {
            sources: cli.merge.clone(),
            output,
        })
    };

    let axis_columns = match cli.axis_columns.as_slice() {
        [] => None,
        [x, y] => Some((*x, *y)),
        _ => {
            return Err(MeanderError::Config(
                "--axis-columns takes exactly two indices".to_string(),
            ))
        }
    };

    Ok(StageRequest {
        merge,
        segmentation: cli.segmentation,
        clean_mask: cli.clean_mask,
        skeletonization: cli.skeletonization,
        axis_extraction: cli.axis,
        migration: cli.migration,
        bars: cli.bars,
        label: cli.label.clone(),
        mask_dir: cli.mask_dir.clone(),
        georeference: !cli.no_geo,
        axis_files: cli.axis_files.clone(),
        axis_dir: cli.axis_dir.clone(),
        axis_columns,
        output_dir: cli.output_dir.clone(),
        pfreq: cli.pfreq,
        show: cli.show,
    })
}
