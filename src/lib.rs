/*!
 * Meander - river planform analysis pipeline driver
 *
 * Orchestrates a multi-stage Landsat analysis pipeline from a single
 * declarative run description:
 * - per-band merging of acquisition cohorts through an external GDAL tool,
 *   with the band-6 VCID filename fallback
 * - layered section/option configuration with command-line overrides
 * - a canonical output directory layout shared by all stages
 * - fixed-order sequencing of segmentation, mask cleaning,
 *   skeletonization, centerline extraction, migration rates and bars
 *
 * The algorithmic collaborators stay behind the [`stages::StageAdapters`]
 * seam; this crate only wires their inputs and outputs together.
 */

pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod merge;
pub mod request;
pub mod sequencer;
pub mod sources;
pub mod stages;

// Re-export commonly used types
pub use config::{ConfigStore, Configuration, OverrideKey};
pub use error::{MeanderError, Result};
pub use layout::{StageDir, StagePaths};
pub use merge::{BandMergeEngine, GdalMerge, LandsatAcquisition, MergeJob, MergeTool};
pub use request::{MergeRequest, StageRequest};
pub use sequencer::{Stage, StageSequencer, STAGE_ORDER};
pub use sources::AxisSource;
pub use stages::{ProcessAdapters, StageAdapters};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
