/*!
 * The run description built once from the command line
 *
 * Built by the CLI, read-only afterwards. Every optional parameter is a
 * value-checked field with an explicit default constant, never an
 * attribute-presence test.
 */

use std::path::PathBuf;

/// Point-interpolation frequency when neither flag nor config supplies one
pub const DEFAULT_PFREQ: usize = 10;

/// Zero-based x/y columns read from centerline files by default
pub const DEFAULT_AXIS_COLUMNS: (usize, usize) = (0, 1);

/// A band-merge request: acquisition cohort plus destination root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub sources: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Requested stages and their stage-specific parameters
#[derive(Debug, Clone)]
pub struct StageRequest {
    pub merge: Option<MergeRequest>,
    pub segmentation: bool,
    pub clean_mask: bool,
    pub skeletonization: bool,
    pub axis_extraction: bool,
    pub migration: bool,
    pub bars: bool,

    /// Label-selection mode override for segmentation
    pub label: Option<String>,
    /// Mask directory override for skeletonization
    pub mask_dir: Option<PathBuf>,
    /// Georeference skeleton/axis outputs through the geotransform directory
    pub georeference: bool,
    /// Explicit ordered centerline files for migration
    pub axis_files: Vec<PathBuf>,
    /// Explicit centerline directory for migration
    pub axis_dir: Option<PathBuf>,
    /// x/y column indices in centerline files
    pub axis_columns: Option<(usize, usize)>,
    /// Migration output directory override
    pub output_dir: Option<PathBuf>,
    /// Point-interpolation frequency
    pub pfreq: Option<usize>,
    /// Display results interactively in migration/bars
    pub show: bool,
}

impl Default for StageRequest {
    fn default() -> Self {
        Self {
            merge: None,
            segmentation: false,
            clean_mask: false,
            skeletonization: false,
            axis_extraction: false,
            migration: false,
            bars: false,
            label: None,
            mask_dir: None,
            georeference: true,
            axis_files: Vec::new(),
            axis_dir: None,
            axis_columns: None,
            output_dir: None,
            pfreq: None,
            show: false,
        }
    }
}

impl StageRequest {
    /// Whether any stage at all was requested
    pub fn any_stage(&self) -> bool {
        self.merge.is_some()
            || self.segmentation
            || self.clean_mask
            || self.skeletonization
            || self.axis_extraction
            || self.migration
            || self.bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req = StageRequest::default();
        assert!(!req.any_stage());
        assert!(req.georeference);
        assert_eq!(req.pfreq, None);
    }

    #[test]
    fn test_any_stage() {
        let req = StageRequest {
            migration: true,
            ..StageRequest::default()
        };
        assert!(req.any_stage());

        let req = StageRequest {
            merge: Some(MergeRequest {
                sources: vec![PathBuf::from("/in/a")],
                output: PathBuf::from("/out"),
            }),
            ..StageRequest::default()
        };
        assert!(req.any_stage());
    }
}
