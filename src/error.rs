/*!
 * Error types for Meander
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, MeanderError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_STAGE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

#[derive(Debug)]
pub enum MeanderError {
    /// Missing or unparsable configuration key/file
    Config(String),

    /// An external tool could not be located on PATH
    MissingTool { tool: String },

    /// Merge destination collides with the source acquisitions
    InvalidOutputPath { dest: PathBuf, source_parent: PathBuf },

    /// No usable band file for an acquisition, with every filename tried
    MissingBandFile {
        acquisition: String,
        band: u8,
        attempted: Vec<PathBuf>,
    },

    /// The external merge tool failed for a band
    MergeTool { band: u8, detail: String },

    /// More than one axis input source supplied for a migration run
    AmbiguousSource(String),

    /// No axis input source supplied for a migration run
    MissingSource(String),

    /// A stage's expected input directory is absent or empty
    MissingUpstreamArtifact { stage: String, path: PathBuf },

    /// An external stage executable exited with failure
    StageFailed { stage: String, detail: String },

    /// I/O error
    Io(io::Error),
}

impl MeanderError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // Usage and environment errors: fix the invocation and re-run
            MeanderError::Config(_)
            | MeanderError::MissingTool { .. }
            | MeanderError::InvalidOutputPath { .. }
            | MeanderError::AmbiguousSource(_)
            | MeanderError::MissingSource(_) => EXIT_USAGE,
            // Everything else: a stage failed mid-run
            _ => EXIT_STAGE,
        }
    }

    /// Get error category for logging and instrumentation
    pub fn category(&self) -> ErrorCategory {
        match self {
            MeanderError::Config(_) => ErrorCategory::Configuration,
            MeanderError::MissingTool { .. } => ErrorCategory::Environment,
            MeanderError::InvalidOutputPath { .. }
            | MeanderError::MissingBandFile { .. }
            | MeanderError::AmbiguousSource(_)
            | MeanderError::MissingSource(_) => ErrorCategory::Validation,
            MeanderError::MissingUpstreamArtifact { .. } => ErrorCategory::Pipeline,
            MeanderError::MergeTool { .. } | MeanderError::StageFailed { .. } => {
                ErrorCategory::Stage
            }
            MeanderError::Io(_) => ErrorCategory::IoError,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration errors
    Configuration,
    /// Missing external tools
    Environment,
    /// Input/parameter validation errors
    Validation,
    /// Inter-stage wiring errors
    Pipeline,
    /// External stage execution errors
    Stage,
    /// I/O operation errors
    IoError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Environment => write!(f, "environment"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Pipeline => write!(f, "pipeline"),
            ErrorCategory::Stage => write!(f, "stage"),
            ErrorCategory::IoError => write!(f, "io"),
        }
    }
}

impl fmt::Display for MeanderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeanderError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            MeanderError::MissingTool { tool } => {
                write!(f, "External tool not found on PATH: {}", tool)
            }
            MeanderError::InvalidOutputPath {
                dest,
                source_parent,
            } => {
                write!(
                    f,
                    "Merge output directory {} collides with the source directory {}",
                    dest.display(),
                    source_parent.display()
                )
            }
            MeanderError::MissingBandFile {
                acquisition,
                band,
                attempted,
            } => {
                let tried: Vec<String> =
                    attempted.iter().map(|p| p.display().to_string()).collect();
                write!(
                    f,
                    "No band {} file for acquisition {}: tried {}",
                    band,
                    acquisition,
                    tried.join(", ")
                )
            }
            MeanderError::MergeTool { band, detail } => {
                write!(f, "Merge tool failed for band {}: {}", band, detail)
            }
            MeanderError::AmbiguousSource(msg) => {
                write!(f, "Ambiguous axis source: {}", msg)
            }
            MeanderError::MissingSource(msg) => {
                write!(f, "No axis source: {}", msg)
            }
            MeanderError::MissingUpstreamArtifact { stage, path } => {
                write!(
                    f,
                    "Stage {} expects upstream output in {}, which is absent or empty",
                    stage,
                    path.display()
                )
            }
            MeanderError::StageFailed { stage, detail } => {
                write!(f, "Stage {} failed: {}", stage, detail)
            }
            MeanderError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
        }
    }
}

impl std::error::Error for MeanderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeanderError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for MeanderError {
    fn from(err: io::Error) -> Self {
        MeanderError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_exit_codes() {
        assert_eq!(
            MeanderError::Config("missing Data.output".to_string()).exit_code(),
            EXIT_USAGE
        );
        assert_eq!(
            MeanderError::MissingTool {
                tool: "gdal_merge.py".to_string()
            }
            .exit_code(),
            EXIT_USAGE
        );
        assert_eq!(
            MeanderError::AmbiguousSource("both --axis-files and --axis-dir".to_string())
                .exit_code(),
            EXIT_USAGE
        );
    }

    #[test]
    fn test_stage_exit_codes() {
        assert_eq!(
            MeanderError::MergeTool {
                band: 3,
                detail: "exit 1".to_string()
            }
            .exit_code(),
            EXIT_STAGE
        );
        assert_eq!(
            MeanderError::Io(io::Error::other("boom")).exit_code(),
            EXIT_STAGE
        );
    }

    #[test]
    fn test_missing_band_display_names_all_attempts() {
        let err = MeanderError::MissingBandFile {
            acquisition: "LE72240632002".to_string(),
            band: 6,
            attempted: vec![
                PathBuf::from("/in/LE72240632002/LE72240632002_B6.TIF"),
                PathBuf::from("/in/LE72240632002/LE72240632002_B6_VCID_1.TIF"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("LE72240632002_B6.TIF"));
        assert!(msg.contains("LE72240632002_B6_VCID_1.TIF"));
    }

    #[test]
    fn test_upstream_display_names_stage_and_path() {
        let err = MeanderError::MissingUpstreamArtifact {
            stage: "skeletonization".to_string(),
            path: PathBuf::from("/out/mask"),
        };
        assert!(err.to_string().contains("skeletonization"));
        assert!(err.to_string().contains("/out/mask"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(
            MeanderError::Config("x".to_string()).category().to_string(),
            "configuration"
        );
        assert_eq!(
            MeanderError::StageFailed {
                stage: "bars".to_string(),
                detail: "exit 2".to_string()
            }
            .category()
            .to_string(),
            "stage"
        );
    }
}
