use std::path::{Path, PathBuf};

use crate::fits::FitsError;
use crate::identity::IdentityError;

/// Errors that can occur while selecting, reading or assembling spectra
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// I/O error outside of FITS access
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A FITS file could not be opened or read
    #[error("FITS error in {path}: {source}")]
    FitsError {
        /// File being read
        path: PathBuf,
        /// Underlying `fitsio` error
        #[source]
        source: FitsError,
    },

    /// Target id could not be derived for a fiber
    #[error("Identity error: {0}")]
    IdentityError(#[from] IdentityError),

    /// Rejected reader options
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Malformed glob pattern in the plate list
    #[error("Invalid plate pattern: {0}")]
    PatternError(#[from] glob::PatternError),

    /// Multi-plate run without the `photoPosPlate` companion of a plate
    #[error("Missing fiber identity file {0} (required when reading more than one plate)")]
    MissingIdentityFile(PathBuf),

    /// Exposure header names a different plate than its parent plate file
    #[error("Plate mismatch in {path}: expected plate {expected}, found {found}")]
    PlateMismatch {
        /// Exposure file
        path: PathBuf,
        /// Plate of the parent plate file
        expected: i64,
        /// Plate recorded in the exposure
        found: i64,
    },

    /// Arrays of one exposure disagree in shape
    #[error("Shape mismatch in {path}: {what} is {found:?}, expected {expected:?}")]
    ShapeMismatch {
        /// Exposure file
        path: PathBuf,
        /// Array name
        what: &'static str,
        /// Shape of the flux array
        expected: (usize, usize),
        /// Shape actually found
        found: (usize, usize),
    },

    /// Plug-map fiber number does not address a row of the exposure
    #[error("Fiber {fiber} in {path} maps outside the {rows} rows of the exposure")]
    FiberOutOfRange {
        /// Exposure file
        path: PathBuf,
        /// Fiber number from the plug map
        fiber: i64,
        /// Rows in the flux array
        rows: usize,
    },

    /// Header keyword present but unusable
    #[error("Invalid header in {path}: {message}")]
    InvalidHeader {
        /// File holding the header
        path: PathBuf,
        /// Description of the problem
        message: String,
    },
}

impl IngestError {
    /// Attach a file path to a FITS error, for use with `map_err`
    pub fn fits(path: &Path) -> impl FnOnce(FitsError) -> IngestError + '_ {
        move |source| IngestError::FitsError {
            path: path.to_path_buf(),
            source,
        }
    }
}
