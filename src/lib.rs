//! # platespec - spectral ingestion for plate-based spectroscopic surveys
//!
//! `platespec` reads the per-plate (`spPlate`) and per-exposure (`spCFrame`)
//! FITS products of a multi-fiber spectrograph survey and assembles
//! per-target one-dimensional spectra ready for redshift fitting.
//!
//! ## Key Features
//!
//! - **Exposure selection**: coadded plates, every frame, the best exposure or
//!   a reproducible random complete exposure.
//!
//! - **Frame coaddition**: per-fiber resampling onto the plate wavelength grid
//!   with integration, nearest-neighbor, masked-spline or simple-spline
//!   policies.
//!
//! - **Resolution matrices**: banded Gaussian line-spread matrices built from
//!   the dispersion arrays, with a lazily cached CSR view.
//!
//! - **Target identities**: `plate * 10^9 + mjd * 10^4 + fiber` within a plate,
//!   `THING_ID` across plates.
//!
//! - **FITS access through `fitsio`**: multi-extension images and binary
//!   tables, plain or gzip-compressed, read into `ndarray` arrays.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use platespec::prelude::*;
//!
//! let options = ReadOptions {
//!     mode: SelectionMode::AllFrames,
//!     coadd_frames: true,
//!     resample_method: ResampleMethod::Integration,
//!     ..Default::default()
//! };
//! let output = read_spectra(&["data/7027/spPlate-7027-56448.fits"], &options)?;
//!
//! for target in &output.targets {
//!     println!("{}: {} spectra", target.id, target.spectra.len());
//! }
//! print!("{}", output.report);
//! # Ok::<(), platespec::error::IngestError>(())
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! plates --> ExposureSelector --> ExposureReader --> [resample] --> crop
//!        --> ResolutionMatrix --> TargetAssembler --> targets + metadata
//! ```

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod assemble;
pub mod crop;
/// Error types of the ingestion pipeline
pub mod error;
pub mod exposure;
pub mod fits;
pub mod identity;
pub mod ingest;
pub mod report;
pub mod resample;
pub mod resolution;
pub mod synthetic;
pub mod target;
pub mod wavelength;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::assemble::{Assembly, TargetAssembler};
    pub use crate::crop::{crop_exposure, CropWindow};
    pub use crate::error::IngestError;
    pub use crate::exposure::{
        Camera, ExposureData, ExposureReader, ExposureRef, ExposureSelector, SelectionMode,
    };
    pub use crate::fits::{FitsError, FitsReader};
    pub use crate::identity::{decode_target_id, encode_target_id, FiberIdentity, ObservationKey};
    pub use crate::ingest::{
        expand_plate_patterns, read_spectra, read_spectra_with_observer, IngestObserver,
        IngestOutput, LogObserver, ReadOptions,
    };
    pub use crate::report::{IngestReport, Omission};
    pub use crate::resample::{ResampleMethod, Resampler};
    pub use crate::resolution::{CsrMatrix, ResolutionMatrix};
    pub use crate::target::{Spectrum, Target, TargetMetadataTable, TargetRow};
}
