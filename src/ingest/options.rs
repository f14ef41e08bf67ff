use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::exposure::SelectionMode;
use crate::resample::ResampleMethod;

/// Options for [`read_spectra`](super::read_spectra)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Only keep these target ids (None = all)
    pub target_ids: Option<Vec<i64>>,

    /// Only read these fibers (None = all)
    pub fiber_ids: Option<Vec<i64>>,

    /// Which exposure files are read
    pub mode: SelectionMode,

    /// Seed for `RandomExposure`
    pub random_seed: u64,

    /// Zero ivar where the and-mask is set
    pub use_andmask: bool,

    /// Resample frames onto the parent plate grid
    pub coadd_frames: bool,

    /// Policy used by `coadd_frames`
    pub resample_method: ResampleMethod,

    /// Materialize the CSR view of every resolution matrix up front
    pub cache_csr: bool,

    /// Keep every exposure as its own spectrum downstream instead of coadding
    pub all_spectra: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            target_ids: None,
            fiber_ids: None,
            mode: SelectionMode::Coadded,
            random_seed: 0,
            use_andmask: false,
            coadd_frames: false,
            resample_method: ResampleMethod::default(),
            cache_csr: false,
            all_spectra: false,
        }
    }
}

impl ReadOptions {
    /// Reject contradictory settings before any file is touched
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.all_spectra && self.coadd_frames {
            return Err(IngestError::ConfigError(
                "all_spectra and coadd_frames cannot be combined".to_string(),
            ));
        }
        if let Some(fibers) = &self.fiber_ids {
            if let Some(bad) = fibers.iter().find(|&&f| f < 1) {
                return Err(IngestError::ConfigError(format!(
                    "fiber ids start at 1, got {}",
                    bad
                )));
            }
        }
        Ok(())
    }

    /// True when frames are resampled onto the plate grid
    pub fn resamples_frames(&self) -> bool {
        self.coadd_frames && self.mode.uses_frames()
    }

    /// Downstream coadd hint carried on every target
    pub fn coadd_hint(&self) -> bool {
        !self.all_spectra
    }
}
