use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::{Array2, Zip};

use super::{Camera, ExposureRef};
use crate::error::IngestError;
use crate::fits::FitsReader;
use crate::wavelength::{broadcast_rows, exponentiate_log10, loglinear_grid};

/// Fibers per spectrograph, i.e. rows of one frame file
pub const FRAME_FIBERS: i64 = 500;

const HDU_FLUX: usize = 0;
const HDU_IVAR: usize = 1;
const HDU_ANDMASK: usize = 2;
const HDU_LOGLAM: usize = 3;
const HDU_WDISP: usize = 4;
const HDU_PLUGMAP: usize = 5;

/// A plug-map fiber kept for assembly, with its row in the exposure arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedFiber {
    /// 1-based fiber number
    pub fiber: i64,
    /// Row in the `[nfiber x npix]` arrays
    pub row: usize,
}

/// Arrays of one exposure, every row of the file kept
#[derive(Debug, Clone)]
pub struct ExposureData {
    /// Source file
    pub path: PathBuf,
    /// Plate from the parent plate file
    pub plate: i64,
    /// Mjd from the parent plate file
    pub mjd: i64,
    /// Camera channel for frame files
    pub camera: Option<Camera>,
    /// Fibers that passed the fiber filter
    pub fibers: Vec<SelectedFiber>,
    /// Wavelength in Angstrom
    pub wave: Array2<f64>,
    /// Flux
    pub flux: Array2<f64>,
    /// Inverse variance, already zeroed where the and-mask is set
    pub ivar: Array2<f64>,
    /// Dispersion width in pixels
    pub wdisp: Array2<f64>,
}

impl ExposureData {
    /// `(nfiber, npix)`
    pub fn shape(&self) -> (usize, usize) {
        self.flux.dim()
    }

    /// True for frame-level data
    pub fn is_frame(&self) -> bool {
        self.camera.is_some()
    }

    /// Check that every array has the shape of the flux array
    pub fn check_shapes(&self) -> Result<(), IngestError> {
        let expected = self.flux.dim();
        for (what, image) in [("wavelength", &self.wave), ("ivar", &self.ivar), ("wdisp", &self.wdisp)] {
            check_shape(&self.path, what, expected, image)?;
        }
        Ok(())
    }
}

fn check_shape(
    path: &Path,
    what: &'static str,
    expected: (usize, usize),
    image: &Array2<f64>,
) -> Result<(), IngestError> {
    if image.dim() == expected {
        Ok(())
    } else {
        Err(IngestError::ShapeMismatch {
            path: path.to_path_buf(),
            what,
            expected,
            found: image.dim(),
        })
    }
}

/// Reads flux, ivar, dispersion, wavelength and plug map of one exposure
#[derive(Debug, Clone, Default)]
pub struct ExposureReader {
    use_andmask: bool,
    fiber_ids: Option<BTreeSet<i64>>,
}

impl ExposureReader {
    /// Create a reader; `use_andmask` zeroes ivar wherever the and-mask is set
    pub fn new(use_andmask: bool) -> Self {
        Self {
            use_andmask,
            fiber_ids: None,
        }
    }

    /// Keep only the listed fibers
    pub fn with_fiber_filter(mut self, fiber_ids: impl IntoIterator<Item = i64>) -> Self {
        self.fiber_ids = Some(fiber_ids.into_iter().collect());
        self
    }

    /// Read one exposure.
    ///
    /// With positional identities the exposure's `PLATEID` must match the plate
    /// recorded in `exposure`; a mismatch is an error.
    pub fn read(&self, exposure: &ExposureRef) -> Result<ExposureData, IngestError> {
        let path = exposure.path.as_path();
        let mut fits = FitsReader::open(path).map_err(IngestError::fits(path))?;

        if exposure.identity.is_positional() {
            let found = fits.key_i64(HDU_FLUX, "PLATEID").map_err(IngestError::fits(path))?;
            if found != exposure.plate {
                return Err(IngestError::PlateMismatch {
                    path: path.to_path_buf(),
                    expected: exposure.plate,
                    found,
                });
            }
        }

        let flux = fits.image(HDU_FLUX).map_err(IngestError::fits(path))?;
        let shape = flux.dim();

        let mut ivar = fits.image(HDU_IVAR).map_err(IngestError::fits(path))?;
        check_shape(path, "ivar", shape, &ivar)?;
        if self.use_andmask {
            let mask = fits.image(HDU_ANDMASK).map_err(IngestError::fits(path))?;
            check_shape(path, "andmask", shape, &mask)?;
            Zip::from(&mut ivar).and(&mask).for_each(|iv, &m| {
                if m != 0.0 {
                    *iv = 0.0;
                }
            });
        }

        let wdisp = fits.image(HDU_WDISP).map_err(IngestError::fits(path))?;

        let (wave, camera) = if exposure.is_frame() {
            let mut wave = fits.image(HDU_LOGLAM).map_err(IngestError::fits(path))?;
            exponentiate_log10(&mut wave);
            let camera = fits
                .key_string(HDU_FLUX, "CAMERAS")
                .ok()
                .and_then(|label| Camera::from_label(label.trim()))
                .or(exposure.camera);
            (wave, camera)
        } else {
            let coeff0 = fits.key_f64(HDU_FLUX, "COEFF0").map_err(IngestError::fits(path))?;
            let coeff1 = fits.key_f64(HDU_FLUX, "COEFF1").map_err(IngestError::fits(path))?;
            let grid = loglinear_grid(coeff0, coeff1, shape.1);
            (broadcast_rows(&grid, shape.0), None)
        };

        let fiber_ids = fits
            .column_i64(HDU_PLUGMAP, "FIBERID")
            .map_err(IngestError::fits(path))?;
        let fibers = self.select_fibers(path, &fiber_ids, exposure.is_frame(), shape.0)?;

        let data = ExposureData {
            path: path.to_path_buf(),
            plate: exposure.plate,
            mjd: exposure.mjd,
            camera,
            fibers,
            wave,
            flux,
            ivar,
            wdisp,
        };
        data.check_shapes()?;

        debug!(
            "Read {} ({} x {}, {} fibers selected)",
            path.display(),
            shape.0,
            shape.1,
            data.fibers.len()
        );
        Ok(data)
    }

    fn select_fibers(
        &self,
        path: &Path,
        fiber_ids: &[i64],
        is_frame: bool,
        rows: usize,
    ) -> Result<Vec<SelectedFiber>, IngestError> {
        let mut selected = Vec::new();
        for &fiber in fiber_ids {
            if let Some(filter) = &self.fiber_ids {
                if !filter.contains(&fiber) {
                    continue;
                }
            }
            let index = if is_frame {
                (fiber - 1) % FRAME_FIBERS
            } else {
                fiber - 1
            };
            let row = usize::try_from(index)
                .ok()
                .filter(|&r| r < rows)
                .ok_or_else(|| IngestError::FiberOutOfRange {
                    path: path.to_path_buf(),
                    fiber,
                    rows,
                })?;
            selected.push(SelectedFiber { fiber, row });
        }
        Ok(selected)
    }
}
