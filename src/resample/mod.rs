//! # Frame coaddition onto the plate wavelength grid
//!
//! Frame files have their own per-fiber wavelength solution. When frames are
//! coadded, every fiber is resampled onto the log-linear grid of the parent
//! `spPlate` file with one of four [`Resampler`] policies:
//!
//! | Method            | Flux                       | Ivar           | Dispersion |
//! |-------------------|----------------------------|----------------|------------|
//! | `integration`     | bin average                | bin average    | bin average |
//! | `nearest-neighbor`| nearest sample             | nearest sample | nearest sample |
//! | `masked-spline`   | cubic through ivar != 0    | linear, masked | linear |
//! | `simple-spline`   | cubic through all pixels   | linear         | linear |
//!
//! Output pixels outside the input wavelength range are 0 in every array.

mod interp;
mod spline;

pub use interp::{integrate_bins, linear, nearest};
pub use spline::CubicSpline;

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::exposure::{ExposureData, ExposureRef};
use crate::fits::FitsReader;
use crate::wavelength::{broadcast_rows, centers_to_edges, loglinear_grid};

/// Resampling policy used when frames are coadded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleMethod {
    /// Flux-conserving bin average of the piecewise-linear input
    Integration,
    /// Nearest input sample
    #[default]
    NearestNeighbor,
    /// Cubic spline through unmasked pixels, masked linear ivar
    MaskedSpline,
    /// Cubic spline flux, linear ivar and dispersion
    SimpleSpline,
}

impl ResampleMethod {
    /// Kebab-case name as used in config files
    pub fn name(&self) -> &'static str {
        match self {
            ResampleMethod::Integration => "integration",
            ResampleMethod::NearestNeighbor => "nearest-neighbor",
            ResampleMethod::MaskedSpline => "masked-spline",
            ResampleMethod::SimpleSpline => "simple-spline",
        }
    }

    /// Policy implementation
    pub fn resampler(&self) -> Box<dyn Resampler> {
        match self {
            ResampleMethod::Integration => Box::new(IntegrationResampler),
            ResampleMethod::NearestNeighbor => Box::new(NearestResampler),
            ResampleMethod::MaskedSpline => Box::new(MaskedSplineResampler),
            ResampleMethod::SimpleSpline => Box::new(SimpleSplineResampler),
        }
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input samples of one fiber, all of equal length and ascending in `wave`
#[derive(Debug, Clone, Copy)]
pub struct FiberSamples<'a> {
    /// Wavelength
    pub wave: &'a [f64],
    /// Flux
    pub flux: &'a [f64],
    /// Inverse variance
    pub ivar: &'a [f64],
    /// Dispersion width
    pub wdisp: &'a [f64],
}

/// One fiber on the target grid
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resampled {
    /// Flux
    pub flux: Vec<f64>,
    /// Inverse variance
    pub ivar: Vec<f64>,
    /// Dispersion width
    pub wdisp: Vec<f64>,
}

/// A resampling policy
pub trait Resampler: fmt::Debug + Send + Sync {
    /// Which method this is
    fn method(&self) -> ResampleMethod;

    /// Resample one fiber onto `target` wavelengths
    fn resample(&self, input: FiberSamples<'_>, target: &[f64]) -> Resampled;
}

/// See [`ResampleMethod::Integration`]
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrationResampler;

impl Resampler for IntegrationResampler {
    fn method(&self) -> ResampleMethod {
        ResampleMethod::Integration
    }

    fn resample(&self, input: FiberSamples<'_>, target: &[f64]) -> Resampled {
        let edges = centers_to_edges(target);
        Resampled {
            flux: integrate_bins(input.wave, input.flux, &edges),
            ivar: integrate_bins(input.wave, input.ivar, &edges),
            wdisp: integrate_bins(input.wave, input.wdisp, &edges),
        }
    }
}

/// See [`ResampleMethod::NearestNeighbor`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestResampler;

impl Resampler for NearestResampler {
    fn method(&self) -> ResampleMethod {
        ResampleMethod::NearestNeighbor
    }

    fn resample(&self, input: FiberSamples<'_>, target: &[f64]) -> Resampled {
        Resampled {
            flux: nearest(input.wave, input.flux, target),
            ivar: nearest(input.wave, input.ivar, target),
            wdisp: nearest(input.wave, input.wdisp, target),
        }
    }
}

/// See [`ResampleMethod::MaskedSpline`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskedSplineResampler;

impl Resampler for MaskedSplineResampler {
    fn method(&self) -> ResampleMethod {
        ResampleMethod::MaskedSpline
    }

    fn resample(&self, input: FiberSamples<'_>, target: &[f64]) -> Resampled {
        let (good_wave, good_flux): (Vec<f64>, Vec<f64>) = input
            .wave
            .iter()
            .zip(input.flux)
            .zip(input.ivar)
            .filter(|(_, iv)| **iv != 0.0)
            .map(|((&w, &f), _)| (w, f))
            .unzip();
        let flux = spline_or_zeros(good_wave, good_flux, target);

        // weight > 0 means some zero-ivar input pixel contributes
        let masked: Vec<f64> = input
            .ivar
            .iter()
            .map(|&iv| if iv == 0.0 { 1.0 } else { 0.0 })
            .collect();
        let touched = linear(input.wave, &masked, target);
        let mut ivar = linear(input.wave, input.ivar, target);
        for (iv, weight) in ivar.iter_mut().zip(touched) {
            if weight > 0.0 {
                *iv = 0.0;
            }
        }

        Resampled {
            flux,
            ivar,
            wdisp: linear(input.wave, input.wdisp, target),
        }
    }
}

/// See [`ResampleMethod::SimpleSpline`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleSplineResampler;

impl Resampler for SimpleSplineResampler {
    fn method(&self) -> ResampleMethod {
        ResampleMethod::SimpleSpline
    }

    fn resample(&self, input: FiberSamples<'_>, target: &[f64]) -> Resampled {
        Resampled {
            flux: spline_or_zeros(input.wave.to_vec(), input.flux.to_vec(), target),
            ivar: linear(input.wave, input.ivar, target),
            wdisp: linear(input.wave, input.wdisp, target),
        }
    }
}

fn spline_or_zeros(x: Vec<f64>, y: Vec<f64>, target: &[f64]) -> Vec<f64> {
    match CubicSpline::new(x, y) {
        Some(spline) => target.iter().map(|&t| spline.evaluate(t)).collect(),
        None => vec![0.0; target.len()],
    }
}

fn row_slice(image: &Array2<f64>, r: usize) -> Cow<'_, [f64]> {
    let row = image.row(r);
    match row.to_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(row.to_vec()),
    }
}

/// Resample every row of a frame onto `grid`; the wavelength array becomes
/// `grid` broadcast across rows
pub fn resample_exposure(data: ExposureData, grid: &[f64], resampler: &dyn Resampler) -> ExposureData {
    let rows = data.flux.nrows();
    let npix = grid.len();
    let mut flux = Array2::zeros((rows, npix));
    let mut ivar = Array2::zeros((rows, npix));
    let mut wdisp = Array2::zeros((rows, npix));

    for r in 0..rows {
        let (wave_row, flux_row) = (row_slice(&data.wave, r), row_slice(&data.flux, r));
        let (ivar_row, wdisp_row) = (row_slice(&data.ivar, r), row_slice(&data.wdisp, r));
        let input = FiberSamples {
            wave: &wave_row,
            flux: &flux_row,
            ivar: &ivar_row,
            wdisp: &wdisp_row,
        };
        let out = resampler.resample(input, grid);
        flux.row_mut(r).assign(&ArrayView1::from(out.flux.as_slice()));
        ivar.row_mut(r).assign(&ArrayView1::from(out.ivar.as_slice()));
        wdisp.row_mut(r).assign(&ArrayView1::from(out.wdisp.as_slice()));
    }

    debug!(
        "Resampled {} onto {} plate pixels ({})",
        data.path.display(),
        npix,
        resampler.method()
    );

    ExposureData {
        wave: broadcast_rows(grid, rows),
        flux,
        ivar,
        wdisp,
        ..data
    }
}

/// Plate wavelength grids keyed by plate file, read once per plate
#[derive(Debug, Default)]
pub struct ReferenceGridCache {
    grids: HashMap<PathBuf, Arc<Vec<f64>>>,
}

impl ReferenceGridCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid of the plate file the exposure was selected from
    pub fn grid_for(&mut self, exposure: &ExposureRef) -> Result<Arc<Vec<f64>>, IngestError> {
        let path = exposure.plate_path.as_path();
        if let Some(grid) = self.grids.get(path) {
            return Ok(Arc::clone(grid));
        }

        let mut fits = FitsReader::open(path).map_err(IngestError::fits(path))?;
        let coeff0 = fits.key_f64(0, "COEFF0").map_err(IngestError::fits(path))?;
        let coeff1 = fits.key_f64(0, "COEFF1").map_err(IngestError::fits(path))?;
        let npix = fits.key_i64(0, "NAXIS1").map_err(IngestError::fits(path))?;
        let npix = usize::try_from(npix).map_err(|_| IngestError::InvalidHeader {
            path: path.to_path_buf(),
            message: format!("NAXIS1 = {}", npix),
        })?;

        let grid = Arc::new(loglinear_grid(coeff0, coeff1, npix));
        self.grids.insert(path.to_path_buf(), Arc::clone(&grid));
        Ok(grid)
    }

    /// Number of cached plates
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}
