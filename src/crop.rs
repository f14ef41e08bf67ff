//! Wavelength-range cropping of exposure arrays

use ndarray::{s, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::exposure::{Camera, ExposureData};

/// Wavelength window in Angstrom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropWindow {
    /// Lower bound
    pub lmin: f64,
    /// Upper bound
    pub lmax: f64,
}

impl Default for CropWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CropWindow {
    /// Window used for plate data and coadded frames
    pub const DEFAULT: CropWindow = CropWindow {
        lmin: 3500.0,
        lmax: 10000.0,
    };
    /// Upper bound for blue-camera frames
    pub const BLUE_MAX: f64 = 6000.0;
    /// Lower bound for red-camera frames
    pub const RED_MIN: f64 = 5500.0;

    /// Window for one exposure: frames that were not coadded keep only the
    /// range their camera covers
    pub fn for_exposure(camera: Option<Camera>, coadded: bool) -> Self {
        match camera {
            Some(camera) if !coadded => {
                if camera.is_blue() {
                    CropWindow {
                        lmax: Self::BLUE_MAX,
                        ..Self::DEFAULT
                    }
                } else {
                    CropWindow {
                        lmin: Self::RED_MIN,
                        ..Self::DEFAULT
                    }
                }
            }
            _ => Self::DEFAULT,
        }
    }

    /// Inclusive column range `[imin, imax]` of `wave` closest to the bounds.
    ///
    /// For each bound the distance is minimized over all fibers per column
    /// and the first column reaching the smallest distance wins. `None` for
    /// an empty array.
    pub fn column_range(&self, wave: &Array2<f64>) -> Option<(usize, usize)> {
        let imin = closest_column(wave, self.lmin)?;
        let imax = closest_column(wave, self.lmax)?;
        Some((imin, imax))
    }
}

fn closest_column(wave: &Array2<f64>, bound: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (col, column) in wave.axis_iter(Axis(1)).enumerate() {
        let distance = column
            .iter()
            .map(|w| (w - bound).abs())
            .fold(f64::INFINITY, f64::min);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((col, distance));
        }
    }
    best.map(|(col, _)| col)
}

/// Slice every array of `data` to the inclusive column range picked by
/// `window`; an inverted range leaves no columns
pub fn crop_exposure(data: &mut ExposureData, window: CropWindow) {
    let Some((imin, imax)) = window.column_range(&data.wave) else {
        return;
    };
    let end = if imax >= imin { imax + 1 } else { imin };
    for image in [&mut data.wave, &mut data.flux, &mut data.ivar, &mut data.wdisp] {
        *image = image.slice(s![.., imin..end]).to_owned();
    }
}
