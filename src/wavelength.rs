//! Wavelength solutions
//!
//! Plate files store a log-linear solution in two header coefficients, frame
//! files a tabulated `log10(lambda)` array per fiber.

use ndarray::{Array2, ArrayView1};

/// `10^(coeff0 + coeff1 * i)` for `i in 0..npix`
pub fn loglinear_grid(coeff0: f64, coeff1: f64, npix: usize) -> Vec<f64> {
    (0..npix)
        .map(|i| 10f64.powf(coeff0 + coeff1 * i as f64))
        .collect()
}

/// `rows` copies of `grid`, one per fiber
pub fn broadcast_rows(grid: &[f64], rows: usize) -> Array2<f64> {
    ArrayView1::from(grid)
        .broadcast((rows, grid.len()))
        .map(|view| view.to_owned())
        .unwrap_or_else(|| Array2::zeros((rows, grid.len())))
}

/// Convert a tabulated `log10(lambda)` image to Angstrom in place
pub fn exponentiate_log10(log_wave: &mut Array2<f64>) {
    log_wave.mapv_inplace(|v| 10f64.powf(v));
}

/// Bin edges for the given bin centers.
///
/// Inner edges are midpoints; the outer edges extend half a step past the
/// first and last centers. A single center gets a unit-width bin.
pub fn centers_to_edges(centers: &[f64]) -> Vec<f64> {
    match centers.len() {
        0 => Vec::new(),
        1 => vec![centers[0] - 0.5, centers[0] + 0.5],
        n => {
            let mut edges = Vec::with_capacity(n + 1);
            edges.push(centers[0] - (centers[1] - centers[0]) / 2.0);
            for pair in centers.windows(2) {
                edges.push((pair[0] + pair[1]) / 2.0);
            }
            edges.push(centers[n - 1] + (centers[n - 1] - centers[n - 2]) / 2.0);
            edges
        }
    }
}
