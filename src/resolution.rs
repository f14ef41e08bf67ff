//! # Resolution matrices
//!
//! Each spectrum carries a banded `n x n` matrix describing the line-spread
//! function at every pixel. Band `k` of `ndiag` has diagonal offset
//! `ndiag / 2 - k`; storage follows the DIA convention where `data[k][j]` is
//! the entry at row `j - offset_k`, column `j`. Entries are Gaussian in the
//! offset with the dispersion width of column `j`, and every column sums to 1.
//!
//! A compressed-sparse-row view is computed on first use and cached inside
//! the matrix.

use std::sync::OnceLock;

use ndarray::Array2;

/// Dispersion widths below this are treated as missing
pub const DISPERSION_FLOOR: f64 = 1e-5;
/// Width substituted for missing dispersion
pub const FALLBACK_DISPERSION: f64 = 2.0;

/// Replace degenerate dispersion widths in place
pub fn sanitize_dispersion(wdisp: &mut Array2<f64>) {
    wdisp.mapv_inplace(|w| {
        if w < DISPERSION_FLOOR || !w.is_finite() {
            FALLBACK_DISPERSION
        } else {
            w
        }
    });
}

/// Number of bands for a largest dispersion width of `max_wdisp`
pub fn band_count(max_wdisp: f64) -> usize {
    4 * max_wdisp.ceil().max(0.0) as usize + 1
}

/// Band count shared by every fiber of one (sanitized) exposure
pub fn exposure_band_count(wdisp: &Array2<f64>) -> usize {
    wdisp.iter().copied().reduce(f64::max).map(band_count).unwrap_or(1)
}

/// Banded resolution matrix
#[derive(Debug, Clone)]
pub struct ResolutionMatrix {
    n: usize,
    ndiag: usize,
    data: Vec<f64>,
    csr: OnceLock<CsrMatrix>,
}

impl ResolutionMatrix {
    /// Build from one fiber's dispersion widths; `ndiag` must be odd
    pub fn from_dispersion(wdisp: &[f64], ndiag: usize) -> Self {
        debug_assert!(ndiag % 2 == 1, "band count must be odd");
        let n = wdisp.len();
        let half = (ndiag / 2) as i64;
        let mut data = vec![0.0; ndiag * n];

        for k in 0..ndiag {
            let offset = half - k as i64;
            for (j, &w) in wdisp.iter().enumerate() {
                let row = j as i64 - offset;
                if row >= 0 && (row as usize) < n {
                    let d2 = (offset * offset) as f64;
                    data[k * n + j] = (-d2 / (2.0 * w * w)).exp();
                }
            }
        }

        for j in 0..n {
            let sum: f64 = (0..ndiag).map(|k| data[k * n + j]).sum();
            if sum > 0.0 {
                for k in 0..ndiag {
                    data[k * n + j] /= sum;
                }
            }
        }

        Self {
            n,
            ndiag,
            data,
            csr: OnceLock::new(),
        }
    }

    /// Build and immediately materialize the CSR view
    pub fn with_cached_csr(self) -> Self {
        self.csr();
        self
    }

    /// Matrix dimension
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of bands
    pub fn ndiag(&self) -> usize {
        self.ndiag
    }

    /// Diagonal offset of every band, band 0 first
    pub fn offsets(&self) -> Vec<i64> {
        let half = (self.ndiag / 2) as i64;
        (0..self.ndiag).map(|k| half - k as i64).collect()
    }

    /// DIA row of band `k`
    pub fn band(&self, k: usize) -> &[f64] {
        &self.data[k * self.n..(k + 1) * self.n]
    }

    /// Entry at `(row, col)`, 0 outside the bands
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let offset = col as i64 - row as i64;
        let k = (self.ndiag / 2) as i64 - offset;
        if k < 0 || k >= self.ndiag as i64 || col >= self.n || row >= self.n {
            return 0.0;
        }
        self.data[k as usize * self.n + col]
    }

    /// Sum of each column
    pub fn column_sums(&self) -> Vec<f64> {
        (0..self.n)
            .map(|j| (0..self.ndiag).map(|k| self.data[k * self.n + j]).sum())
            .collect()
    }

    /// Matrix-vector product from the banded storage; `None` unless
    /// `x.len() == n`
    pub fn dot(&self, x: &[f64]) -> Option<Vec<f64>> {
        if x.len() != self.n {
            return None;
        }
        let mut y = vec![0.0; self.n];
        let half = (self.ndiag / 2) as i64;
        for k in 0..self.ndiag {
            let offset = half - k as i64;
            for (j, &xj) in x.iter().enumerate() {
                let row = j as i64 - offset;
                if row >= 0 && (row as usize) < self.n {
                    y[row as usize] += self.data[k * self.n + j] * xj;
                }
            }
        }
        Some(y)
    }

    /// CSR view, computed on first call
    pub fn csr(&self) -> &CsrMatrix {
        self.csr.get_or_init(|| CsrMatrix::from_banded(self))
    }

    /// True once the CSR view exists
    pub fn is_csr_cached(&self) -> bool {
        self.csr.get().is_some()
    }

    /// Dense row-major copy
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        (0..self.n)
            .map(|r| (0..self.n).map(|c| self.get(r, c)).collect())
            .collect()
    }
}

/// Compressed-sparse-row matrix
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    n: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    fn from_banded(matrix: &ResolutionMatrix) -> Self {
        let n = matrix.n;
        let half = matrix.ndiag / 2;
        let mut indptr = Vec::with_capacity(n + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);
        for row in 0..n {
            let start = row.saturating_sub(half);
            let end = (row + half + 1).min(n);
            for col in start..end {
                indices.push(col);
                values.push(matrix.get(row, col));
            }
            indptr.push(indices.len());
        }
        Self {
            n,
            indptr,
            indices,
            values,
        }
    }

    /// Matrix dimension
    pub fn n(&self) -> usize {
        self.n
    }

    /// Stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Matrix-vector product; `None` unless `x.len() == n`
    pub fn dot(&self, x: &[f64]) -> Option<Vec<f64>> {
        if x.len() != self.n {
            return None;
        }
        let y = (0..self.n)
            .map(|row| {
                (self.indptr[row]..self.indptr[row + 1])
                    .map(|i| self.values[i] * x[self.indices[i]])
                    .sum()
            })
            .collect();
        Some(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_count() {
        assert_eq!(band_count(2.0), 9);
        assert_eq!(band_count(1.2), 9);
        assert_eq!(band_count(0.5), 5);
        assert_eq!(band_count(FALLBACK_DISPERSION), 9);
    }

    #[test]
    fn test_sanitize_dispersion() {
        let mut wdisp = ndarray::array![[0.0, 1e-6, f64::NAN, 1.3]];
        sanitize_dispersion(&mut wdisp);
        assert_eq!(wdisp.row(0).to_vec(), vec![2.0, 2.0, 2.0, 1.3]);
        assert_eq!(exposure_band_count(&wdisp), 9);
    }

    #[test]
    fn test_columns_sum_to_one() {
        let wdisp: Vec<f64> = (0..40).map(|i| 0.8 + 0.05 * i as f64).collect();
        let ndiag = band_count(wdisp.iter().cloned().fold(0.0, f64::max));
        let matrix = ResolutionMatrix::from_dispersion(&wdisp, ndiag);
        for sum in matrix.column_sums() {
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_band_layout() {
        let matrix = ResolutionMatrix::from_dispersion(&[1.0; 6], 5);
        assert_eq!(matrix.offsets(), vec![2, 1, 0, -1, -2]);
        // offset 2 has no entries in the first two columns
        assert_eq!(&matrix.band(0)[..2], &[0.0, 0.0]);
        // offset -2 has no entries in the last two columns
        assert_eq!(&matrix.band(4)[4..], &[0.0, 0.0]);
        assert!(matrix.get(0, 2) > 0.0);
        assert_eq!(matrix.get(0, 3), 0.0);
        // symmetric widths give a symmetric interior
        assert!((matrix.get(2, 3) - matrix.get(3, 2)).abs() < 1e-12);
    }

    #[test]
    fn test_csr_matches_banded() {
        let wdisp: Vec<f64> = (0..25).map(|i| 1.0 + (i % 3) as f64 * 0.4).collect();
        let matrix = ResolutionMatrix::from_dispersion(&wdisp, 9);
        assert!(!matrix.is_csr_cached());

        let x: Vec<f64> = (0..25).map(|i| (i as f64 * 0.3).cos()).collect();
        let banded = matrix.dot(&x).unwrap();
        let csr = matrix.csr().dot(&x).unwrap();
        assert!(matrix.is_csr_cached());
        for (a, b) in banded.iter().zip(&csr) {
            assert!((a - b).abs() < 1e-12);
        }

        let dense = matrix.to_dense();
        let expected: Vec<f64> = dense
            .iter()
            .map(|row| row.iter().zip(&x).map(|(a, b)| a * b).sum())
            .collect();
        for (a, b) in banded.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_flux_conserved_by_dot() {
        let matrix = ResolutionMatrix::from_dispersion(&[1.5; 30], band_count(1.5));
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let total: f64 = matrix.dot(&x).unwrap().iter().sum();
        assert!((total - x.iter().sum::<f64>()).abs() < 1e-9);
    }

    #[test]
    fn test_dot_rejects_wrong_length() {
        let matrix = ResolutionMatrix::from_dispersion(&[1.0; 6], 5);
        let short = [1.0; 5];
        let long = [1.0; 7];
        assert_eq!(matrix.dot(&short), None);
        assert_eq!(matrix.dot(&long), None);
        assert_eq!(matrix.csr().dot(&short), None);
        assert_eq!(matrix.csr().dot(&long), None);
        assert_eq!(matrix.dot(&[1.0; 6]).map(|y| y.len()), Some(6));
    }

    #[test]
    fn test_eager_csr() {
        let matrix = ResolutionMatrix::from_dispersion(&[1.0; 4], 5).with_cached_csr();
        assert!(matrix.is_csr_cached());
        assert_eq!(matrix.csr().nnz(), 3 + 4 + 4 + 3);
    }
}
