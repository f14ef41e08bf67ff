/// Natural cubic spline through strictly ascending knots.
///
/// Each segment is `a + b*dx + c*dx^2 + d*dx^3` with `dx = x - x[i]`; the
/// second derivative vanishes at both ends. Evaluation outside the knot range
/// returns 0.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    coeffs: Vec<[f64; 4]>,
}

impl CubicSpline {
    /// Fit a spline; `None` with fewer than two knots, mismatched lengths or
    /// knots that are not strictly ascending
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Option<Self> {
        let n = x.len();
        if n < 2 || y.len() != n || x.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }

        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let mut alpha = vec![0.0; n - 1];
        for i in 1..n - 1 {
            alpha[i] = 3.0 / h[i] * (y[i + 1] - y[i]) - 3.0 / h[i - 1] * (y[i] - y[i - 1]);
        }

        // Thomas algorithm for the second-derivative system
        let mut l = vec![1.0; n];
        let mut mu = vec![0.0; n];
        let mut z = vec![0.0; n];
        for i in 1..n - 1 {
            l[i] = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / l[i];
            z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
        }

        let mut c = vec![0.0; n];
        let mut coeffs = vec![[0.0; 4]; n - 1];
        for j in (0..n - 1).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            let b = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
            let d = (c[j + 1] - c[j]) / (3.0 * h[j]);
            coeffs[j] = [y[j], b, c[j], d];
        }

        Some(Self { x, coeffs })
    }

    /// Spline value at `t`, 0 outside the knot range
    pub fn evaluate(&self, t: f64) -> f64 {
        let (first, last) = (self.x[0], self.x[self.x.len() - 1]);
        if !(t >= first && t <= last) {
            return 0.0;
        }
        let upper = self.x.partition_point(|&v| v <= t);
        let segment = upper.saturating_sub(1).min(self.coeffs.len() - 1);
        let dx = t - self.x[segment];
        let [a, b, c, d] = self.coeffs[segment];
        a + dx * (b + dx * (c + dx * d))
    }
}
