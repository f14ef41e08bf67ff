//! One-dimensional interpolation kernels over ascending abscissae.
//!
//! Every kernel returns 0 for evaluation points outside `[x[0], x[n-1]]`.

/// Index of the segment `[x[j], x[j+1]]` holding `t`, assuming `x[0] <= t <= x[n-1]`
fn segment(x: &[f64], t: f64) -> usize {
    let upper = x.partition_point(|&v| v <= t);
    upper.saturating_sub(1).min(x.len().saturating_sub(2))
}

fn in_range(x: &[f64], t: f64) -> bool {
    match (x.first(), x.last()) {
        (Some(&lo), Some(&hi)) => t >= lo && t <= hi,
        _ => false,
    }
}

/// Piecewise-linear value at `t`
pub fn linear_at(x: &[f64], y: &[f64], t: f64) -> f64 {
    if !in_range(x, t) {
        return 0.0;
    }
    if x.len() == 1 {
        return y[0];
    }
    let j = segment(x, t);
    let h = x[j + 1] - x[j];
    if h == 0.0 {
        return y[j];
    }
    let f = (t - x[j]) / h;
    y[j] + f * (y[j + 1] - y[j])
}

/// Linear interpolation of `y(x)` at each `target` point
pub fn linear(x: &[f64], y: &[f64], target: &[f64]) -> Vec<f64> {
    target.iter().map(|&t| linear_at(x, y, t)).collect()
}

/// Nearest-sample interpolation; a point exactly halfway takes the lower sample
pub fn nearest(x: &[f64], y: &[f64], target: &[f64]) -> Vec<f64> {
    target
        .iter()
        .map(|&t| {
            if !in_range(x, t) {
                return 0.0;
            }
            if x.len() == 1 {
                return y[0];
            }
            let j = segment(x, t);
            if (x[j] + x[j + 1]) / 2.0 < t {
                y[j + 1]
            } else {
                y[j]
            }
        })
        .collect()
}

/// Integral of the piecewise-linear `y(x)` from `x[0]` to each sample
fn cumulative_integral(x: &[f64], y: &[f64]) -> Vec<f64> {
    let mut cum = Vec::with_capacity(x.len());
    let mut total = 0.0;
    cum.push(0.0);
    for j in 1..x.len() {
        total += (x[j] - x[j - 1]) * (y[j] + y[j - 1]) / 2.0;
        cum.push(total);
    }
    cum
}

/// Integral from `x[0]` to `t` for `t` inside the sampled range
fn integral_to(x: &[f64], y: &[f64], cum: &[f64], t: f64) -> f64 {
    let j = segment(x, t);
    cum[j] + (t - x[j]) * (y[j] + linear_at(x, y, t)) / 2.0
}

/// Bin-averaged rebinning of a piecewise-linear function.
///
/// Bin `k` spans `edges[k]..edges[k+1]`. Bins whose edges are not both
/// strictly inside `(x[0], x[n-1])` are left at 0; every other bin holds the
/// integral over the bin divided by its width.
pub fn integrate_bins(x: &[f64], y: &[f64], edges: &[f64]) -> Vec<f64> {
    let nbins = edges.len().saturating_sub(1);
    let mut out = vec![0.0; nbins];
    let (Some(&lo), Some(&hi)) = (x.first(), x.last()) else {
        return out;
    };
    if x.len() < 2 {
        return out;
    }

    let cum = cumulative_integral(x, y);
    for (k, bin) in edges.windows(2).enumerate() {
        let (a, b) = (bin[0], bin[1]);
        if a > lo && b < hi && b > a {
            out[k] = (integral_to(x, y, &cum, b) - integral_to(x, y, &cum, a)) / (b - a);
        }
    }
    out
}
