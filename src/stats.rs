//! Small descriptive-statistics helpers shared by the detectors.

use statrs::statistics::Statistics;

/// Mean and population standard deviation. Empty input yields `(0, 0)`.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    (values.mean(), values.population_std_dev())
}

/// Coefficient of variation (std / mean). Zero when the mean is not positive.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let (mean, std) = mean_std(values);
    if mean > 0.0 {
        std / mean
    } else {
        0.0
    }
}

/// Pearson correlation. `None` when either series has zero variance or the
/// lengths differ.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let sx = xs.population_std_dev();
    let sy = ys.population_std_dev();
    if sx == 0.0 || sy == 0.0 {
        return None;
    }
    let cov = xs.population_covariance(ys);
    Some((cov / (sx * sy)).clamp(-1.0, 1.0))
}

/// Percentile with linear interpolation between closest ranks, `q` in [0, 100].
/// statrs' quantile estimator uses a different rank rule, and the outlier
/// offset and large-trade cut are calibrated against this one.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Standardize each column of a row-major matrix to zero mean and unit variance.
/// Constant columns become all zeros.
pub fn standardize(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let Some(width) = rows.first().map(|r| r.len()) else {
        return Vec::new();
    };

    let mut out = rows.to_vec();
    for col in 0..width {
        let column: Vec<f64> = rows.iter().map(|r| r[col]).collect();
        let (mean, std) = mean_std(&column);
        let scale = if std > 0.0 { std } else { 1.0 };
        for row in out.iter_mut() {
            row[col] = (row[col] - mean) / scale;
        }
    }
    out
}
