//! Pearson correlation between weather and commit volume over the daily series.

use serde::Serialize;
use utoipa::ToSchema;

use super::metrics::DailyMetric;

/// Pearson coefficients against daily commit count. Each is in [-1, 1],
/// or exactly 0 when either series is degenerate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResult {
    pub temp_vs_commits: f64,
    pub precip_vs_commits: f64,
    pub daylight_vs_commits: f64,
}

/// Pearson correlation coefficient of two paired series.
///
/// Uses the mean-centred two-pass form. Returns 0 when fewer than two pairs
/// exist, when either series is constant, or when the result would not be
/// finite. Extra trailing values of the longer series are ignored.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    if is_constant(x) || is_constant(y) {
        return 0.0;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denominator = (sxx * syy).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let r = sxy / denominator;
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Correlate temperature, precipitation and daylight with commit count.
/// An empty series yields all zeros.
pub fn correlate(metrics: &[DailyMetric]) -> CorrelationResult {
    if metrics.is_empty() {
        return CorrelationResult::default();
    }

    let commits: Vec<f64> = metrics.iter().map(|m| m.commit_count as f64).collect();
    let temps: Vec<f64> = metrics.iter().map(|m| m.temp).collect();
    let precip: Vec<f64> = metrics.iter().map(|m| m.precipitation).collect();
    let daylight: Vec<f64> = metrics.iter().map(|m| m.daylight_hours).collect();

    CorrelationResult {
        temp_vs_commits: pearson(&temps, &commits),
        precip_vs_commits: pearson(&precip, &commits),
        daylight_vs_commits: pearson(&daylight, &commits),
    }
}
