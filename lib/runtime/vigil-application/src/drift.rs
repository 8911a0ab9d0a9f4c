//! Distribution-shift scoring between the training baseline and live traffic.

use std::cmp::Ordering;

/// Two-sample Kolmogorov-Smirnov statistic: the largest gap between the two
/// empirical CDFs. Always within `[0, 1]`; `0.0` if either sample is empty.
/// Non-finite values are ignored.
pub fn ks_statistic(reference: &[f64], recent: &[f64]) -> f64 {
    let reference = sorted_finite(reference);
    let recent = sorted_finite(recent);
    if reference.is_empty() || recent.is_empty() {
        return 0.0;
    }

    let (n1, n2) = (reference.len() as f64, recent.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut statistic: f64 = 0.0;
    while i < reference.len() && j < recent.len() {
        let x = reference[i].min(recent[j]);
        while i < reference.len() && reference[i] <= x {
            i += 1;
        }
        while j < recent.len() && recent[j] <= x {
            j += 1;
        }
        statistic = statistic.max((i as f64 / n1 - j as f64 / n2).abs());
    }
    statistic.clamp(0.0, 1.0)
}

/// Largest per-feature KS statistic across all feature columns present in
/// both samples.
pub fn drift_score(baseline: &[Vec<f64>], recent: &[Vec<f64>]) -> f64 {
    let columns = baseline
        .iter()
        .chain(recent.iter())
        .map(Vec::len)
        .max()
        .unwrap_or(0);

    (0..columns)
        .map(|column| {
            let reference = column_values(baseline, column);
            let current = column_values(recent, column);
            ks_statistic(&reference, &current)
        })
        .fold(0.0, f64::max)
}

fn column_values(rows: &[Vec<f64>], column: usize) -> Vec<f64> {
    rows.iter().filter_map(|row| row.get(column).copied()).collect()
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}
