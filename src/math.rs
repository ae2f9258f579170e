//! Small statistics helpers shared across the pipeline.

use ordered_float::OrderedFloat;

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Returns 0.0 when fewer
/// than two values are given.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Median of a slice. Returns 0.0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by_key(|v| OrderedFloat(*v));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation, scaled by 1/0.6745 so it estimates the
/// standard deviation for normally distributed data.
pub fn mad(values: &[f64]) -> f64 {
    let m = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations) / 0.6745
}

/// Root-mean-square deviation between two equal-length slices.
pub fn rmsd(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }
    let total: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (total / a.len() as f64).sqrt()
}

/// Flags outliers by modified z-score against the median.
///
/// A value is an outlier when `|x - median| / MAD > threshold` where MAD is
/// the raw median absolute deviation. All-false when the MAD is zero.
pub fn median_outliers(values: &[f64], threshold: f64) -> Vec<bool> {
    let m = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    let mdev = median(&deviations);
    if mdev == 0.0 {
        return vec![false; values.len()];
    }
    deviations.iter().map(|d| d / mdev > threshold).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert!((std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.138).abs() < 1e-3);
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn mad_of_constant_is_zero() {
        assert_eq!(mad(&[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn mad_matches_hand_computation() {
        // values: 1 2 3 4 100 -> median 3, deviations 2 1 0 1 97 -> median 1
        let v = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert!((mad(&v) - 1.0 / 0.6745).abs() < 1e-12);
    }

    #[test]
    fn outlier_flagging() {
        let v = [10.0, 10.1, 9.9, 10.0, 55.0];
        let flags = median_outliers(&v, 2.5);
        assert_eq!(flags, vec![false, false, false, false, true]);
    }

    #[test]
    fn outlier_flagging_degenerate_spread() {
        // zero MAD must not divide by zero
        let flags = median_outliers(&[2.0, 2.0, 2.0], 2.5);
        assert_eq!(flags, vec![false, false, false]);
    }
}
