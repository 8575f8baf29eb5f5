//! Percentile break points and right-inclusive binning

use soilmap_core::{Error, Result};

/// Percentile `p` (0..=100) of ascending `sorted` values, with linear
/// interpolation between the closest ranks: `rank = p/100 * (n-1)`.
///
/// NaN for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// `num_classes + 1` breaks at ranks 0, 100/N, ..., 100.
///
/// The first break is the minimum and the last the maximum of `values`.
///
/// # Errors
/// `InvalidParameter` for zero classes, `Validation` when `values` is empty.
pub fn percentile_breaks(values: &[f64], num_classes: usize) -> Result<Vec<f64>> {
    if num_classes == 0 {
        return Err(Error::InvalidParameter {
            name: "num_classes",
            value: "0".into(),
            reason: "at least one class is required".into(),
        });
    }
    if values.is_empty() {
        return Err(Error::Validation("no valid values to classify".into()));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Ok((0..=num_classes)
        .map(|i| {
            let p = if i == num_classes { 100.0 } else { 100.0 * i as f64 / num_classes as f64 };
            percentile(&sorted, p)
        })
        .collect())
}

/// Class of `value`: the `i` with `breaks[i] < value <= breaks[i+1]`.
///
/// Values on a break fall in the lower class; values at or below the
/// minimum land in class 0 and values above the maximum in the last class.
pub fn class_index(breaks: &[f64], value: f64) -> usize {
    let classes = breaks.len().saturating_sub(1);
    if classes == 0 {
        return 0;
    }
    breaks[1..]
        .partition_point(|&b| b < value)
        .min(classes - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&sorted, 0.0), 1.0);
        assert_relative_eq!(percentile(&sorted, 50.0), 2.5);
        assert_relative_eq!(percentile(&sorted, 25.0), 1.75);
        assert_relative_eq!(percentile(&sorted, 100.0), 4.0);
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_breaks_span_data() {
        let values: Vec<f64> = (0..=100).rev().map(|v| v as f64).collect();
        let breaks = percentile_breaks(&values, 4).unwrap();
        assert_eq!(breaks, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn test_right_inclusive_binning() {
        let breaks = [0.0, 25.0, 50.0, 75.0, 100.0];
        assert_eq!(class_index(&breaks, 0.0), 0);
        assert_eq!(class_index(&breaks, 25.0), 0);
        assert_eq!(class_index(&breaks, 25.0001), 1);
        assert_eq!(class_index(&breaks, 50.0), 1);
        assert_eq!(class_index(&breaks, 100.0), 3);
        assert_eq!(class_index(&breaks, 120.0), 3);
        assert_eq!(class_index(&breaks, -5.0), 0);
    }

    #[test]
    fn test_constant_values_collapse_to_first_class() {
        let breaks = percentile_breaks(&[3.0; 10], 5).unwrap();
        assert!(breaks.iter().all(|&b| b == 3.0));
        assert_eq!(class_index(&breaks, 3.0), 0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(percentile_breaks(&[1.0], 0), Err(Error::InvalidParameter { .. })));
        assert!(matches!(percentile_breaks(&[], 8), Err(Error::Validation(_))));
    }
}
