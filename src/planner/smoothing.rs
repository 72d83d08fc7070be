//! 1-D Gaussian filtering with reflective boundaries.
//!
//! Weights are `exp(-i²/(2σ²))` over `±round(4σ)` samples, normalised to
//! sum to one. Samples beyond either end are mirrored about the edge
//! (`d c b a | a b c d | d c b a`), so a constant signal stays constant and
//! a bounded signal stays within its bounds.

/// Kernel truncation in standard deviations
const TRUNCATE: f64 = 4.0;

/// Smooth `values` with a Gaussian of standard deviation `sigma` (in samples).
///
/// `sigma <= 0` returns the input unchanged.
pub fn gaussian_filter1d(values: &[f64], sigma: f64) -> Vec<f64> {
    if values.is_empty() || !(sigma > 0.0) {
        return values.to_vec();
    }

    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let n = values.len();

    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| weight * values[reflect_index(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}

/// Normalised kernel of length `2 * radius + 1`
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / two_sigma_sq).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= total;
    }
    kernel
}

/// Map any index onto `0..n` by mirroring about the half-sample edges.
fn reflect_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let m = i.rem_euclid(2 * n);
    if m < n {
        m as usize
    } else {
        (2 * n - 1 - m) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_kernel_is_normalised_and_symmetric() {
        let kernel = gaussian_kernel(2.5);
        assert_eq!(kernel.len(), 2 * 10 + 1);
        assert_relative_eq!(kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for i in 0..kernel.len() / 2 {
            assert_relative_eq!(kernel[i], kernel[kernel.len() - 1 - i]);
        }
    }

    #[test]
    fn test_reflect_index() {
        let mapped: Vec<usize> = (-4..8).map(|i| reflect_index(i, 4)).collect();
        assert_eq!(mapped, vec![3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0]);
        // kernels wider than the signal keep folding
        assert_eq!(reflect_index(-9, 4), 0);
        assert_eq!(reflect_index(0, 1), 0);
        assert_eq!(reflect_index(-3, 1), 0);
    }

    #[test]
    fn test_constant_signal_unchanged() {
        let values = vec![3.25; 17];
        for v in gaussian_filter1d(&values, 10.0) {
            assert_relative_eq!(v, 3.25, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_non_positive_sigma_is_identity() {
        let values = vec![1.0, 5.0, -2.0];
        assert_eq!(gaussian_filter1d(&values, 0.0), values);
        assert_eq!(gaussian_filter1d(&values, -1.0), values);
        assert!(gaussian_filter1d(&[], 2.0).is_empty());
    }

    #[test]
    fn test_boundary_rows_use_reflection() {
        // sigma 0.5 -> radius 2; first output sees [x1 x0 | x0 x1 x2]
        let values = [0.0, 1.0, 2.0, 3.0, 4.0];
        let kernel = gaussian_kernel(0.5);
        let smoothed = gaussian_filter1d(&values, 0.5);

        let weighted =
            |window: [f64; 5]| -> f64 { kernel.iter().zip(window).map(|(k, v)| k * v).sum() };
        let expected_first = weighted([1.0, 0.0, 0.0, 1.0, 2.0]);
        let expected_last = weighted([2.0, 3.0, 4.0, 4.0, 3.0]);
        assert_relative_eq!(smoothed[0], expected_first, epsilon = 1e-12);
        assert_relative_eq!(smoothed[4], expected_last, epsilon = 1e-12);
        // interior of a ramp is preserved
        assert_relative_eq!(smoothed[2], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_step_stays_within_bounds() {
        let mut values = vec![0.0; 10];
        values.extend(vec![1.0; 30]);
        values.extend(vec![0.0; 10]);
        let smoothed = gaussian_filter1d(&values, 10.0);
        for v in &smoothed {
            assert!(*v >= 0.0 && *v <= 1.0 + 1e-12, "out of range: {v}");
        }
        // edge rows reflect the zeros, so they stay below the middle
        assert!(smoothed[0] < smoothed[25]);
        assert_abs_diff_eq!(smoothed[0], smoothed[49], epsilon = 1e-12);
    }
}
