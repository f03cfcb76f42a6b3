//! Softmax + cross-entropy helpers used by the classifier.

use crate::layers::r#trait::check_len;

/// Lower bound applied to `p[label]` before taking the logarithm.
pub const PROBABILITY_FLOOR: f64 = 1e-300;

/// Index of the largest value. Ties go to the first maximum; an empty slice
/// yields 0.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// `-ln(max(p[label], PROBABILITY_FLOOR))`.
///
/// # Panics
///
/// Panics if `label` is out of range.
pub fn cross_entropy(probabilities: &[f64], label: usize) -> f64 {
    -probabilities[label].max(PROBABILITY_FLOOR).ln()
}

/// Gradient of cross-entropy with respect to the softmax *input*:
/// `p - one_hot(label)`.
///
/// # Example
///
/// ```
/// use seqnet::loss::softmax_cross_entropy_gradient;
///
/// let mut gradient = [0.0; 3];
/// softmax_cross_entropy_gradient(&[0.2, 0.5, 0.3], 1, &mut gradient);
/// assert_eq!(gradient, [0.2, -0.5, 0.3]);
/// ```
pub fn softmax_cross_entropy_gradient(probabilities: &[f64], label: usize, gradient: &mut [f64]) {
    check_len("gradient", gradient.len(), probabilities.len());
    gradient.copy_from_slice(probabilities);
    gradient[label] -= 1.0;
}

/// Gradient of cross-entropy with respect to the probabilities themselves:
/// `-1 / p[label]` at `label`, zero elsewhere.
pub fn cross_entropy_gradient(probabilities: &[f64], label: usize, gradient: &mut [f64]) {
    check_len("gradient", gradient.len(), probabilities.len());
    gradient.fill(0.0);
    gradient[label] = -1.0 / probabilities[label].max(PROBABILITY_FLOOR);
}

/// `Jᵀ · upstream` for the softmax Jacobian `J[i][j] = p[i] (δij - p[j])`
/// evaluated at `probabilities`.
pub fn softmax_jacobian_product(probabilities: &[f64], upstream: &[f64], output: &mut [f64]) {
    check_len("upstream", upstream.len(), probabilities.len());
    check_len("output", output.len(), probabilities.len());
    let weighted: f64 = probabilities.iter().zip(upstream).map(|(p, u)| p * u).sum();
    for ((out, &p), &u) in output.iter_mut().zip(probabilities).zip(upstream) {
        *out = p * (u - weighted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[3.0]), 0);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn test_cross_entropy_floor() {
        let loss = cross_entropy(&[1.0, 0.0], 1);
        assert!(loss.is_finite());
        assert!((loss - 300.0 * std::f64::consts::LN_10).abs() < 1e-9);
    }

    #[test]
    fn test_cross_entropy_value() {
        let loss = cross_entropy(&[0.25, 0.75], 0);
        assert!((loss - 4.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_jacobian_product_sums_to_zero() {
        let p = [0.1, 0.6, 0.3];
        let mut out = [0.0; 3];
        softmax_jacobian_product(&p, &[1.0, -2.0, 0.5], &mut out);
        let sum: f64 = out.iter().sum();
        assert!(sum.abs() < 1e-12);
    }
}
