//! Stochastic Gradient Descent (SGD) update rule
//!
//! Applies `parameter -= learning_rate * accumulated_gradient / batch_size`,
//! the plain unregularised mini-batch step used by every parametric layer.

/// Mini-batch stochastic gradient descent.
///
/// Gradients handed to [`Sgd::step`] are sums over a mini-batch; the step
/// divides by the batch size so the update uses the batch mean.
///
/// # Example
///
/// ```
/// use seqnet::optimizers::Sgd;
///
/// let sgd = Sgd::new(0.1);
/// let mut weights = vec![1.0, 2.0];
/// sgd.step(&mut weights, &[0.2, 0.4], 2);
/// assert!((weights[0] - 0.99).abs() < 1e-12);
/// assert!((weights[1] - 1.98).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    learning_rate: f64,
}

impl Sgd {
    /// Creates a new SGD rule with the specified learning rate.
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    /// Get the learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Update parameters in place from batch-summed gradients.
    ///
    /// # Panics
    ///
    /// Panics if `parameters` and `gradients` have different lengths or if
    /// `batch_size` is zero.
    pub fn step(&self, parameters: &mut [f64], gradients: &[f64], batch_size: usize) {
        assert_eq!(
            parameters.len(),
            gradients.len(),
            "Parameters and gradients must have the same length"
        );
        assert!(batch_size > 0, "batch_size must be greater than 0");

        let scale = self.learning_rate / batch_size as f64;
        for (param, grad) in parameters.iter_mut().zip(gradients) {
            *param -= scale * grad;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgd_single_sample() {
        let sgd = Sgd::new(0.1);
        let mut params = vec![1.0, 2.0, 3.0];
        sgd.step(&mut params, &[0.1, 0.2, 0.3], 1);

        assert!((params[0] - 0.99).abs() < 1e-12);
        assert!((params[1] - 1.98).abs() < 1e-12);
        assert!((params[2] - 2.97).abs() < 1e-12);
    }

    #[test]
    fn test_sgd_averages_over_batch() {
        let sgd = Sgd::new(1.0);
        let mut params = vec![0.0];
        sgd.step(&mut params, &[4.0], 4);
        assert!((params[0] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sgd_zero_learning_rate() {
        let sgd = Sgd::new(0.0);
        let mut params = vec![1.5, -2.5];
        sgd.step(&mut params, &[10.0, -10.0], 1);
        assert_eq!(params, vec![1.5, -2.5]);
    }

    #[test]
    #[should_panic(expected = "Parameters and gradients must have the same length")]
    fn test_sgd_length_mismatch() {
        let sgd = Sgd::new(0.1);
        let mut params = vec![1.0, 2.0];
        sgd.step(&mut params, &[0.1], 1);
    }
}
