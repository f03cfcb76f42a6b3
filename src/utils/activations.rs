//! Activation functions shared by the pointwise layers.
//!
//! - Sigmoid and its derivative expressed through the sigmoid output
//! - ReLU and its derivative
//! - Softmax over a single vector, with max-subtraction for stability

/// Sigmoid activation function.
///
/// Returns the sigmoid of the input: 1 / (1 + exp(-x))
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Sigmoid derivative assuming y = sigmoid(x).
///
/// Returns the derivative: y * (1 - y)
pub fn sigmoid_derivative(y: f64) -> f64 {
    y * (1.0 - y)
}

/// ReLU activation function.
pub fn relu(x: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        0.0
    }
}

/// ReLU derivative evaluated at the pre-activation input (0 at the kink).
pub fn relu_derivative(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Softmax of `input` written into `output`.
///
/// Uses the max-subtraction trick to avoid overflow with large values.
///
/// # Panics
///
/// Panics if `input` and `output` lengths differ.
pub fn softmax(input: &[f64], output: &mut [f64]) {
    assert_eq!(
        input.len(),
        output.len(),
        "softmax length mismatch: input {}, output {}",
        input.len(),
        output.len()
    );
    if input.is_empty() {
        return;
    }

    let max_value = input.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut sum = 0.0;
    for (out, &value) in output.iter_mut().zip(input) {
        *out = (value - max_value).exp();
        sum += *out;
    }

    let inv_sum = 1.0 / sum;
    for out in output.iter_mut() {
        *out *= inv_sum;
    }
}
