//! Max-pooling layer.

use crate::layers::r#trait::{check_len, Differentiable};
use serde::{Deserialize, Serialize};

/// Geometry of a max-pooling layer over `channels × height × width` input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxpoolShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub pool_height: usize,
    pub pool_width: usize,
    pub stride_height: usize,
    pub stride_width: usize,
}

impl MaxpoolShape {
    /// Non-overlapping windows: stride equals the pool extent.
    pub fn non_overlapping(
        channels: usize,
        height: usize,
        width: usize,
        pool_height: usize,
        pool_width: usize,
    ) -> Self {
        Self {
            channels,
            height,
            width,
            pool_height,
            pool_width,
            stride_height: pool_height,
            stride_width: pool_width,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.channels > 0
            && self.pool_height > 0
            && self.pool_width > 0
            && self.stride_height > 0
            && self.stride_width > 0
            && self.pool_height <= self.height
            && self.pool_width <= self.width
    }

    pub fn output_height(&self) -> usize {
        (self.height - self.pool_height) / self.stride_height + 1
    }

    pub fn output_width(&self) -> usize {
        (self.width - self.pool_width) / self.stride_width + 1
    }

    pub fn input_len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn output_len(&self) -> usize {
        self.channels * self.output_height() * self.output_width()
    }
}

/// Max-pooling layer.
///
/// Each forward call records, per output position, the flat input index that
/// held the window maximum (the first one in row-major window order on ties).
/// The paired backward call routes the output gradient to exactly those
/// positions and leaves every other input gradient at zero.
#[derive(Debug, Clone)]
pub struct Maxpool {
    shape: MaxpoolShape,
    selected: Vec<usize>,
}

impl Maxpool {
    /// # Panics
    ///
    /// Panics if `shape` is not valid.
    pub fn new(shape: MaxpoolShape) -> Self {
        assert!(shape.is_valid(), "invalid maxpool geometry: {:?}", shape);
        Self {
            shape,
            selected: vec![0; shape.output_len()],
        }
    }

    pub fn shape(&self) -> &MaxpoolShape {
        &self.shape
    }

    /// Input indices selected by the most recent forward call.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }
}

impl Differentiable for Maxpool {
    fn forward(&mut self, input: &[f64], output: &mut [f64]) {
        let s = self.shape;
        check_len("input", input.len(), s.input_len());
        check_len("output", output.len(), s.output_len());

        let (out_h, out_w) = (s.output_height(), s.output_width());
        for c in 0..s.channels {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let y0 = oy * s.stride_height;
                    let x0 = ox * s.stride_width;
                    let mut best = (c * s.height + y0) * s.width + x0;
                    for y in y0..y0 + s.pool_height {
                        for x in x0..x0 + s.pool_width {
                            let idx = (c * s.height + y) * s.width + x;
                            if input[idx] > input[best] {
                                best = idx;
                            }
                        }
                    }
                    let out_idx = (c * out_h + oy) * out_w + ox;
                    self.selected[out_idx] = best;
                    output[out_idx] = input[best];
                }
            }
        }
    }

    fn backward(&mut self, _input: &[f64], grad_output: &[f64], grad_input: &mut [f64]) {
        check_len("grad_output", grad_output.len(), self.shape.output_len());
        check_len("grad_input", grad_input.len(), self.shape.input_len());

        grad_input.fill(0.0);
        // Overlapping windows may select the same input; contributions add.
        for (&idx, &g) in self.selected.iter().zip(grad_output) {
            grad_input[idx] += g;
        }
    }

    fn input_size(&self) -> usize {
        self.shape.input_len()
    }

    fn output_size(&self) -> usize {
        self.shape.output_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maxpool_dimensions() {
        let shape = MaxpoolShape::non_overlapping(6, 28, 28, 2, 2);
        assert_eq!(shape.output_len(), 6 * 14 * 14);
        let pool = Maxpool::new(shape);
        assert_eq!(pool.input_size(), 6 * 28 * 28);
        assert_eq!(pool.parameter_count(), 0);
    }

    #[test]
    fn test_maxpool_forward_selects_max() {
        let mut pool = Maxpool::new(MaxpoolShape::non_overlapping(1, 2, 4, 2, 2));
        let input = [1.0, 5.0, 2.0, 0.0, 3.0, 4.0, 7.0, 6.0];
        let mut output = [0.0; 2];
        pool.forward(&input, &mut output);
        assert_eq!(output, [5.0, 7.0]);
        assert_eq!(pool.selected(), &[1, 6]);
    }

    #[test]
    fn test_maxpool_tie_takes_first() {
        let mut pool = Maxpool::new(MaxpoolShape::non_overlapping(1, 2, 2, 2, 2));
        let mut output = [0.0];
        pool.forward(&[3.0, 3.0, 3.0, 3.0], &mut output);
        assert_eq!(pool.selected(), &[0]);
    }

    #[test]
    fn test_maxpool_overlapping_windows_accumulate() {
        let shape = MaxpoolShape {
            channels: 1,
            height: 1,
            width: 3,
            pool_height: 1,
            pool_width: 2,
            stride_height: 1,
            stride_width: 1,
        };
        let mut pool = Maxpool::new(shape);
        let input = [0.0, 9.0, 1.0];
        let mut output = [0.0; 2];
        pool.forward(&input, &mut output);
        let mut grad_input = [0.0; 3];
        pool.backward(&input, &[1.0, 2.0], &mut grad_input);
        assert_eq!(grad_input, [0.0, 3.0, 0.0]);
    }
}
