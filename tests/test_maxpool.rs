// Integration tests for max pooling.
// Backward must route each output gradient to exactly the input selected by
// the paired forward pass.

use seqnet::layers::{Differentiable, Maxpool, MaxpoolShape};

fn pool(channels: usize, height: usize, width: usize, size: usize, stride: usize) -> Maxpool {
    Maxpool::new(MaxpoolShape {
        channels,
        height,
        width,
        pool_height: size,
        pool_width: size,
        stride_height: stride,
        stride_width: stride,
    })
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn test_backward_routes_to_selected_only() {
    let mut layer = pool(1, 4, 4, 2, 2);
    #[rustfmt::skip]
    let input = [
        1.0, 2.0,   0.0, -1.0,
        4.0, 3.0,   5.0,  0.5,

        0.0, 0.0,   9.0,  8.0,
        0.0, 0.1,   7.0,  6.0,
    ];
    let mut output = [0.0; 4];
    layer.forward(&input, &mut output);
    assert_eq!(output, [4.0, 5.0, 0.1, 9.0]);
    assert_eq!(layer.selected(), &[4, 6, 13, 10]);

    let grad_output = [10.0, 20.0, 30.0, 40.0];
    let mut grad_input = [f64::NAN; 16];
    layer.backward(&input, &grad_output, &mut grad_input);

    for (i, g) in grad_input.iter().enumerate() {
        let expected = match i {
            4 => 10.0,
            6 => 20.0,
            13 => 30.0,
            10 => 40.0,
            _ => 0.0,
        };
        assert_eq!(*g, expected, "grad_input[{}]", i);
    }
}

#[test]
fn test_tie_routes_to_first_index() {
    let mut layer = pool(1, 2, 2, 2, 2);
    let input = [-1.0, 7.0, 7.0, 7.0];
    let mut output = [0.0];
    layer.forward(&input, &mut output);
    assert_eq!(output, [7.0]);

    let mut grad_input = [0.0; 4];
    layer.backward(&input, &[1.0], &mut grad_input);
    assert_eq!(grad_input, [0.0, 1.0, 0.0, 0.0]);
}

#[test]
fn test_channels_pool_independently() {
    let mut layer = pool(2, 2, 2, 2, 2);
    let input = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0];
    let mut output = [0.0; 2];
    layer.forward(&input, &mut output);
    assert_eq!(output, [1.0, 2.0]);
    assert_eq!(layer.selected(), &[0, 7]);
}

#[test]
fn test_overlapping_windows_sum_gradients() {
    let mut layer = pool(1, 3, 3, 2, 1);
    #[rustfmt::skip]
    let input = [
        0.0, 0.0, 0.0,
        0.0, 9.0, 0.0,
        0.0, 0.0, 0.0,
    ];
    let mut output = [0.0; 4];
    layer.forward(&input, &mut output);
    assert_eq!(output, [9.0; 4]);

    let mut grad_input = [0.0; 9];
    layer.backward(&input, &[1.0, 2.0, 3.0, 4.0], &mut grad_input);
    assert_eq!(grad_input[4], 10.0);
    assert_eq!(grad_input.iter().sum::<f64>(), 10.0);
}

#[test]
fn test_backward_follows_latest_forward() {
    let mut layer = pool(1, 1, 2, 1, 1);
    let mut wide = Maxpool::new(MaxpoolShape::non_overlapping(1, 1, 4, 1, 2));
    let mut output = [0.0; 2];

    wide.forward(&[5.0, 1.0, 1.0, 5.0], &mut output);
    wide.forward(&[1.0, 5.0, 5.0, 1.0], &mut output);
    let mut grad_input = [0.0; 4];
    wide.backward(&[0.0; 4], &[1.0, 1.0], &mut grad_input);
    assert_eq!(grad_input, [0.0, 1.0, 1.0, 0.0]);

    // 1x1 windows are the identity.
    layer.forward(&[3.0, 4.0], &mut output);
    assert_eq!(output, [3.0, 4.0]);
}

#[test]
#[should_panic(expected = "input len mismatch")]
fn test_forward_rejects_wrong_input_width() {
    let mut layer = pool(1, 2, 2, 2, 2);
    let mut output = [0.0];
    layer.forward(&[1.0, 2.0, 3.0], &mut output);
}
