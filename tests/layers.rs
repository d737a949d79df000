use layers_rs::layer::forward_all;
use layers_rs::{Conv1d, Conv2d, Error, Flatten, Layer, Linear};
use ndarray::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn conv_flatten_linear_stack() {
    let mut rng = StdRng::seed_from_u64(21);
    let conv: Conv2d<f32> = Conv2d::new_with_rng(1, 4, (3, 3), (1, 1), (1, 1), true, &mut rng).unwrap();
    let flatten = Flatten::default();
    let linear: Linear<f32> = Linear::new_with_rng(4 * 8 * 8, 10, true, &mut rng).unwrap();
    let x = Array::<f32, _>::ones(IxDyn(&[5, 1, 8, 8]));

    let layers: [&dyn Layer<f32>; 3] = [&conv, &flatten, &linear];

    let y = forward_all(&layers, x.view()).unwrap();

    assert_eq!(y.shape(), &[5, 10]);
    // identical samples give identical rows
    let first = y.index_axis(Axis(0), 0);
    for row in y.outer_iter() {
        assert!(row.iter().zip(first.iter()).all(|(a, b)| (a - b).abs() < 1e-5));
    }
}

#[test]
fn stack_reports_rank_mismatch() {
    let conv = Conv1d::from_weights(Array3::<f64>::ones((2, 3, 3)), None, 1, 0).unwrap();
    let x = Array::<f64, _>::ones(IxDyn(&[3, 9]));

    let layers: [&dyn Layer<f64>; 1] = [&conv];

    let err = forward_all(&layers, x.view()).unwrap_err();

    assert!(matches!(err, Error::ShapeMismatch(_)));
}

#[test]
fn display_names() {
    let conv = Conv1d::from_weights(Array3::<f64>::ones((2, 3, 4)), Some(Array1::zeros(2)), 2, 1).unwrap();

    assert_eq!(
        conv.to_string(),
        "Conv1d(in_channels: 3, out_channels: 2, kernel_size: 4, stride: 2, padding: 1, bias: true)"
    );
    assert_eq!(Flatten::new(1, -1).to_string(), "Flatten(start_dim: 1, end_dim: -1)");
}
