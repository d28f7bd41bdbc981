//! Tests for Conv2DLayer forward and backward passes
//!
//! - all-ones input: every output equals bias + sum(kernel)
//! - multi-channel accumulation and forward idempotence
//! - backward shapes, gradient values and the learning-rate scaled bias update

use approx::assert_relative_eq;
use rust_conv_net::layers::Conv2DLayer;
use rust_conv_net::tensor::Tensor;
use rust_conv_net::utils::correlation::{full_convolve, valid_cross_correlate};
use rust_conv_net::utils::SimpleRng;
use rust_conv_net::NetworkError;

fn kernel_plane(layer: &Conv2DLayer, i: usize, j: usize) -> Tensor {
    let k = layer.kernel_size();
    let offset = (i * layer.in_channels() + j) * k * k;
    Tensor::new(vec![k, k], layer.kernels().data()[offset..offset + k * k].to_vec()).unwrap()
}

fn channel(t: &Tensor, index: usize) -> Tensor {
    let shape = t.shape();
    Tensor::new(vec![shape[1], shape[2]], t.slab(index).to_vec()).unwrap()
}

mod forward_tests {
    use super::*;

    #[test]
    fn test_all_ones_input() {
        let mut rng = SimpleRng::new(42);
        let mut layer = Conv2DLayer::new((1, 6, 6), 2, 3, &mut rng).unwrap();
        let output = layer.forward(&Tensor::filled(&[1, 6, 6], 1.0)).unwrap();

        assert_eq!(output.shape(), &[2, 4, 4]);
        for i in 0..2 {
            let kernel_sum = kernel_plane(&layer, i, 0).sum();
            let out = output.slab(i);
            let bias = layer.biases().slab(i);
            for p in 0..16 {
                assert_relative_eq!(out[p], bias[p] + kernel_sum, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_accumulates_over_input_channels() {
        let mut rng = SimpleRng::new(3);
        let mut layer = Conv2DLayer::new((3, 7, 7), 2, 3, &mut rng).unwrap();
        let input = Tensor::from_fn(&[3, 7, 7], || rng.next_f64());
        let output = layer.forward(&input).unwrap();

        for i in 0..2 {
            let mut expected = channel(layer.biases(), i);
            for j in 0..3 {
                let part = valid_cross_correlate(&channel(&input, j), &kernel_plane(&layer, i, j))
                    .unwrap();
                expected = expected.zip_map(&part, "test", |a, b| a + b).unwrap();
            }
            for (a, b) in output.slab(i).iter().zip(expected.data()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_output_is_not_activated() {
        // With all-zero input the output is exactly the bias, not sigmoid(bias).
        let mut rng = SimpleRng::new(8);
        let mut layer = Conv2DLayer::new((1, 5, 5), 1, 2, &mut rng).unwrap();
        let output = layer.forward(&Tensor::zeros(&[1, 5, 5])).unwrap();
        assert_eq!(&output, layer.biases());
    }

    #[test]
    fn test_wrong_input_shape() {
        let mut rng = SimpleRng::new(42);
        let mut layer = Conv2DLayer::new((1, 6, 6), 2, 3, &mut rng).unwrap();
        let err = layer.forward(&Tensor::zeros(&[1, 5, 6])).unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { .. }));
        assert!(layer.forward(&Tensor::zeros(&[2, 6, 6])).is_err());
    }

    #[test]
    fn test_forward_twice_is_idempotent() {
        let mut rng = SimpleRng::new(21);
        let mut layer = Conv2DLayer::new((1, 28, 28), 7, 5, &mut rng).unwrap();
        let kernels_before = layer.kernels().clone();
        let biases_before = layer.biases().clone();

        let input = Tensor::from_fn(&[1, 28, 28], || rng.next_f64());
        let first = layer.forward(&input).unwrap();
        let second = layer.forward(&input).unwrap();

        assert_eq!(first, second);
        assert_eq!(layer.kernels(), &kernels_before);
        assert_eq!(layer.biases(), &biases_before);
    }
}

mod backward_tests {
    use super::*;

    #[test]
    fn test_backward_shapes() {
        let mut rng = SimpleRng::new(4);
        let mut layer = Conv2DLayer::new((2, 9, 9), 3, 4, &mut rng).unwrap();
        let input = Tensor::from_fn(&[2, 9, 9], || rng.next_f64());
        layer.forward(&input).unwrap();

        let gradient = Tensor::from_fn(&[3, 6, 6], || rng.gen_range_f64(-1.0, 1.0));
        let grads = layer.gradients(&gradient).unwrap();
        assert_eq!(grads.kernels.shape(), &[3, 2, 4, 4]);
        assert_eq!(grads.input.shape(), &[2, 9, 9]);

        let input_grad = layer.backward(&gradient, 0.01).unwrap();
        assert_eq!(input_grad.shape(), input.shape());
    }

    #[test]
    fn test_gradients_match_primitives() {
        let mut rng = SimpleRng::new(10);
        let mut layer = Conv2DLayer::new((2, 6, 6), 2, 3, &mut rng).unwrap();
        let input = Tensor::from_fn(&[2, 6, 6], || rng.next_f64());
        layer.forward(&input).unwrap();
        let gradient = Tensor::from_fn(&[2, 4, 4], || rng.gen_range_f64(-1.0, 1.0));

        let grads = layer.gradients(&gradient).unwrap();

        for i in 0..2 {
            for j in 0..2 {
                let expected =
                    valid_cross_correlate(&channel(&input, j), &channel(&gradient, i)).unwrap();
                let offset = (i * 2 + j) * 9;
                for p in 0..9 {
                    assert_relative_eq!(
                        grads.kernels.data()[offset + p],
                        expected.data()[p],
                        epsilon = 1e-12
                    );
                }
            }
        }

        for j in 0..2 {
            let mut expected = Tensor::zeros(&[6, 6]);
            for i in 0..2 {
                let part = full_convolve(&channel(&gradient, i), &kernel_plane(&layer, i, j))
                    .unwrap();
                expected = expected.zip_map(&part, "test", |a, b| a + b).unwrap();
            }
            for (a, b) in grads.input.slab(j).iter().zip(expected.data()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_kernel_update_and_bias_update_share_learning_rate() {
        let mut rng = SimpleRng::new(77);
        let mut layer = Conv2DLayer::new((1, 5, 5), 2, 3, &mut rng).unwrap();
        let input = Tensor::from_fn(&[1, 5, 5], || rng.next_f64());
        layer.forward(&input).unwrap();
        let gradient = Tensor::from_fn(&[2, 3, 3], || rng.gen_range_f64(-1.0, 1.0));

        let kernels_before = layer.kernels().clone();
        let biases_before = layer.biases().clone();
        let expected = layer.gradients(&gradient).unwrap();

        let lr = 0.05;
        layer.backward(&gradient, lr).unwrap();

        for (p, (after, before)) in layer
            .kernels()
            .data()
            .iter()
            .zip(kernels_before.data())
            .enumerate()
        {
            assert_relative_eq!(
                *after,
                before - lr * expected.kernels.data()[p],
                epsilon = 1e-15
            );
        }
        for (p, (after, before)) in layer
            .biases()
            .data()
            .iter()
            .zip(biases_before.data())
            .enumerate()
        {
            assert_relative_eq!(*after, before - lr * gradient.data()[p], epsilon = 1e-15);
        }
    }

    #[test]
    fn test_input_gradient_uses_pre_update_kernels() {
        let mut rng = SimpleRng::new(31);
        let mut layer = Conv2DLayer::new((1, 5, 5), 1, 3, &mut rng).unwrap();
        let input = Tensor::from_fn(&[1, 5, 5], || rng.next_f64());
        layer.forward(&input).unwrap();
        let gradient = Tensor::filled(&[1, 3, 3], 1.0);

        let expected = layer.gradients(&gradient).unwrap().input;
        let returned = layer.backward(&gradient, 0.5).unwrap();
        assert_eq!(returned, expected);
    }

    #[test]
    fn test_gradient_shape_mismatch() {
        let mut rng = SimpleRng::new(42);
        let mut layer = Conv2DLayer::new((1, 6, 6), 2, 3, &mut rng).unwrap();
        layer.forward(&Tensor::zeros(&[1, 6, 6])).unwrap();
        let err = layer.backward(&Tensor::zeros(&[2, 3, 3]), 0.1).unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { .. }));
    }
}
