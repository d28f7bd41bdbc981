//! Tests for DenseLayer forward and backward passes
//!
//! - forward shapes, bias broadcasting and ShapeMismatch on bad input
//! - forward idempotence (no parameter mutation)
//! - output-layer backward independence from any other layer
//! - parameter update and pre-update upstream gradient
//! - chaining through `next_weights`

use approx::assert_relative_eq;
use rust_conv_net::layers::DenseLayer;
use rust_conv_net::tensor::Tensor;
use rust_conv_net::utils::{sigmoid, sigmoid_prime, Activation, SimpleRng};
use rust_conv_net::NetworkError;

fn tensor(shape: &[usize], values: &[f64]) -> Tensor {
    Tensor::new(shape.to_vec(), values.to_vec()).unwrap()
}

fn small_layer() -> DenseLayer {
    // 2 inputs -> 3 outputs
    let weights = tensor(&[2, 3], &[0.1, -0.2, 0.3, 0.4, 0.5, -0.6]);
    let biases = tensor(&[1, 3], &[0.01, 0.02, -0.03]);
    DenseLayer::from_parameters(weights, biases, Activation::SIGMOID).unwrap()
}

mod forward_tests {
    use super::*;

    #[test]
    fn test_output_columns_equal_weight_columns() {
        let mut rng = SimpleRng::new(42);
        for &(inp, out) in &[(1, 1), (4, 7), (100, 10), (7 * 24 * 24, 100)] {
            let mut layer = DenseLayer::new(inp, out, Activation::SIGMOID, &mut rng);
            let (z, a) = layer.forward(&Tensor::filled(&[1, inp], 0.5)).unwrap();
            assert_eq!(z.cols(), layer.weights().shape()[1]);
            assert_eq!(a.shape(), &[1, out]);
        }
    }

    #[test]
    fn test_forward_values() {
        let mut layer = small_layer();
        let x = tensor(&[1, 2], &[1.0, 2.0]);
        let (z, a) = layer.forward(&x).unwrap();

        let expected_z = [
            1.0 * 0.1 + 2.0 * 0.4 + 0.01,
            1.0 * -0.2 + 2.0 * 0.5 + 0.02,
            1.0 * 0.3 + 2.0 * -0.6 - 0.03,
        ];
        for j in 0..3 {
            assert_relative_eq!(z.data()[j], expected_z[j], epsilon = 1e-12);
            assert_relative_eq!(a.data()[j], sigmoid(expected_z[j]), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bias_broadcast_over_rows() {
        let mut layer = small_layer();
        let x = Tensor::zeros(&[3, 2]);
        let (z, _) = layer.forward(&x).unwrap();
        assert_eq!(z.shape(), &[3, 3]);
        for row in z.data().chunks(3) {
            assert_eq!(row, layer.biases().data());
        }
    }

    #[test]
    fn test_mismatched_input_columns() {
        let mut layer = small_layer();
        let err = layer.forward(&Tensor::zeros(&[1, 3])).unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_non_matrix_input() {
        let mut layer = small_layer();
        assert!(layer.forward(&Tensor::zeros(&[2])).is_err());
    }

    #[test]
    fn test_forward_twice_is_idempotent() {
        let mut rng = SimpleRng::new(9);
        let mut layer = DenseLayer::new(6, 4, Activation::SIGMOID, &mut rng);
        let weights_before = layer.weights().clone();
        let biases_before = layer.biases().clone();

        let x = Tensor::from_fn(&[1, 6], || rng.next_f64());
        let first = layer.forward(&x).unwrap();
        let second = layer.forward(&x).unwrap();

        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
        assert_eq!(layer.weights(), &weights_before);
        assert_eq!(layer.biases(), &biases_before);
    }
}

mod backward_tests {
    use super::*;

    #[test]
    fn test_output_layer_delta_uses_only_supplied_gradient() {
        let layer = small_layer();
        let z = tensor(&[1, 3], &[0.5, -1.0, 2.0]);
        let a_prev = tensor(&[1, 2], &[1.0, 2.0]);
        let gradient = tensor(&[1, 3], &[0.3, -0.7, 0.2]);

        let grads = layer.gradients(&z, &a_prev, &gradient, None).unwrap();
        for j in 0..3 {
            assert_relative_eq!(
                grads.delta.data()[j],
                sigmoid_prime(z.data()[j]) * gradient.data()[j],
                epsilon = 1e-15
            );
        }

        // The same delta comes out of an identically shaped layer with other weights.
        let other = DenseLayer::from_parameters(
            Tensor::filled(&[2, 3], 9.0),
            Tensor::filled(&[1, 3], -4.0),
            Activation::SIGMOID,
        )
        .unwrap();
        let other_grads = other.gradients(&z, &a_prev, &gradient, None).unwrap();
        assert_eq!(grads.delta, other_grads.delta);
        assert_eq!(grads.weights, other_grads.weights);
    }

    #[test]
    fn test_weight_and_bias_gradients() {
        let layer = small_layer();
        let z = tensor(&[1, 3], &[0.0, 0.0, 0.0]);
        let a_prev = tensor(&[1, 2], &[1.0, 2.0]);
        let gradient = tensor(&[1, 3], &[4.0, -4.0, 8.0]);

        let grads = layer.gradients(&z, &a_prev, &gradient, None).unwrap();
        // sigmoid'(0) = 0.25
        assert_eq!(grads.delta.data(), &[1.0, -1.0, 2.0]);
        assert_eq!(grads.weights.shape(), &[2, 3]);
        assert_eq!(grads.weights.data(), &[1.0, -1.0, 2.0, 2.0, -2.0, 4.0]);
        assert_eq!(grads.biases.data(), &[1.0, -1.0, 2.0]);
    }

    #[test]
    fn test_backward_updates_parameters_and_returns_pre_update_gradient() {
        let mut layer = small_layer();
        let weights_before = layer.weights().clone();
        let biases_before = layer.biases().clone();

        let x = tensor(&[1, 2], &[0.5, -1.5]);
        let (z, _) = layer.forward(&x).unwrap();
        let gradient = tensor(&[1, 3], &[0.2, 0.1, -0.4]);
        let expected = layer.gradients(&z, &x, &gradient, None).unwrap();

        let lr = 0.1;
        let upstream = layer.backward(&z, &x, &gradient, lr, None).unwrap();

        // Upstream gradient = delta · W_beforeᵀ
        let manual = expected.delta.matmul(&weights_before.transpose().unwrap()).unwrap();
        assert_eq!(upstream, manual);
        assert_eq!(upstream.shape(), &[1, 2]);

        for i in 0..6 {
            assert_relative_eq!(
                layer.weights().data()[i],
                weights_before.data()[i] - lr * expected.weights.data()[i],
                epsilon = 1e-15
            );
        }
        for j in 0..3 {
            assert_relative_eq!(
                layer.biases().data()[j],
                biases_before.data()[j] - lr * expected.biases.data()[j],
                epsilon = 1e-15
            );
        }
    }

    #[test]
    fn test_backward_cached_matches_explicit_backward() {
        let x = tensor(&[1, 2], &[0.25, 0.75]);
        let gradient = tensor(&[1, 3], &[0.5, -0.5, 0.1]);

        let mut explicit = small_layer();
        let (z, _) = explicit.forward(&x).unwrap();
        let up_explicit = explicit.backward(&z, &x, &gradient, 0.1, None).unwrap();

        let mut cached = small_layer();
        cached.forward(&x).unwrap();
        let up_cached = cached.backward_cached(&gradient, 0.1).unwrap();

        assert_eq!(up_explicit, up_cached);
        assert_eq!(explicit.weights(), cached.weights());
        assert_eq!(explicit.biases(), cached.biases());
    }

    #[test]
    fn test_gradient_width_mismatch() {
        let mut layer = small_layer();
        let x = tensor(&[1, 2], &[1.0, 1.0]);
        let (z, _) = layer.forward(&x).unwrap();
        let err = layer
            .backward(&z, &x, &Tensor::zeros(&[1, 4]), 0.1, None)
            .unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_chaining_through_next_weights() {
        // Routing a downstream delta through next_weights must equal passing
        // the already-routed gradient directly.
        let layer = small_layer();
        let z = tensor(&[1, 3], &[0.3, -0.2, 0.9]);
        let a_prev = tensor(&[1, 2], &[1.0, -1.0]);
        let next_weights = tensor(&[3, 2], &[0.5, -0.5, 1.0, 0.25, -1.0, 2.0]);
        let next_delta = tensor(&[1, 2], &[0.4, -0.3]);

        let routed = next_delta
            .matmul(&next_weights.transpose().unwrap())
            .unwrap();
        let direct = layer.gradients(&z, &a_prev, &routed, None).unwrap();
        let chained = layer
            .gradients(&z, &a_prev, &next_delta, Some(&next_weights))
            .unwrap();

        assert_eq!(direct.delta, chained.delta);
        assert_eq!(direct.weights, chained.weights);
        assert_eq!(direct.input, chained.input);
    }

    #[test]
    fn test_chaining_rejects_wrong_next_weights() {
        let layer = small_layer();
        let z = Tensor::zeros(&[1, 3]);
        let a_prev = Tensor::zeros(&[1, 2]);
        let next_weights = Tensor::zeros(&[2, 2]);
        let next_delta = Tensor::zeros(&[1, 2]);
        assert!(layer
            .gradients(&z, &a_prev, &next_delta, Some(&next_weights))
            .is_err());
    }
}
