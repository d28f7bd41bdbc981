//! 2-D sliding-window primitives.
//!
//! The convolutional layer needs two different operations:
//!
//! - [`valid_cross_correlate`]: no kernel flip, no padding; the output shrinks by
//!   `kernel - 1` per dimension. Used for the forward pass and the kernel gradient.
//! - [`full_convolve`]: kernel flipped, zero padded; the output grows by
//!   `kernel - 1` per dimension. Used for the input gradient.
//!
//! The `*_accumulate` variants work on raw row-major planes and add into an
//! existing output buffer so the layer can sum over channels without
//! allocating per (output, input) channel pair.

use crate::error::{NetworkError, Result};
use crate::tensor::Tensor;

/// Valid-mode cross-correlation of two 2-D tensors.
///
/// `out[y][x] = Σ_u Σ_v input[y + u][x + v] * kernel[u][v]`
///
/// # Example
///
/// ```
/// use rust_conv_net::tensor::Tensor;
/// use rust_conv_net::utils::correlation::valid_cross_correlate;
///
/// let input = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// let kernel = Tensor::new(vec![1, 2], vec![1.0, -1.0]).unwrap();
/// let out = valid_cross_correlate(&input, &kernel).unwrap();
/// assert_eq!(out.shape(), &[2, 2]);
/// assert_eq!(out.data(), &[-1.0, -1.0, -1.0, -1.0]);
/// ```
pub fn valid_cross_correlate(input: &Tensor, kernel: &Tensor) -> Result<Tensor> {
    let (h, w) = input.dims2("valid_cross_correlate")?;
    let (kh, kw) = kernel.dims2("valid_cross_correlate")?;
    if kh == 0 || kw == 0 || kh > h || kw > w {
        return Err(NetworkError::shape(
            "valid_cross_correlate: kernel larger than input",
            &[h, w],
            &[kh, kw],
        ));
    }

    let mut out = Tensor::zeros(&[h - kh + 1, w - kw + 1]);
    correlate_valid_accumulate(input.data(), (h, w), kernel.data(), (kh, kw), out.data_mut());
    Ok(out)
}

/// Full-mode convolution of two 2-D tensors (kernel flipped, zero padded).
///
/// `out[y][x] = Σ_u Σ_v input[y - u][x - v] * kernel[u][v]` over in-range indices.
pub fn full_convolve(input: &Tensor, kernel: &Tensor) -> Result<Tensor> {
    let (h, w) = input.dims2("full_convolve")?;
    let (kh, kw) = kernel.dims2("full_convolve")?;
    if h == 0 || w == 0 || kh == 0 || kw == 0 {
        return Err(NetworkError::shape("full_convolve: empty operand", &[h, w], &[kh, kw]));
    }

    let mut out = Tensor::zeros(&[h + kh - 1, w + kw - 1]);
    convolve_full_accumulate(input.data(), (h, w), kernel.data(), (kh, kw), out.data_mut());
    Ok(out)
}

/// `out += valid_cross_correlate(input, kernel)` on raw planes.
pub(crate) fn correlate_valid_accumulate(
    input: &[f64],
    (h, w): (usize, usize),
    kernel: &[f64],
    (kh, kw): (usize, usize),
    out: &mut [f64],
) {
    let out_h = h - kh + 1;
    let out_w = w - kw + 1;
    debug_assert_eq!(input.len(), h * w);
    debug_assert_eq!(kernel.len(), kh * kw);
    debug_assert_eq!(out.len(), out_h * out_w);

    for oy in 0..out_h {
        for ox in 0..out_w {
            let mut sum = 0.0;
            for ky in 0..kh {
                let in_row = &input[(oy + ky) * w + ox..(oy + ky) * w + ox + kw];
                let k_row = &kernel[ky * kw..(ky + 1) * kw];
                for (a, b) in in_row.iter().zip(k_row) {
                    sum += a * b;
                }
            }
            out[oy * out_w + ox] += sum;
        }
    }
}

/// `out += full_convolve(input, kernel)` on raw planes.
pub(crate) fn convolve_full_accumulate(
    input: &[f64],
    (h, w): (usize, usize),
    kernel: &[f64],
    (kh, kw): (usize, usize),
    out: &mut [f64],
) {
    let out_w = w + kw - 1;
    debug_assert_eq!(input.len(), h * w);
    debug_assert_eq!(kernel.len(), kh * kw);
    debug_assert_eq!(out.len(), (h + kh - 1) * out_w);

    // Scatter form: every input element stamps a scaled copy of the kernel.
    for iy in 0..h {
        for ix in 0..w {
            let a = input[iy * w + ix];
            if a == 0.0 {
                continue;
            }
            for ky in 0..kh {
                let out_row = &mut out[(iy + ky) * out_w + ix..(iy + ky) * out_w + ix + kw];
                let k_row = &kernel[ky * kw..(ky + 1) * kw];
                for (o, k) in out_row.iter_mut().zip(k_row) {
                    *o += a * k;
                }
            }
        }
    }
}
