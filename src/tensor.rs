//! Dense row-major tensor used by every layer.
//!
//! A `Tensor` is a flat `Vec<f64>` plus a shape. Only the handful of operations
//! the network needs are provided; all of them check shapes and return
//! [`NetworkError::ShapeMismatch`] instead of panicking.

use crate::error::{NetworkError, Result};

/// Shaped, row-major buffer of `f64` values.
///
/// # Example
///
/// ```
/// use rust_conv_net::tensor::Tensor;
///
/// let a = Tensor::new(vec![1, 2], vec![1.0, 2.0]).unwrap();
/// let b = Tensor::new(vec![2, 1], vec![3.0, 4.0]).unwrap();
/// let c = a.matmul(&b).unwrap();
/// assert_eq!(c.shape(), &[1, 1]);
/// assert_eq!(c.data(), &[11.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    /// Build a tensor from a shape and matching data.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if expected != data.len() {
            return Err(NetworkError::shape("Tensor::new", &[expected], &[data.len()]));
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, 0.0)
    }

    pub fn filled(shape: &[usize], value: f64) -> Self {
        let len = shape.iter().product::<usize>();
        Self {
            shape: shape.to_vec(),
            data: vec![value; len],
        }
    }

    /// Build a tensor by calling `f` once per element, in row-major order.
    pub fn from_fn(shape: &[usize], mut f: impl FnMut() -> f64) -> Self {
        let len = shape.iter().product::<usize>();
        let data = (0..len).map(|_| f()).collect();
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the last dimension (0 for a scalar-shaped tensor).
    pub fn cols(&self) -> usize {
        self.shape.last().copied().unwrap_or(0)
    }

    /// Interpret the tensor as a matrix, failing unless it is 2-D.
    pub fn dims2(&self, context: &'static str) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            &[rows, cols] => Ok((rows, cols)),
            other => Err(NetworkError::shape(context, &[0, 0], other)),
        }
    }

    /// Interpret the tensor as a stack of 2-D planes, failing unless it is 3-D.
    pub fn dims3(&self, context: &'static str) -> Result<(usize, usize, usize)> {
        match self.shape.as_slice() {
            &[depth, rows, cols] => Ok((depth, rows, cols)),
            other => Err(NetworkError::shape(context, &[0, 0, 0], other)),
        }
    }

    /// Fail with `ShapeMismatch` unless the shape is exactly `expected`.
    pub fn expect_shape(&self, context: &'static str, expected: &[usize]) -> Result<()> {
        if self.shape != expected {
            return Err(NetworkError::shape(context, expected, &self.shape));
        }
        Ok(())
    }

    /// Same data under a new shape with the same element count.
    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor> {
        let len = shape.iter().product::<usize>();
        if len != self.data.len() {
            return Err(NetworkError::shape("Tensor::reshape", shape, &self.shape));
        }
        Ok(Tensor {
            shape: shape.to_vec(),
            data: self.data.clone(),
        })
    }

    /// Slice holding the `index`-th entry along the leading dimension.
    pub fn slab(&self, index: usize) -> &[f64] {
        let stride = self.slab_len();
        &self.data[index * stride..(index + 1) * stride]
    }

    pub fn slab_mut(&mut self, index: usize) -> &mut [f64] {
        let stride = self.slab_len();
        &mut self.data[index * stride..(index + 1) * stride]
    }

    fn slab_len(&self) -> usize {
        self.shape.iter().skip(1).product::<usize>()
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Elementwise combination of two tensors of identical shape.
    pub fn zip_map(
        &self,
        other: &Tensor,
        context: &'static str,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Tensor> {
        other.expect_shape(context, &self.shape)?;
        Ok(Tensor {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    /// Matrix product of two 2-D tensors.
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        let (m, k) = self.dims2("Tensor::matmul")?;
        let (k2, n) = other.dims2("Tensor::matmul")?;
        if k != k2 {
            return Err(NetworkError::shape("Tensor::matmul", &[k, n], &[k2, n]));
        }

        let mut out = vec![0.0; m * n];
        for i in 0..m {
            let row = &self.data[i * k..(i + 1) * k];
            let out_row = &mut out[i * n..(i + 1) * n];
            for (p, &a) in row.iter().enumerate() {
                if a == 0.0 {
                    continue;
                }
                let other_row = &other.data[p * n..(p + 1) * n];
                for (o, &b) in out_row.iter_mut().zip(other_row) {
                    *o += a * b;
                }
            }
        }
        Ok(Tensor {
            shape: vec![m, n],
            data: out,
        })
    }

    pub fn transpose(&self) -> Result<Tensor> {
        let (rows, cols) = self.dims2("Tensor::transpose")?;
        let mut out = vec![0.0; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                out[c * rows + r] = self.data[r * cols + c];
            }
        }
        Ok(Tensor {
            shape: vec![cols, rows],
            data: out,
        })
    }

    /// Column sums of a 2-D tensor, kept as a `[1, cols]` row.
    pub fn sum_rows(&self) -> Result<Tensor> {
        let (_, cols) = self.dims2("Tensor::sum_rows")?;
        let mut out = vec![0.0; cols];
        for row in self.data.chunks_exact(cols.max(1)) {
            for (o, &v) in out.iter_mut().zip(row) {
                *o += v;
            }
        }
        Ok(Tensor {
            shape: vec![1, cols],
            data: out,
        })
    }

    /// In-place gradient step: `self -= rate * gradient`.
    pub fn sub_scaled(&mut self, gradient: &Tensor, rate: f64) -> Result<()> {
        gradient.expect_shape("Tensor::sub_scaled", &self.shape)?;
        for (p, &g) in self.data.iter_mut().zip(gradient.data.iter()) {
            *p -= rate * g;
        }
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Index of the largest element (first one on ties), `None` when empty.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &v) in self.data.iter().enumerate() {
            match best {
                Some((_, b)) if v <= b => {}
                _ => best = Some((i, v)),
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}
