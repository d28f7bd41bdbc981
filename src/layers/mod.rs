//! Layer implementations for the network
//!
//! The two layer kinds deliberately have different contracts: `DenseLayer`
//! applies its own injected activation, while `Conv2DLayer` is
//! activation-agnostic and leaves the nonlinearity (and its derivative) to the
//! caller.

pub mod conv2d;
pub mod dense;

pub use conv2d::{Conv2DLayer, ConvGradients};
pub use dense::{DenseGradients, DenseLayer};
