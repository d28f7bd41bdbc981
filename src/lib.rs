//! Rust Conv Net Library
//!
//! A small convolutional classifier written from first principles: a
//! valid-mode convolutional layer followed by two sigmoid dense layers,
//! trained one sample at a time with hand-derived backpropagation.
//!
//! # Modules
//!
//! - `tensor`: shaped `f64` buffers with checked matrix helpers
//! - `layers`: `DenseLayer` and `Conv2DLayer` with forward/backward passes
//! - `network`: the Conv → sigmoid → flatten → Dense → Dense chain
//! - `training`: per-sample SGD training and evaluation loops
//! - `data`: samples, one-hot encoding, MNIST IDX and synthetic loaders
//! - `utils`: RNG, activation/loss functions, correlation primitives
//! - `config`: training configuration and its JSON loader
//! - `error`: the crate error type

pub mod config;
pub mod data;
pub mod error;
pub mod layers;
pub mod network;
pub mod tensor;
pub mod training;
pub mod utils;

pub use error::{NetworkError, Result};
