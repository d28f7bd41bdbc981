//! Error type shared by the layers, the training loop and the data loaders.

use thiserror::Error;

/// Errors produced while building, running or training the network.
///
/// Every variant is fatal for the current run: nothing in the crate retries or
/// recovers from them, callers are expected to abort.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// A tensor did not have the dimensions its consumer requires.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A cached backward pass was requested before any forward pass.
    #[error("{layer}: backward called before forward")]
    MissingForwardPass { layer: &'static str },

    /// The network produced NaN or infinity.
    #[error("non-finite value produced by {context}")]
    NonFinite { context: &'static str },

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NetworkError>;

impl NetworkError {
    pub(crate) fn shape(context: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        NetworkError::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
