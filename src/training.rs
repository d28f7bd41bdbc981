//! Training and evaluation loops.
//!
//! Training is online SGD: samples are visited in their given order, one at a
//! time, and every sample's backward pass updates all three layers before the
//! next sample is seen. There is no shuffling, batching or early stopping.

use crate::data::Sample;
use crate::error::{NetworkError, Result};
use crate::network::ConvNet;
use std::time::{Duration, Instant};

/// Statistics of one pass over the training set.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch number
    pub epoch: usize,
    pub correct: usize,
    pub total: usize,
    /// Mean per-sample squared-error loss, measured before each update
    pub mean_loss: f64,
    pub elapsed: Duration,
}

impl EpochReport {
    /// Share of training samples classified correctly, in percent.
    pub fn accuracy(&self) -> f64 {
        percent(self.correct, self.total)
    }
}

/// Result of a forward-only pass over a held-out set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub correct: usize,
    pub total: usize,
}

impl Evaluation {
    pub fn accuracy(&self) -> f64 {
        percent(self.correct, self.total)
    }
}

fn percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 * 100.0 / total as f64
    }
}

/// One epoch of per-sample SGD over `samples`.
pub fn train_epoch(
    net: &mut ConvNet,
    samples: &[Sample],
    learning_rate: f64,
    epoch: usize,
) -> Result<EpochReport> {
    let start = Instant::now();
    let mut correct = 0usize;
    let mut total_loss = 0.0f64;

    for sample in samples {
        let step = net.train_step(sample, learning_rate)?;
        if step.is_correct() {
            correct += 1;
        }
        total_loss += step.loss;
    }

    if !total_loss.is_finite() {
        return Err(NetworkError::NonFinite {
            context: "train_epoch loss",
        });
    }

    let total = samples.len();
    Ok(EpochReport {
        epoch,
        correct,
        total,
        mean_loss: if total == 0 { 0.0 } else { total_loss / total as f64 },
        elapsed: start.elapsed(),
    })
}

/// Train for `epochs` epochs, calling `on_epoch` after each one.
///
/// # Example
///
/// ```
/// use rust_conv_net::data::synthetic::stripe_patterns;
/// use rust_conv_net::network::{ConvNet, NetworkShape};
/// use rust_conv_net::training::train;
/// use rust_conv_net::utils::SimpleRng;
///
/// let shape = NetworkShape {
///     input: (1, 8, 8),
///     conv_channels: 2,
///     kernel_size: 3,
///     hidden_size: 6,
///     num_classes: 4,
/// };
/// let samples = stripe_patterns(8, (8, 8), 4).unwrap();
/// let mut net = ConvNet::new(shape, &mut SimpleRng::new(1)).unwrap();
/// let reports = train(&mut net, &samples, 2, 0.1, |_| {}).unwrap();
/// assert_eq!(reports.len(), 2);
/// ```
pub fn train(
    net: &mut ConvNet,
    samples: &[Sample],
    epochs: usize,
    learning_rate: f64,
    mut on_epoch: impl FnMut(&EpochReport),
) -> Result<Vec<EpochReport>> {
    let mut reports = Vec::with_capacity(epochs);
    for epoch in 1..=epochs {
        let report = train_epoch(net, samples, learning_rate, epoch)?;
        log::info!(
            "epoch {} accuracy={:.2}% loss={:.6} time={:.3}s",
            report.epoch,
            report.accuracy(),
            report.mean_loss,
            report.elapsed.as_secs_f64()
        );
        on_epoch(&report);
        reports.push(report);
    }
    Ok(reports)
}

/// Count correct predictions without touching any parameter.
pub fn evaluate(net: &mut ConvNet, samples: &[Sample]) -> Result<Evaluation> {
    let mut correct = 0usize;
    for sample in samples {
        net.check_label(&sample.label)?;
        let prediction = net.predict(&sample.image)?;
        if Some(prediction) == sample.class() {
            correct += 1;
        }
    }
    let eval = Evaluation {
        correct,
        total: samples.len(),
    };
    log::info!("evaluation accuracy={:.2}%", eval.accuracy());
    Ok(eval)
}
