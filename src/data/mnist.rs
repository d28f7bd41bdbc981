//! MNIST IDX reader.
//!
//! Expected files inside the data directory:
//!   train-images.idx3-ubyte
//!   train-labels.idx1-ubyte
//!   t10k-images.idx3-ubyte
//!   t10k-labels.idx1-ubyte

use super::{one_hot, Sample};
use crate::error::{NetworkError, Result};
use crate::tensor::Tensor;
use std::fs;
use std::path::Path;

const IMAGE_MAGIC: u32 = 0x0000_0803;
const LABEL_MAGIC: u32 = 0x0000_0801;

pub const TRAIN_IMAGES: &str = "train-images.idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels.idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images.idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels.idx1-ubyte";

// Read a big-endian u32 and advance the byte offset (IDX format uses BE).
fn read_be_u32(data: &[u8], offset: &mut usize) -> Result<u32> {
    let bytes = data
        .get(*offset..*offset + 4)
        .ok_or_else(|| NetworkError::InvalidDataset("IDX header is truncated".into()))?;
    *offset += 4;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode up to `max` images as `[1, rows, cols]` tensors scaled to [0, 1].
pub fn parse_images(data: &[u8], max: usize) -> Result<Vec<Tensor>> {
    let mut offset = 0usize;
    // IDX header: magic, count, rows, cols.
    let magic = read_be_u32(data, &mut offset)?;
    if magic != IMAGE_MAGIC {
        return Err(NetworkError::InvalidDataset(format!(
            "bad image file magic {:#010x}",
            magic
        )));
    }
    let total = read_be_u32(data, &mut offset)? as usize;
    let rows = read_be_u32(data, &mut offset)? as usize;
    let cols = read_be_u32(data, &mut offset)? as usize;

    let overflow = || NetworkError::InvalidDataset("IDX header sizes overflow".into());
    let image_size = rows.checked_mul(cols).ok_or_else(overflow)?;
    if image_size == 0 {
        return Err(NetworkError::InvalidDataset(format!(
            "IDX images have zero size ({}x{})",
            rows, cols
        )));
    }
    let count = max.min(total);
    let end = count
        .checked_mul(image_size)
        .and_then(|len| len.checked_add(offset))
        .ok_or_else(overflow)?;
    let pixels = data
        .get(offset..end)
        .ok_or_else(|| NetworkError::InvalidDataset("IDX image file is truncated".into()))?;

    pixels
        .chunks_exact(image_size)
        .take(count)
        .map(|chunk| {
            let values = chunk.iter().map(|&p| f64::from(p) / 255.0).collect();
            Tensor::new(vec![1, rows, cols], values)
        })
        .collect()
}

/// Decode up to `max` labels.
pub fn parse_labels(data: &[u8], max: usize) -> Result<Vec<u8>> {
    let mut offset = 0usize;
    let magic = read_be_u32(data, &mut offset)?;
    if magic != LABEL_MAGIC {
        return Err(NetworkError::InvalidDataset(format!(
            "bad label file magic {:#010x}",
            magic
        )));
    }
    let total = read_be_u32(data, &mut offset)? as usize;
    let count = max.min(total);

    let end = offset
        .checked_add(count)
        .ok_or_else(|| NetworkError::InvalidDataset("IDX header sizes overflow".into()))?;
    data.get(offset..end)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| NetworkError::InvalidDataset("IDX label file is truncated".into()))
}

/// Read an image file and a label file into one-hot encoded samples.
pub fn load_samples(
    images_path: &Path,
    labels_path: &Path,
    max: usize,
    num_classes: usize,
) -> Result<Vec<Sample>> {
    let images = parse_images(&fs::read(images_path)?, max)?;
    let labels = parse_labels(&fs::read(labels_path)?, max)?;
    if images.len() != labels.len() {
        return Err(NetworkError::InvalidDataset(format!(
            "{} images but {} labels",
            images.len(),
            labels.len()
        )));
    }

    images
        .into_iter()
        .zip(labels)
        .map(|(image, label)| Sample::new(image, one_hot(usize::from(label), num_classes)?))
        .collect()
}

/// Load the first `train_max` training and `test_max` test samples from `dir`.
pub fn load_mnist(
    dir: &Path,
    train_max: usize,
    test_max: usize,
    num_classes: usize,
) -> Result<(Vec<Sample>, Vec<Sample>)> {
    let train = load_samples(
        &dir.join(TRAIN_IMAGES),
        &dir.join(TRAIN_LABELS),
        train_max,
        num_classes,
    )?;
    let test = load_samples(
        &dir.join(TEST_IMAGES),
        &dir.join(TEST_LABELS),
        test_max,
        num_classes,
    )?;
    log::debug!(
        "loaded {} training and {} test samples from {}",
        train.len(),
        test.len(),
        dir.display()
    );
    Ok((train, test))
}
