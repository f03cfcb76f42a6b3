//! The read-only sample source the classifier iterates over.

use crate::error::DatasetError;

/// Indexed access to labelled samples.
///
/// Every worker must see the same dataset in the same order; the trainer
/// only ever reads it.
pub trait Dataset {
    /// Number of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattened feature vector of sample `index`.
    fn features(&self, index: usize) -> &[f64];

    /// Class of sample `index`, in `0..classes`.
    fn label(&self, index: usize) -> usize;
}

/// A dataset held entirely in memory as one contiguous feature buffer.
///
/// # Example
///
/// ```
/// use seqnet::dataset::{Dataset, InMemoryDataset};
///
/// let data = InMemoryDataset::new(vec![vec![0.0, 1.0], vec![1.0, 0.0]], vec![1, 0], 2).unwrap();
/// assert_eq!(data.len(), 2);
/// assert_eq!(data.features(1), &[1.0, 0.0]);
/// assert_eq!(data.label(0), 1);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    width: usize,
    classes: usize,
    features: Vec<f64>,
    labels: Vec<usize>,
}

impl InMemoryDataset {
    /// Validate and pack `features` and `labels`.
    ///
    /// Every feature vector must have the width of the first one, there must
    /// be one label per vector, and every label must be below `classes`.
    pub fn new(
        features: Vec<Vec<f64>>,
        labels: Vec<usize>,
        classes: usize,
    ) -> Result<Self, DatasetError> {
        if features.len() != labels.len() {
            return Err(DatasetError::LengthMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }

        let width = features.first().map_or(0, Vec::len);
        let mut packed = Vec::with_capacity(width * features.len());
        for (index, row) in features.iter().enumerate() {
            if row.len() != width {
                return Err(DatasetError::WidthMismatch {
                    index,
                    expected: width,
                    actual: row.len(),
                });
            }
            packed.extend_from_slice(row);
        }

        if let Some((index, &label)) = labels.iter().enumerate().find(|&(_, &l)| l >= classes) {
            return Err(DatasetError::LabelOutOfRange {
                index,
                label,
                classes,
            });
        }

        Ok(Self {
            width,
            classes,
            features: packed,
            labels,
        })
    }

    /// Number of features per sample.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn classes(&self) -> usize {
        self.classes
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn features(&self, index: usize) -> &[f64] {
        &self.features[index * self.width..(index + 1) * self.width]
    }

    fn label(&self, index: usize) -> usize {
        self.labels[index]
    }
}
