//! Gesture classification.
//!
//! A [`Classifier`] maps a [`FeatureVector`] to a class index, and the [`LabelTable`] maps class
//! indices to the letters drawn onto the stream.

pub mod forest;

use crate::features::FeatureVector;

pub use forest::{ArtifactError, ForestClassifier};

/// Maps a feature vector to a class index.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> anyhow::Result<usize>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn predict(&self, features: &FeatureVector) -> anyhow::Result<usize> {
        (**self).predict(features)
    }
}

/// Static mapping from class index to the letter it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<char>,
}

impl LabelTable {
    /// The American Sign Language alphabet: `0 -> 'A'` through `25 -> 'Z'`.
    pub fn asl() -> Self {
        Self {
            labels: ('A'..='Z').collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<char> {
        self.labels.get(index).copied()
    }

    pub fn contains(&self, label: char) -> bool {
        self.labels.contains(&label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::asl()
    }
}
