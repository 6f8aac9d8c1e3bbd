//! Feature extraction: from detected hands to the classifier's input vector.

use std::ops::Deref;

use crate::{landmark::HandLandmarks, num::to_pixel};

/// Number of values in a [`FeatureVector`]: 21 landmarks with 2 coordinates each, for 2 hands.
pub const FEATURE_LEN: usize = 84;

/// Offset applied to both corners of a [`BoundingBox`], in pixels.
const BOX_OFFSET: i32 = -10;

/// The classifier input computed from the hands in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; FEATURE_LEN]);

impl FeatureVector {
    /// Creates a feature vector from up to [`FEATURE_LEN`] values.
    ///
    /// Missing values are filled with zeros, excess values are dropped.
    pub fn from_values<I: IntoIterator<Item = f32>>(values: I) -> Self {
        let mut out = [0.0; FEATURE_LEN];
        for (slot, value) in out.iter_mut().zip(values) {
            *slot = value;
        }
        Self(out)
    }
}

impl Deref for FeatureVector {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

/// Frame-space bounding box of all detected hands, in pixels.
///
/// Both corners are moved up and to the left by 10 pixels, so `(x2, y2)` can lie inside the hand
/// region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// The result of [`extract`].
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub vector: FeatureVector,
    pub bounds: BoundingBox,
    /// Number of coordinate values accumulated before padding or truncation.
    pub raw_len: usize,
}

/// Builds the feature vector and bounding box for the hands detected in a `width x height` frame.
///
/// The x and y coordinates of all hands accumulate into one list each, in detection order. Right
/// after a hand's coordinates have been appended, each of its landmarks contributes
/// `x - min(x so far)` and `y - min(y so far)`, so later hands are shifted by a minimum that also
/// covers the earlier ones, while the first hand is not shifted by the later ones.
///
/// Returns [`None`] if `hands` contains no landmarks at all.
pub fn extract(hands: &[HandLandmarks], width: u32, height: u32) -> Option<Features> {
    let mut values = Vec::with_capacity(FEATURE_LEN);
    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];

    for hand in hands {
        for &[x, y] in hand.points() {
            min = [min[0].min(x), min[1].min(y)];
            max = [max[0].max(x), max[1].max(y)];
        }
        for &[x, y] in hand.points() {
            values.push(x - min[0]);
            values.push(y - min[1]);
        }
    }

    if values.is_empty() {
        return None;
    }
    if values.len() > FEATURE_LEN {
        log::trace!(
            "{} feature values from {} hands, truncating to {FEATURE_LEN}",
            values.len(),
            hands.len()
        );
    }

    let bounds = BoundingBox {
        x1: to_pixel(min[0], width).saturating_add(BOX_OFFSET),
        y1: to_pixel(min[1], height).saturating_add(BOX_OFFSET),
        x2: to_pixel(max[0], width).saturating_add(BOX_OFFSET),
        y2: to_pixel(max[1], height).saturating_add(BOX_OFFSET),
    };

    Some(Features {
        vector: FeatureVector::from_values(values.iter().copied()),
        bounds,
        raw_len: values.len(),
    })
}
