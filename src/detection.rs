//! Common functionality for single-shot object detection.
//!
//! Networks produce one candidate per anchor; [`ssd`] computes the anchors and [`nms`] merges the
//! overlapping candidates into one [`Detection`] per object.

pub mod nms;
pub mod ssd;

use crate::rect::Rect;

/// A detected object.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value, and a
/// possibly empty set of located keypoints.
///
/// Per convention, the confidence value lies between 0.0 and 1.0, which is achieved by passing the
/// raw network output through [`crate::num::sigmoid`]. The confidence value is used as the weight
/// when [`nms::NonMaxSuppression`] averages overlapping detections.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Maps the rectangle and keypoints through `f`, which receives and returns `(x, y)` pairs.
    ///
    /// The rectangle's size is scaled by `scale`.
    pub fn map_coords(&mut self, scale: f32, f: impl Fn(f32, f32) -> (f32, f32)) {
        let (xc, yc) = f(self.rect.x_center(), self.rect.y_center());
        self.rect = Rect::from_center(xc, yc, self.rect.width() * scale, self.rect.height() * scale);
        for kp in &mut self.keypoints {
            (kp.x, kp.y) = f(kp.x, kp.y);
        }
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// The meaning of a keypoint depends on the detector and on its index in the keypoint list. The
/// palm detector uses them to derive the hand's region of interest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
