//! Non-maximum averaging.
//!
//! The palm detector produces a candidate for every anchor whose score passes the threshold, so a
//! single hand typically shows up as a cluster of overlapping candidates. Each cluster is replaced
//! by the confidence-weighted average of its members, which is more stable from frame to frame than
//! keeping only the most confident candidate.

use crate::{num::TotalF32, rect::Rect};

use super::{Detection, Keypoint};

/// Merges overlapping detections.
pub struct NonMaxSuppression {
    iou_thresh: f32,
}

impl NonMaxSuppression {
    /// Detections whose intersection-over-union with a cluster's seed reaches this value join the
    /// cluster.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
        }
    }

    /// Merges each cluster of overlapping `detections` into one.
    ///
    /// The result is ordered by descending confidence; each merged detection keeps the confidence
    /// of its cluster's most confident member.
    pub fn process(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
        let mut out = Vec::new();

        // Ascending, so `pop` yields the most confident remaining detection.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence()));

        while let Some(seed) = detections.pop() {
            let seed_rect = seed.bounding_rect();
            let (cluster, rest): (Vec<_>, Vec<_>) = detections
                .into_iter()
                .partition(|other| seed_rect.iou(&other.bounding_rect()) >= self.iou_thresh);
            detections = rest;

            let confidence = seed.confidence();
            out.push(average(confidence, [seed].into_iter().chain(cluster)));
        }

        out
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the confidence-weighted average of a non-empty cluster.
///
/// The keypoint count of the first detection is used; surplus keypoints of other members are
/// ignored.
fn average(confidence: f32, cluster: impl Iterator<Item = Detection>) -> Detection {
    let mut rect_sum = [0.0; 4];
    let mut keypoints: Option<Vec<Keypoint>> = None;
    let mut total_weight = 0.0;

    for det in cluster {
        let weight = det.confidence();
        total_weight += weight;

        let sums = keypoints
            .get_or_insert_with(|| vec![Keypoint::new(0.0, 0.0); det.keypoints().len()]);
        for (sum, kp) in sums.iter_mut().zip(det.keypoints()) {
            sum.x += kp.x * weight;
            sum.y += kp.y * weight;
        }

        let rect = det.bounding_rect();
        let values = [rect.x_center(), rect.y_center(), rect.width(), rect.height()];
        for (sum, value) in rect_sum.iter_mut().zip(values) {
            *sum += value * weight;
        }
    }

    let mut keypoints = keypoints.unwrap_or_default();
    for kp in &mut keypoints {
        kp.x /= total_weight;
        kp.y /= total_weight;
    }
    let [x, y, w, h] = rect_sum.map(|v| v / total_weight);

    Detection::with_keypoints(confidence, Rect::from_center(x, y, w, h), keypoints)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn separate_detections_are_kept() {
        let nms = NonMaxSuppression::new();

        let a = Detection::new(0.7, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let b = Detection::new(0.9, Rect::from_center(5.0, 0.0, 1.0, 1.0));

        let detections = nms.process(vec![a, b]);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence(), 0.9);
        assert_eq!(detections[1].confidence(), 0.7);
    }

    #[test]
    fn overlapping_detections_are_averaged() {
        let nms = NonMaxSuppression::new();

        // IoU = 1 / 1.6² ≈ 0.39
        let a = Detection::with_keypoints(
            1.0,
            Rect::from_center(-1.0, 3.0, 1.0, 1.0),
            vec![Keypoint::new(0.0, 0.0)],
        );
        let b = Detection::with_keypoints(
            0.5,
            Rect::from_center(-1.0, 3.0, 1.6, 1.6),
            vec![Keypoint::new(3.0, 6.0)],
        );
        let detections = nms.process(vec![b, a]);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let rect = d.bounding_rect();
        assert_eq!(d.confidence(), 1.0);
        assert_relative_eq!(rect.x_center(), -1.0);
        assert_relative_eq!(rect.y_center(), 3.0);
        assert_relative_eq!(rect.width(), 1.2);
        assert_relative_eq!(rect.height(), 1.2);
        assert_eq!(d.keypoints(), &[Keypoint::new(1.0, 2.0)]);
    }

    #[test]
    fn weakly_overlapping_detections_stay_apart() {
        let nms = NonMaxSuppression::new();

        // IoU = 1 / 16
        let a = Detection::new(0.8, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let b = Detection::new(0.6, Rect::from_center(0.0, 0.0, 4.0, 4.0));
        assert_eq!(nms.process(vec![a, b]).len(), 2);
    }

    #[test]
    fn empty_input() {
        assert!(NonMaxSuppression::new().process(Vec::new()).is_empty());
    }
}
