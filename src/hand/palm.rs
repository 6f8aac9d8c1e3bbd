//! Palm detection.

use std::path::Path;

use anyhow::Context;
use tract_onnx::prelude::tract_ndarray::Ix3;

use crate::{
    detection::{
        nms::NonMaxSuppression,
        ssd::{Anchor, Anchors, LayerInfo},
        Detection, Keypoint,
    },
    image::{Image, Resolution},
    nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs},
    num::sigmoid,
    timer::Timer,
};

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;
const NUM_BOX_PARAMS: usize = 4 + NUM_KEYPOINTS * 2;

const LAYERS: &[LayerInfo] = &[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)];

/// The "lite" MediaPipe palm detection network.
pub struct PalmDetector {
    cnn: Cnn,
    anchors: Anchors,
    nms: NonMaxSuppression,
    threshold: f32,
    t_infer: Timer,
    t_extract: Timer,
}

impl PalmDetector {
    pub const DEFAULT_THRESHOLD: f32 = 0.3;

    /// Loads the network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::from_path(path)?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))
            .context("unexpected palm detection network layout")?;
        Ok(Self::from_cnn(cnn))
    }

    fn from_cnn(cnn: Cnn) -> Self {
        Self {
            cnn,
            anchors: Anchors::calculate(LAYERS),
            nms: NonMaxSuppression::new(),
            threshold: Self::DEFAULT_THRESHOLD,
            t_infer: Timer::new("palm"),
            t_extract: Timer::new("palm-extract"),
        }
    }

    /// Sets the minimum confidence of a palm candidate.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Detects palms in `image`.
    ///
    /// Returned rectangles and keypoints are in the pixel coordinates of `image`, ordered by
    /// descending confidence.
    pub fn detect(&self, image: &Image) -> anyhow::Result<Vec<Detection>> {
        let input_res = self.cnn.input_resolution();

        // Pad the input to the network's (square) aspect ratio; the padding reads as black.
        let aspect = input_res
            .aspect_ratio()
            .context("palm detection network has an empty input")?;
        let rect = image.rect().grow_to_fit_aspect(aspect);
        let view = image.view(rect);

        let outputs = self.t_infer.time(|| self.cnn.estimate(&view))?;
        let candidates = self
            .t_extract
            .time(|| extract(&self.anchors, input_res, &outputs, self.threshold))?;
        let mut detections = self.nms.process(candidates);

        // Network input coordinates -> `rect` coordinates -> image coordinates.
        let scale = rect.width() / input_res.width() as f32;
        for det in &mut detections {
            det.map_coords(scale, |x, y| (x * scale + rect.x(), y * scale + rect.y()));
        }

        log::trace!("{} palm(s) detected", detections.len());
        Ok(detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }
}

fn extract(
    anchors: &Anchors,
    input_res: Resolution,
    outputs: &Outputs,
    threshold: f32,
) -> anyhow::Result<Vec<Detection>> {
    let num_anchors = anchors.anchor_count();
    let boxes = outputs.view(0)?.into_dimensionality::<Ix3>()?;
    let scores = outputs.view(1)?.into_dimensionality::<Ix3>()?;

    if *boxes.shape() != [1, num_anchors, NUM_BOX_PARAMS] || *scores.shape() != [1, num_anchors, 1]
    {
        anyhow::bail!(
            "unexpected palm detection output shapes {:?} and {:?}",
            boxes.shape(),
            scores.shape()
        );
    }

    let mut detections = Vec::new();
    for index in 0..num_anchors {
        let confidence = sigmoid(scores[(0, index, 0)]);
        if confidence < threshold {
            continue;
        }

        let mut params = [0.0; NUM_BOX_PARAMS];
        for (i, param) in params.iter_mut().enumerate() {
            *param = boxes[(0, index, i)];
        }
        detections.push(decode_box(&anchors[index], input_res, &params, confidence));
    }

    Ok(detections)
}

fn decode_box(
    anchor: &Anchor,
    input_res: Resolution,
    params: &[f32; NUM_BOX_PARAMS],
    confidence: f32,
) -> Detection {
    let ax = anchor.x_center() * input_res.width() as f32;
    let ay = anchor.y_center() * input_res.height() as f32;

    let keypoints = params[4..]
        .chunks_exact(2)
        .map(|kp| Keypoint::new(kp[0] + ax, kp[1] + ay))
        .collect();

    Detection::with_keypoints(
        confidence,
        crate::rect::Rect::from_center(params[0] + ax, params[1] + ay, params[2], params[3]),
        keypoints,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_box_offsets_by_anchor() {
        let anchors = Anchors::calculate(LAYERS);
        let mut params = [0.0; NUM_BOX_PARAMS];
        params[0] = 2.0;
        params[1] = -4.0;
        params[2] = 30.0;
        params[3] = 40.0;
        params[4 + 2 * PalmKeypoint::MiddleFingerMcp as usize] = 1.0;

        let det = decode_box(&anchors[0], Resolution::new(192, 192), &params, 0.8);
        let rect = det.bounding_rect();
        assert_eq!(rect.center(), (4.0 + 2.0, 4.0 - 4.0));
        assert_eq!((rect.width(), rect.height()), (30.0, 40.0));
        assert_eq!(det.keypoints().len(), NUM_KEYPOINTS);
        assert_eq!(det.keypoints()[PalmKeypoint::Wrist as usize], Keypoint::new(4.0, 4.0));
        assert_eq!(
            det.keypoints()[PalmKeypoint::MiddleFingerMcp as usize],
            Keypoint::new(5.0, 4.0)
        );
        assert_eq!(det.confidence(), 0.8);
    }
}
