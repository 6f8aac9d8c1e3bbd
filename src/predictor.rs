//! Per-frame prediction: detection, classification and annotation.

use anyhow::Context;

use crate::{
    classifier::{Classifier, LabelTable},
    features::{self, BoundingBox},
    hand::draw_skeleton,
    image::{draw, Color, Image},
    landmark::HandDetector,
    timer::Timer,
};

const BOX_COLOR: Color = Color::BLACK;
const BOX_STROKE_WIDTH: u32 = 4;
const LABEL_COLOR: Color = Color::from_rgb8(0, 250, 255);
const LABEL_THICKNESS: u32 = 3;
/// Distance between the label's baseline and the top of the bounding box.
const LABEL_GAP: i32 = 10;

/// The outcome of a successful prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub label: char,
    pub bounds: BoundingBox,
}

/// Runs the detector and classifier on frames and annotates them with the result.
pub struct FramePredictor {
    detector: Box<dyn HandDetector>,
    classifier: Box<dyn Classifier>,
    labels: LabelTable,
    t_detect: Timer,
    t_classify: Timer,
    t_draw: Timer,
}

impl FramePredictor {
    pub fn new(
        detector: Box<dyn HandDetector>,
        classifier: Box<dyn Classifier>,
        labels: LabelTable,
    ) -> Self {
        Self {
            detector,
            classifier,
            labels,
            t_detect: Timer::new("detect"),
            t_classify: Timer::new("classify"),
            t_draw: Timer::new("draw"),
        }
    }

    /// Predicts the letter shown in `frame` and draws the hand skeletons, bounding box and label
    /// onto it.
    ///
    /// Returns `Ok(None)` and leaves `frame` untouched if no hand is detected.
    pub fn predict(&self, frame: &mut Image) -> anyhow::Result<Option<Prediction>> {
        let hands = self.t_detect.time(|| self.detector.detect(frame))?;
        if hands.is_empty() {
            return Ok(None);
        }

        self.t_draw.time(|| {
            for hand in &hands {
                draw_skeleton(frame, hand);
            }
        });

        let Some(features) = features::extract(&hands, frame.width(), frame.height()) else {
            return Ok(None);
        };

        let index = self
            .t_classify
            .time(|| self.classifier.predict(&features.vector))?;
        let label = self
            .labels
            .get(index)
            .with_context(|| format!("classifier returned unknown class index {index}"))?;

        let BoundingBox { x1, y1, x2, y2 } = features.bounds;
        log::trace!("predicted '{label}' at ({x1}, {y1})-({x2}, {y2})");

        self.t_draw.time(|| {
            draw::rect(frame, x1, y1, x2, y2)
                .color(BOX_COLOR)
                .stroke_width(BOX_STROKE_WIDTH);
            draw::text(frame, x1, y1 - LABEL_GAP, &label.to_string())
                .large()
                .thickness(LABEL_THICKNESS)
                .align_left()
                .align_bottom()
                .color(LABEL_COLOR);
        });

        Ok(Some(Prediction {
            label,
            bounds: features.bounds,
        }))
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Returns the stage timers followed by the detector's own timers.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_detect, &self.t_classify, &self.t_draw]
            .into_iter()
            .chain(self.detector.timers())
    }
}
