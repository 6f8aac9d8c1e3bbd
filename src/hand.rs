//! Hand detection with the MediaPipe palm detection and hand landmark networks.
//!
//! Detection is a two-step process: [`palm::PalmDetector`] finds palms in the whole frame, then a
//! square region of interest around each palm is handed to [`landmark::LandmarkNetwork`], which
//! locates the 21 hand landmarks.

pub mod landmark;
pub mod palm;

use std::path::Path;

use crate::{
    detection::Detection,
    image::Image,
    landmark::{HandDetector, HandLandmarks},
    rect::Rect,
    timer::Timer,
};

pub use landmark::{draw_skeleton, LandmarkIdx, CONNECTIVITY};

use self::{
    landmark::LandmarkNetwork,
    palm::{PalmDetector, PalmKeypoint},
};

/// A [`HandDetector`] running the MediaPipe "lite" hand networks with `tract`.
pub struct OnnxHandDetector {
    palm: PalmDetector,
    landmarks: LandmarkNetwork,
    max_hands: usize,
    t_landmarks: Timer,
}

impl OnnxHandDetector {
    pub const DEFAULT_MAX_HANDS: usize = 2;

    /// Hands whose landmark presence score is below this are discarded.
    pub const PRESENCE_THRESHOLD: f32 = 0.5;

    /// Size of the landmark region of interest, relative to the palm box.
    const ROI_SCALE: f32 = 2.6;

    /// Shift of the region of interest from the palm center towards the fingers, relative to the
    /// palm box height.
    const ROI_SHIFT: f32 = 0.5;

    /// Loads both networks from ONNX files.
    pub fn load<P: AsRef<Path>, L: AsRef<Path>>(
        palm_model: P,
        landmark_model: L,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            palm: PalmDetector::load(palm_model)?,
            landmarks: LandmarkNetwork::load(landmark_model)?,
            max_hands: Self::DEFAULT_MAX_HANDS,
            t_landmarks: Timer::new("landmarks"),
        })
    }

    /// Sets the minimum palm detection confidence.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.palm.set_threshold(threshold);
    }

    /// Sets the maximum number of hands reported per frame.
    pub fn set_max_hands(&mut self, max_hands: usize) {
        self.max_hands = max_hands;
    }
}

impl HandDetector for OnnxHandDetector {
    fn detect(&self, image: &Image) -> anyhow::Result<Vec<HandLandmarks>> {
        let mut hands = Vec::new();
        for palm in self.palm.detect(image)?.into_iter().take(self.max_hands) {
            let roi = image.view(roi_for_palm(&palm));
            let result = self.t_landmarks.time(|| self.landmarks.estimate(&roi))?;
            if result.presence() < Self::PRESENCE_THRESHOLD {
                log::trace!("dropping hand with presence {:.2}", result.presence());
                continue;
            }

            hands.push(result.to_frame(&roi, image.width(), image.height()));
        }

        Ok(hands)
    }

    fn timers(&self) -> Vec<&Timer> {
        self.palm.timers().chain([&self.t_landmarks]).collect()
    }
}

/// Computes the square landmark region of interest for a palm detection.
///
/// The palm box is shifted along the wrist-to-middle-finger direction so that the region covers the
/// fingers, then enlarged.
fn roi_for_palm(palm: &Detection) -> Rect {
    let rect = palm.bounding_rect();
    let (xc, yc) = rect.center();

    let (dx, dy) = match (
        palm.keypoints().get(PalmKeypoint::Wrist as usize),
        palm.keypoints().get(PalmKeypoint::MiddleFingerMcp as usize),
    ) {
        (Some(wrist), Some(finger)) => {
            let (dx, dy) = (finger.x() - wrist.x(), finger.y() - wrist.y());
            let len = dx.hypot(dy);
            if len > f32::EPSILON {
                (dx / len, dy / len)
            } else {
                (0.0, -1.0)
            }
        }
        // Assume an upright hand.
        _ => (0.0, -1.0),
    };

    let shift = rect.height() * OnnxHandDetector::ROI_SHIFT;
    let size = rect.width().max(rect.height()) * OnnxHandDetector::ROI_SCALE;
    Rect::from_center(xc + dx * shift, yc + dy * shift, size, size)
}
