//! Hand landmark estimation and the hand skeleton overlay.

use std::path::Path;

use anyhow::Context;

use crate::{
    image::{draw, Color, Image, ImageView},
    landmark::HandLandmarks,
    nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork},
};

/// Names for the hand landmarks, in network output order.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Bone connections drawn by [`draw_skeleton`].
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Palm:
        (Wrist, ThumbCmc),
        (Wrist, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

const BONE_COLOR: Color = Color::from_rgb8(224, 224, 224);
const JOINT_COLOR: Color = Color::from_rgb8(255, 48, 48);

/// Draws the skeleton overlay of a hand onto `image`: a line per bone and a dot per landmark.
///
/// Bones whose endpoints are missing from `hand` are skipped, so hands with fewer than 21
/// landmarks only get their joints drawn.
pub fn draw_skeleton(image: &mut Image, hand: &HandLandmarks) {
    let points = hand
        .pixel_positions(image.width(), image.height())
        .collect::<Vec<_>>();

    for &(a, b) in CONNECTIVITY {
        if let (Some(&a), Some(&b)) = (points.get(a as usize), points.get(b as usize)) {
            draw::line(image, a, b).color(BONE_COLOR).stroke_width(2);
        }
    }
    for &(x, y) in &points {
        draw::circle(image, x, y, 5).color(JOINT_COLOR).filled();
    }
}

/// Output of the hand landmark network for one region of interest.
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    /// Landmark positions relative to the network input, normalized to `[0, 1]`.
    positions: Vec<[f32; 2]>,
    presence: f32,
}

impl LandmarkResult {
    /// Returns the network's confidence that the region of interest actually contains a hand.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Maps the landmarks into the frame the region of interest `roi` was taken from, normalizing
    /// them to that frame's size.
    pub fn to_frame(&self, roi: &ImageView<'_>, frame_width: u32, frame_height: u32) -> HandLandmarks {
        let rect = roi.image_rect();
        self.positions
            .iter()
            .map(|&[x, y]| {
                [
                    (rect.x() + x * rect.width()) / frame_width as f32,
                    (rect.y() + y * rect.height()) / frame_height as f32,
                ]
            })
            .collect()
    }
}

/// The "lite" MediaPipe hand landmark network.
pub struct LandmarkNetwork {
    cnn: Cnn,
}

impl LandmarkNetwork {
    /// Loads the network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::from_path(path)?;
        if nn.num_outputs() < 2 {
            anyhow::bail!(
                "hand landmark network has {} outputs, expected at least 2",
                nn.num_outputs()
            );
        }
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))
            .context("unexpected hand landmark network layout")?;
        Ok(Self { cnn })
    }

    /// Estimates the landmarks of the hand shown in `roi`.
    pub fn estimate(&self, roi: &ImageView<'_>) -> anyhow::Result<LandmarkResult> {
        let input_res = self.cnn.input_resolution();
        let outputs = self.cnn.estimate(roi)?;

        let screen_landmarks = outputs.view(0)?;
        let presence = outputs.view(1)?;
        let (Some(coords), Some(&presence)) = (screen_landmarks.as_slice(), presence.iter().next())
        else {
            anyhow::bail!("hand landmark network produced empty or non-contiguous outputs");
        };
        if coords.len() != HandLandmarks::NUM_LANDMARKS * 3 {
            anyhow::bail!(
                "hand landmark network produced {} values, expected {}",
                coords.len(),
                HandLandmarks::NUM_LANDMARKS * 3
            );
        }

        let (w, h) = (input_res.width() as f32, input_res.height() as f32);
        let positions = coords
            .chunks_exact(3)
            .map(|xyz| [xyz[0] / w, xyz[1] / h])
            .collect();

        Ok(LandmarkResult { positions, presence })
    }
}
