//! Hand landmarks and the detector seam that produces them.

use crate::{image::Image, timer::Timer};

/// The ordered keypoints of one detected hand.
///
/// Coordinates are normalized to the frame: `x` is relative to its width, `y` to its height, so
/// points inside the frame lie in `[0, 1]`. Points slightly outside the frame are possible and are
/// kept as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    points: Vec<[f32; 2]>,
}

impl HandLandmarks {
    /// The number of landmarks produced for a hand by [`crate::hand::OnnxHandDetector`].
    pub const NUM_LANDMARKS: usize = 21;

    pub fn new(points: Vec<[f32; 2]>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[[f32; 2]] {
        &self.points
    }

    /// Returns an iterator over the landmark positions in pixel coordinates of a `width x height`
    /// frame.
    pub fn pixel_positions(&self, width: u32, height: u32) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.points.iter().map(move |&[x, y]| {
            (
                crate::num::to_pixel(x, width),
                crate::num::to_pixel(y, height),
            )
        })
    }
}

impl FromIterator<[f32; 2]> for HandLandmarks {
    fn from_iter<T: IntoIterator<Item = [f32; 2]>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Locates hands in a frame.
///
/// Implementations receive the frame as captured (8-bit sRGB) and take care of any conversion
/// their networks need.
pub trait HandDetector: Send + Sync {
    /// Returns one [`HandLandmarks`] per detected hand, possibly none.
    ///
    /// The order of the returned hands is the detector's and is preserved by the feature
    /// extraction.
    fn detect(&self, image: &Image) -> anyhow::Result<Vec<HandLandmarks>>;

    /// Returns the timers of the detector's internal stages, for FPS logging.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<D: HandDetector + ?Sized> HandDetector for Box<D> {
    fn detect(&self, image: &Image) -> anyhow::Result<Vec<HandLandmarks>> {
        (**self).detect(image)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_positions_truncate() {
        let hand: HandLandmarks = [[0.5, 0.25], [0.999, 0.0], [-0.05, 1.0]]
            .into_iter()
            .collect();
        assert_eq!(hand.len(), 3);
        let pixels = hand.pixel_positions(640, 480).collect::<Vec<_>>();
        assert_eq!(pixels, [(320, 120), (639, 0), (-32, 480)]);
    }
}
