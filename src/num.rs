//! Utilities for numerics.

use std::cmp::Ordering;

/// An `f32` that implements [`Ord`] according to the IEEE 754 totalOrder predicate.
#[derive(Debug, Clone, Copy)]
pub struct TotalF32(pub f32);

impl PartialEq for TotalF32 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TotalF32 {}

impl PartialOrd for TotalF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        f32::total_cmp(&self.0, &other.0)
    }
}

/// Applies the standard sigmoid/logistic function to the input.
pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Converts a normalized coordinate to a pixel coordinate, truncating towards zero.
///
/// Out-of-range results saturate at the `i32` limits.
pub fn to_pixel(normalized: f32, extent: u32) -> i32 {
    (normalized * extent as f32) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_order() {
        let mut values = [TotalF32(1.0), TotalF32(-2.0), TotalF32(0.5)];
        values.sort();
        assert_eq!(values.map(|v| v.0), [-2.0, 0.5, 1.0]);
    }

    #[test]
    fn sigmoid_midpoint() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn pixel_truncation() {
        assert_eq!(to_pixel(0.5, 640), 320);
        assert_eq!(to_pixel(0.999, 10), 9);
        assert_eq!(to_pixel(-0.05, 100), -5);
        assert_eq!(to_pixel(-0.001, 100), 0);
    }
}
