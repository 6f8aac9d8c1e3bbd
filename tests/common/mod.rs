#![allow(dead_code)]

use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use signcam::{
    classifier::{ForestClassifier, LabelTable},
    image::{Color, Image},
    landmark::{HandDetector, HandLandmarks},
    predictor::FramePredictor,
    video::Camera,
};

/// Forest with a single split on the first feature: `<= 0.25` predicts class 0 ('A'), anything
/// else class 1 ('B').
pub const STUMP: &str = r#"{
    "model": {
        "n_features": 84,
        "classes": [0, 1],
        "trees": [{
            "children_left":  [1, -1, -1],
            "children_right": [2, -1, -1],
            "feature":        [0, -2, -2],
            "threshold":      [0.25, -2.0, -2.0],
            "value":          [[5, 5], [5, 0], [0, 5]]
        }]
    }
}"#;

pub fn write_stump(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("model.json");
    std::fs::write(&path, STUMP).unwrap();
    path
}

/// A detector that "sees" the same hands in every frame.
pub struct PosedDetector(pub Vec<HandLandmarks>);

impl HandDetector for PosedDetector {
    fn detect(&self, _: &Image) -> anyhow::Result<Vec<HandLandmarks>> {
        Ok(self.0.clone())
    }
}

/// An open hand: the wrist at the bottom, five fingers of four joints each spreading upwards.
///
/// The wrist is the leftmost and lowest point, so the first feature (its x offset) is 0.
pub fn open_hand(x: f32, y: f32, size: f32) -> HandLandmarks {
    let mut points = vec![[x, y + size]];
    for finger in 0..5 {
        for joint in 1..=4 {
            let fx = x + size * (finger as f32 + 1.0) / 6.0;
            let fy = y + size - size * joint as f32 / 4.0;
            points.push([fx, fy]);
        }
    }
    HandLandmarks::new(points)
}

/// Yields `remaining` frames filled with `color`, then fails.
pub struct FiniteCamera {
    pub remaining: usize,
    pub width: u32,
    pub height: u32,
    pub color: Color,
}

impl FiniteCamera {
    pub fn new(remaining: usize) -> Self {
        Self {
            remaining,
            width: 160,
            height: 120,
            color: Color::from_rgb8(90, 120, 200),
        }
    }
}

impl Camera for FiniteCamera {
    fn read(&mut self) -> anyhow::Result<Image> {
        if self.remaining == 0 {
            anyhow::bail!("no more frames");
        }
        self.remaining -= 1;
        let mut image = Image::new(self.width, self.height);
        image.clear(self.color);
        Ok(image)
    }
}

/// Yields frames forever, one every few milliseconds, and counts how many were read.
pub struct CountingCamera {
    pub reads: Arc<AtomicUsize>,
}

impl CountingCamera {
    pub fn new() -> Self {
        Self {
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Camera for CountingCamera {
    fn read(&mut self) -> anyhow::Result<Image> {
        thread::sleep(Duration::from_millis(5));
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut image = Image::new(160, 120);
        image.clear(Color::from_rgb8(200, 180, 40));
        Ok(image)
    }
}

pub fn stump_predictor(dir: &Path, hands: Vec<HandLandmarks>) -> FramePredictor {
    let labels = LabelTable::asl();
    let classifier = ForestClassifier::load(write_stump(dir), &labels).unwrap();
    FramePredictor::new(Box::new(PosedDetector(hands)), Box::new(classifier), labels)
}
