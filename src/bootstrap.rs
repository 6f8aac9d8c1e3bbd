//! Startup: loads the models, opens the camera and assembles the shared state.

use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;

use crate::{
    classifier::{ForestClassifier, LabelTable},
    config::Config,
    hand::OnnxHandDetector,
    predictor::FramePredictor,
    stream::FrameStream,
    video::{Camera, SharedCamera},
};

/// State shared by all requests.
pub struct AppState {
    camera: SharedCamera,
    predictor: Arc<FramePredictor>,
    jpeg_quality: u8,
}

impl AppState {
    pub fn new(camera: Box<dyn Camera>, predictor: FramePredictor, jpeg_quality: u8) -> Self {
        Self {
            camera: Arc::new(Mutex::new(camera)),
            predictor: Arc::new(predictor),
            jpeg_quality,
        }
    }

    /// Starts a new frame sequence for one client.
    pub fn frames(&self) -> FrameStream {
        FrameStream::new(
            self.camera.clone(),
            self.predictor.clone(),
            self.jpeg_quality,
        )
    }
}

/// Loads everything the server needs. Any failure is fatal.
pub fn bootstrap(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let labels = LabelTable::asl();
    let classifier = ForestClassifier::load(config.classifier_path(), &labels)?;
    log::info!("loaded classifier from '{}'", config.classifier_path().display());

    let mut detector =
        OnnxHandDetector::load(config.palm_model_path(), config.landmark_model_path())
            .context("failed to load hand detector")?;
    detector.set_threshold(config.detection_threshold);
    detector.set_max_hands(config.max_hands);
    log::info!("loaded hand detector from '{}'", config.model_dir.display());

    let camera = config
        .camera
        .open()
        .with_context(|| format!("failed to open {}", config.camera))?;
    log::info!("opened {}", config.camera);

    let predictor = FramePredictor::new(Box::new(detector), Box::new(classifier), labels);
    Ok(Arc::new(AppState::new(
        camera,
        predictor,
        config.jpeg_quality,
    )))
}
