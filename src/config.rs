//! Runtime configuration.

use std::{
    env,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};

use crate::{
    hand::{palm::PalmDetector, OnnxHandDetector},
    video::CameraSource,
};

const ENV_ADDR: &str = "SIGNCAM_ADDR";
const ENV_MODEL_DIR: &str = "SIGNCAM_MODEL_DIR";
const ENV_CAMERA: &str = "SIGNCAM_CAMERA";
const ENV_JPEG_QUALITY: &str = "SIGNCAM_JPEG_QUALITY";

/// Server settings.
///
/// [`Config::default`] reproduces the fixed behavior; [`Config::from_env`] applies the overrides
/// listed in the crate documentation on top of it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub addr: SocketAddr,
    /// Directory containing `model.json`, `palm_detection_lite.onnx` and
    /// `hand_landmark_lite.onnx`.
    pub model_dir: PathBuf,
    pub camera: CameraSource,
    /// Quality of the streamed JPEG frames, 1 to 100.
    pub jpeg_quality: u8,
    /// Minimum palm detection confidence.
    pub detection_threshold: f32,
    pub max_hands: usize,
}

impl Config {
    pub const DEFAULT_PORT: u16 = 5001;
    pub const DEFAULT_JPEG_QUALITY: u8 = 95;

    /// Builds a configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(addr) = var(ENV_ADDR) {
            config.addr = addr
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_ADDR} '{addr}'"))?;
        }
        if let Some(dir) = var(ENV_MODEL_DIR) {
            if dir.is_empty() {
                bail!("{ENV_MODEL_DIR} is set but empty");
            }
            config.model_dir = dir.into();
        }
        if let Some(camera) = var(ENV_CAMERA) {
            config.camera = match camera.parse() {
                Ok(camera) => camera,
                Err(infallible) => match infallible {},
            };
        }
        if let Some(quality) = var(ENV_JPEG_QUALITY) {
            let parsed = quality
                .trim()
                .parse::<u8>()
                .with_context(|| format!("invalid {ENV_JPEG_QUALITY} '{quality}'"))?;
            if !(1..=100).contains(&parsed) {
                bail!("{ENV_JPEG_QUALITY} must be between 1 and 100, got {parsed}");
            }
            config.jpeg_quality = parsed;
        }
        Ok(config)
    }

    pub fn classifier_path(&self) -> PathBuf {
        self.model_dir.join("model.json")
    }

    pub fn palm_model_path(&self) -> PathBuf {
        self.model_dir.join("palm_detection_lite.onnx")
    }

    pub fn landmark_model_path(&self) -> PathBuf {
        self.model_dir.join("hand_landmark_lite.onnx")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: (Ipv4Addr::UNSPECIFIED, Self::DEFAULT_PORT).into(),
            model_dir: default_model_dir(),
            camera: CameraSource::default(),
            jpeg_quality: Self::DEFAULT_JPEG_QUALITY,
            detection_threshold: PalmDetector::DEFAULT_THRESHOLD,
            max_hands: OnnxHandDetector::DEFAULT_MAX_HANDS,
        }
    }
}

/// `asl/` next to the executable, or relative to the working directory if the executable path is
/// unknown.
fn default_model_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("asl"), |dir| dir.join("asl"))
}
