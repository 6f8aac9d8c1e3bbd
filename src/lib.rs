//! American Sign Language letter recognition on a live camera feed.
//!
//! Frames are pulled from a camera, hands are located by an ONNX palm detector and landmark
//! network, the landmark coordinates are classified by a decision forest into a letter, and the
//! annotated frames are streamed to any number of clients as a Motion JPEG feed at
//! `GET /asl_stream`.
//!
//! # Environment Variables
//!
//! The defaults can be overridden by setting environment variables:
//!
//! * `SIGNCAM_ADDR`: socket address the server binds to. Defaults to `0.0.0.0:5001`.
//! * `SIGNCAM_MODEL_DIR`: directory containing `model.json`, `palm_detection_lite.onnx` and
//!   `hand_landmark_lite.onnx`. Defaults to `asl/` next to the executable.
//! * `SIGNCAM_CAMERA`: either the V4L2 card name of a webcam, or an `http://` URL of a Motion JPEG
//!   stream (such as an IP camera app, or another instance of this server). If unset, the first
//!   webcam that supports a compatible image format is used.
//! * `SIGNCAM_JPEG_QUALITY`: quality of the streamed frames, from 1 to 100. Defaults to 95.
//!
//! `RUST_LOG` is honored as usual by [`init_logger!`].

use log::LevelFilter;

pub mod bootstrap;
pub mod classifier;
pub mod config;
pub mod detection;
pub mod features;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod predictor;
pub mod rect;
pub mod server;
pub mod stream;
pub mod timer;
pub mod video;


/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library log at *debug* level, `tract_onnx` at *warn* level. Both
/// can be overridden with `RUST_LOG`.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
