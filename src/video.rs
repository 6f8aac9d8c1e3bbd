//! Frame sources.
//!
//! Two [`Camera`] implementations are provided: [`webcam::Webcam`] for local V4L2 devices and
//! [`httpcam::HttpCamera`] for IP cameras serving Motion JPEG over HTTP.

pub mod httpcam;
pub mod webcam;

use std::{fmt, str::FromStr, sync::Arc};

use parking_lot::Mutex;

use crate::image::Image;

use self::{
    httpcam::HttpCamera,
    webcam::{Webcam, WebcamOptions},
};

/// A source of frames.
///
/// Frames are pulled one at a time. An error means the source is gone for good; callers stop
/// reading after the first one.
pub trait Camera: Send {
    /// Reads the next frame, blocking until one is available.
    fn read(&mut self) -> anyhow::Result<Image>;
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn read(&mut self) -> anyhow::Result<Image> {
        (**self).read()
    }
}

/// A camera shared between all connected clients.
///
/// Every reader locks it for the duration of a single [`Camera::read`].
pub type SharedCamera = Arc<Mutex<Box<dyn Camera>>>;

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    /// A local V4L2 device, optionally selected by its card name.
    Webcam { name: Option<String> },
    /// An MJPEG-over-HTTP stream at the given `http://` URL.
    Http(String),
}

impl CameraSource {
    /// Opens the camera described by `self`.
    pub fn open(&self) -> anyhow::Result<Box<dyn Camera>> {
        match self {
            CameraSource::Webcam { name } => {
                let mut options = WebcamOptions::default();
                if let Some(name) = name {
                    options = options.name(name.clone());
                }
                Ok(Box::new(Webcam::open(options)?))
            }
            CameraSource::Http(url) => Ok(Box::new(HttpCamera::connect(url)?)),
        }
    }
}

impl Default for CameraSource {
    fn default() -> Self {
        CameraSource::Webcam { name: None }
    }
}

impl FromStr for CameraSource {
    type Err = std::convert::Infallible;

    /// Strings starting with `http://` are stream URLs, anything else names a webcam. The empty
    /// string selects the first usable webcam.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.is_empty() {
            CameraSource::default()
        } else if s.starts_with("http://") {
            CameraSource::Http(s.to_string())
        } else {
            CameraSource::Webcam {
                name: Some(s.to_string()),
            }
        })
    }
}

impl fmt::Display for CameraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraSource::Webcam { name: None } => f.write_str("first available webcam"),
            CameraSource::Webcam { name: Some(name) } => write!(f, "webcam '{name}'"),
            CameraSource::Http(url) => write!(f, "stream {url}"),
        }
    }
}
