//! Multipart MJPEG frame generator.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    predictor::FramePredictor,
    timer::{FpsCounter, Timer},
    video::SharedCamera,
};

/// Wraps an encoded JPEG image in a multipart part delimited by the `frame` boundary.
pub fn frame_part(jpeg: &[u8]) -> Bytes {
    const HEAD: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
    const TAIL: &[u8] = b"\r\n\r\n";

    let mut part = BytesMut::with_capacity(HEAD.len() + jpeg.len() + TAIL.len());
    part.put_slice(HEAD);
    part.put_slice(jpeg);
    part.put_slice(TAIL);
    part.freeze()
}

/// An endless sequence of annotated frames, each wrapped by [`frame_part`].
///
/// Iteration blocks on the camera. The sequence ends when the camera fails or a frame cannot be
/// encoded; it is fused and does not restart afterwards.
pub struct FrameStream {
    camera: SharedCamera,
    predictor: Arc<FramePredictor>,
    jpeg_quality: u8,
    done: bool,
    fps: FpsCounter,
    t_capture: Timer,
    t_encode: Timer,
}

impl FrameStream {
    pub fn new(camera: SharedCamera, predictor: Arc<FramePredictor>, jpeg_quality: u8) -> Self {
        Self {
            camera,
            predictor,
            jpeg_quality,
            done: false,
            fps: FpsCounter::new("stream"),
            t_capture: Timer::new("capture"),
            t_encode: Timer::new("encode"),
        }
    }
}

impl Iterator for FrameStream {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.done {
            return None;
        }

        // The lock is held for a single read only, so concurrent streams take turns.
        let frame = self.t_capture.time(|| self.camera.lock().read());
        let mut frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                log::info!("camera stopped delivering frames, ending stream: {e:#}");
                self.done = true;
                return None;
            }
        };

        if let Err(e) = self.predictor.predict(&mut frame) {
            log::error!("prediction failed: {e:#}");
        }

        let jpeg = match self.t_encode.time(|| frame.encode_jpeg(self.jpeg_quality)) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                log::error!("failed to encode frame, ending stream: {e:#}");
                self.done = true;
                return None;
            }
        };

        self.fps.tick_with(
            [&self.t_capture, &self.t_encode]
                .into_iter()
                .chain(self.predictor.timers()),
        );
        Some(frame_part(&jpeg))
    }
}

impl std::iter::FusedIterator for FrameStream {}
