//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.
//!
//! The device is owned by a dedicated capture thread; [`Webcam`] is a handle that requests frames
//! from it, so it can be moved to and shared between other threads.

use std::{cmp::Reverse, thread};

use anyhow::{anyhow, bail, Context};
use crossbeam::channel::{self, Receiver, Sender};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{
    image::{Image, Resolution},
    timer::{FpsCounter, Timer},
};

use super::Camera;

#[derive(Debug, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
}

impl Default for FramePrefs {
    fn default() -> Self {
        Self {
            resolution: Some(Resolution::RES_VGA),
            fps: Some(30),
        }
    }
}

/// Device selection and format negotiation options.
///
/// By default, the first suitable device is opened at VGA resolution and 30 FPS, or the closest
/// format it supports.
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Sets the card name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

}

#[derive(Debug, Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

fn negotiate_format(device: &Device, mut prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        let fourcc = format.pixel_format();
        if fourcc == PixelFormat::JPEG || fourcc == PixelFormat::MJPG {
            pixel_format = Some(fourcc);
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    loop {
        if let Some(fmt) = select_format(&formats, prefs) {
            return Ok((
                PixFormat::new(
                    fmt.resolution.width(),
                    fmt.resolution.height(),
                    pixel_format,
                ),
                fmt.frame_interval,
            ));
        }

        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        if !relax(&mut prefs) {
            break;
        }
        log::debug!("retrying with new prefs {:?}", prefs);
    }

    bail!("failed to negotiate a webcam format")
}

/// Drops the frame rate preference, then the resolution preference. Returns `false` if there was
/// nothing left to drop.
fn relax(prefs: &mut FramePrefs) -> bool {
    prefs.fps.take().is_some() || prefs.resolution.take().is_some()
}

/// Picks the best of `formats` meeting `prefs`.
///
/// Formats meeting or exceeding the preferences are eligible. Among them, the smallest resolution at
/// the highest frame rate wins.
fn select_format(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut eligible = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| {
                (1.0 / fmt.frame_interval.as_f32()).round() >= fps as f32
            })
        })
        .copied()
        .collect::<Vec<_>>();
    eligible.sort_by_key(|fmt| {
        (
            Reverse(fmt.resolution.num_pixels()),
            Reverse(fmt.frame_interval),
        )
    });
    eligible.last().copied()
}

/// The device end of a [`Webcam`], living on the capture thread.
struct Capture {
    stream: ReadStream,
    width: u32,
    height: u32,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Capture {
    fn open(options: &WebcamOptions) -> anyhow::Result<Self> {
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_device(dev, options) {
                    Ok(Some(capture)) => return Ok(capture),
                    Ok(None) => {}
                    Err(e) => log::debug!("{}", e),
                },
                Err(e) => log::warn!("{}", e),
            }
        }

        match &options.name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_device(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = &options.name {
            if caps.card() != name.as_str() {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.frame)?;
        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let (width, height) = (format.width(), format.height());
        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {}x{} @ {:.1}Hz",
            caps.card(),
            path.display(),
            width,
            height,
            1.0 / actual.as_f32(),
        );

        Ok(Some(Self {
            stream: capture.into_stream()?,
            width,
            height,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let (width, height) = (self.width, self.height);
        let t_decode = &self.t_decode;
        self.stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                let image = match t_decode.time(|| Image::decode_jpeg(&buf)) {
                    Ok(image) => image,
                    Err(e) => {
                        // Webcams occasionally produce corrupted MJPG frames. Hand back a blank
                        // frame instead of ending the stream.
                        log::error!("webcam decode error: {}", e);
                        Image::new(width, height)
                    }
                };
                Ok(image)
            })
            .map_err(Into::into)
    }

    fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

/// A V4L2 webcam yielding [`Image`]s.
pub struct Webcam {
    requests: Sender<()>,
    frames: Receiver<anyhow::Result<Image>>,
}

impl Webcam {
    /// Opens the first webcam matching `options`.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        let (opened_tx, opened_rx) = channel::bounded(1);
        let (requests, request_rx) = channel::bounded::<()>(0);
        let (frame_tx, frames) = channel::bounded(1);

        thread::Builder::new()
            .name("webcam".into())
            .spawn(move || {
                let mut capture = match Capture::open(&options) {
                    Ok(capture) => {
                        opened_tx.send(Ok(())).ok();
                        capture
                    }
                    Err(e) => {
                        opened_tx.send(Err(e)).ok();
                        return;
                    }
                };

                let mut fps = FpsCounter::new("webcam");
                // Ends when the `Webcam` handle is dropped.
                for () in request_rx {
                    if frame_tx.send(capture.read()).is_err() {
                        break;
                    }
                    fps.tick_with(capture.timers());
                }
                log::debug!("webcam capture thread exiting");
            })
            .context("failed to spawn webcam capture thread")?;

        opened_rx
            .recv()
            .context("webcam capture thread exited unexpectedly")??;

        Ok(Self { requests, frames })
    }
}

impl Camera for Webcam {
    fn read(&mut self) -> anyhow::Result<Image> {
        self.requests
            .send(())
            .map_err(|_| anyhow!("webcam capture thread has stopped"))?;
        self.frames
            .recv()
            .map_err(|_| anyhow!("webcam capture thread has stopped"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(width: u32, height: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(width, height),
            frame_interval: Fract::new(1, fps),
        }
    }

    #[test]
    fn selects_smallest_format_meeting_prefs() {
        let formats = [
            fmt(320, 240, 30),
            fmt(640, 480, 30),
            fmt(640, 480, 15),
            fmt(1280, 720, 30),
            fmt(1920, 1080, 5),
        ];

        let selected = select_format(&formats, FramePrefs::default()).unwrap();
        assert_eq!(selected.resolution, Resolution::RES_VGA);
        assert_eq!(selected.frame_interval, Fract::new(1, 30));
    }

    #[test]
    fn relaxes_preferences() {
        let formats = [fmt(320, 240, 30), fmt(1920, 1080, 5)];
        let mut prefs = FramePrefs::default();
        assert!(select_format(&formats, prefs).is_none());

        // fps is dropped first
        assert!(relax(&mut prefs));
        assert_eq!(prefs.fps, None);
        let selected = select_format(&formats, prefs).unwrap();
        assert_eq!(selected.resolution, Resolution::new(1920, 1080));

        assert!(relax(&mut prefs));
        assert!(!relax(&mut prefs));
    }
}
