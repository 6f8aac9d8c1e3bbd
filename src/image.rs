//! Image handling.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA frame.
//! - [`ImageView`], a borrowed axis-aligned window into an [`Image`] that may extend past its
//!   borders.
//! - JPEG decoding and encoding.
//! - A set of [`draw`] functions to annotate frames.

pub mod draw;
mod color;
mod jpeg;
mod resolution;

#[cfg(test)]
mod tests;

use std::fmt;

use image::{ImageBuffer, Rgba, RgbaImage};

pub use color::Color;
pub use resolution::{AspectRatio, Resolution};

use crate::rect::Rect;

/// An 8-bit sRGB frame with alpha channel.
///
/// Camera frames are always fully opaque; the alpha channel only exists to match the layout the
/// drawing code and the network input mapping work with, and is dropped on JPEG encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Decodes a JFIF JPEG or Motion JPEG frame from a byte slice.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        jpeg::decode_jpeg(data)
    }

    /// Encodes this image as a baseline JPEG with the given quality (1-100).
    pub fn encode_jpeg(&self, quality: u8) -> anyhow::Result<Vec<u8>> {
        jpeg::encode_jpeg(self, quality)
    }

    /// Creates an image of a specified size, filled with opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::from_pixel(width, height, Rgba(Color::BLACK.0)),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] positioned at `(0, 0)` covering this image.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Creates an immutable view into an area of this image, specified by `rect`.
    ///
    /// If `rect` lies partially outside of `self`, the pixels that are outside of `self` will have
    /// the value [`Color::NULL`]. The returned view always has the size of `rect`.
    pub fn view(&self, rect: Rect) -> ImageView<'_> {
        ImageView { image: self, rect }
    }

    /// Clears the image, setting every pixel value to `color`.
    pub fn clear(&mut self, color: Color) {
        self.buf.pixels_mut().for_each(|pix| pix.0 = color.0);
    }

    /// Returns `true` if every pixel has the same RGB value as `color`, ignoring alpha.
    pub fn is_uniform(&self, color: Color) -> bool {
        self.buf.pixels().all(|pix| pix.0[..3] == color.0[..3])
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

/// An immutable view of a rectangular section of an [`Image`].
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    /// Rectangle in the image's coordinates.
    rect: Rect,
}

impl<'a> ImageView<'a> {
    /// Returns the width of this view, in pixels.
    pub fn width(&self) -> u32 {
        self.rect.width() as u32
    }

    /// Returns the height of this view, in pixels.
    pub fn height(&self) -> u32 {
        self.rect.height() as u32
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the area of the underlying [`Image`] covered by this view.
    #[inline]
    pub fn image_rect(&self) -> Rect {
        self.rect
    }

    /// Gets the color at the given view-relative pixel coordinates.
    ///
    /// Coordinates that fall outside of the underlying [`Image`] read as [`Color::NULL`].
    pub fn get(&self, x: u32, y: u32) -> Color {
        let ix = (self.rect.x() + x as f32).round();
        let iy = (self.rect.y() + y as f32).round();
        if ix < 0.0 || iy < 0.0 {
            return Color::NULL;
        }

        let (ix, iy) = (ix as u32, iy as u32);
        if ix >= self.image.width() || iy >= self.image.height() {
            return Color::NULL;
        }
        self.image.get(ix, iy)
    }

    /// Samples the view at normalized coordinates, using nearest-neighbor interpolation.
    pub fn sample(&self, u: f32, v: f32) -> Color {
        let x = (u * self.rect.width()).floor();
        let y = (v * self.rect.height()).floor();
        if x < 0.0 || y < 0.0 {
            return Color::NULL;
        }
        self.get(x as u32, y as u32)
    }

}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ImageView", self.width(), self.height())
    }
}

/// Trait for types that can be treated as read-only views of image data.
pub trait AsImageView {
    /// Returns an [`ImageView`] covering `self`.
    fn as_view(&self) -> ImageView<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(self.rect())
    }
}

impl<'a> AsImageView for ImageView<'a> {
    fn as_view(&self) -> ImageView<'_> {
        *self
    }
}
