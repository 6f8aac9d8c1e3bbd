use image::{buffer::ConvertBuffer, codecs::jpeg::JpegEncoder, ColorType, RgbImage};

use super::Image;

pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let buf = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8();
    log::trace!("decoded {}x{} JPEG", buf.width(), buf.height());
    Ok(Image { buf })
}

pub(super) fn encode_jpeg(image: &Image, quality: u8) -> anyhow::Result<Vec<u8>> {
    if !(1..=100).contains(&quality) {
        anyhow::bail!("invalid JPEG quality {quality} (must be between 1 and 100)");
    }

    // JPEG has no alpha channel, so drop it before handing the pixels to the encoder.
    let rgb: RgbImage = image.buf.convert();
    let mut out = Vec::with_capacity(rgb.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut out, quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok(out)
}
