use super::*;
use Color as C;

const YELLOW: Color = Color::from_rgb8(255, 255, 0);
const BLUE: Color = Color::from_rgb8(0, 0, 255);

fn mkimage<const W: usize, const H: usize>(data: [[Color; W]; H]) -> Image {
    let mut image = Image::new(W as u32, H as u32);
    for (y, row) in data.into_iter().enumerate() {
        for (x, color) in row.into_iter().enumerate() {
            image.set(x as u32, y as u32, color);
        }
    }
    image
}

#[test]
fn new_image_is_opaque_black() {
    let image = Image::new(4, 3);
    assert_eq!(image.resolution(), Resolution::new(4, 3));
    assert!(image.is_uniform(C::BLACK));
    assert_eq!(image.get(3, 2), C::BLACK);
}

#[test]
fn view() {
    let image = mkimage([[C::RED, C::GREEN]]);

    let view = image.view(Rect::from_top_left(1.0, 0.0, 1.0, 1.0));
    assert_eq!(view.width(), 1);
    assert_eq!(view.height(), 1);
    assert_eq!(view.get(0, 0), C::GREEN);

    let view = image.view(Rect::from_top_left(1.0, 0.0, 99.0, 100.0));
    assert_eq!(view.width(), 99);
    assert_eq!(view.height(), 100);
    assert_eq!(view.get(0, 0), C::GREEN);
    assert_eq!(view.get(0, 1), C::NULL);
    assert_eq!(view.get(1, 0), C::NULL);

    let view = image.view(Rect::from_top_left(-1.0, 0.0, 2.0, 1.0));
    assert_eq!(view.get(0, 0), C::NULL);
    assert_eq!(view.get(1, 0), C::RED);
}

#[test]
fn sample_nearest() {
    #[rustfmt::skip]
    let image = mkimage([
        [YELLOW, C::WHITE],
        [BLUE, C::RED],
    ]);

    let view = image.as_view();
    assert_eq!(view.sample(0.0, 0.0), YELLOW);
    assert_eq!(view.sample(0.75, 0.0), C::WHITE);
    assert_eq!(view.sample(0.25, 0.75), BLUE);
    assert_eq!(view.sample(0.99, 0.99), C::RED);
}

#[test]
fn jpeg_roundtrip_preserves_dimensions() {
    let mut image = Image::new(37, 21);
    image.clear(C::from_rgb8(200, 30, 90));
    draw::rect(&mut image, 2, 2, 30, 15).color(C::WHITE).stroke_width(3);

    let jpeg = image.encode_jpeg(95).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "missing SOI marker");

    let decoded = Image::decode_jpeg(&jpeg).unwrap();
    assert_eq!(decoded.resolution(), image.resolution());
}

#[test]
fn jpeg_quality_is_validated() {
    let image = Image::new(8, 8);
    assert!(image.encode_jpeg(0).is_err());
    assert!(image.encode_jpeg(101).is_err());
    assert!(image.encode_jpeg(1).is_ok());
}

#[test]
fn decode_garbage_fails() {
    assert!(Image::decode_jpeg(b"definitely not a jpeg").is_err());
}

#[test]
fn draw_rect_outline() {
    let mut image = Image::new(20, 20);
    draw::rect(&mut image, 5, 5, 14, 14).color(C::WHITE);

    assert_eq!(image.get(5, 5), C::WHITE);
    assert_eq!(image.get(14, 14), C::WHITE);
    assert_eq!(image.get(10, 5), C::WHITE);
    // interior and exterior untouched
    assert_eq!(image.get(10, 10), C::BLACK);
    assert_eq!(image.get(0, 0), C::BLACK);
}

#[test]
fn draw_rect_partially_offscreen() {
    let mut image = Image::new(10, 10);
    draw::rect(&mut image, -5, -5, 4, 4).color(C::WHITE);
    assert_eq!(image.get(4, 0), C::WHITE);
    assert_eq!(image.get(0, 4), C::WHITE);
    assert_eq!(image.get(2, 2), C::BLACK);
}

#[test]
fn draw_line_and_circle() {
    let mut image = Image::new(10, 10);
    draw::line(&mut image, (0, 0), (9, 0)).color(C::RED);
    for x in 0..10 {
        assert_eq!(image.get(x, 0), C::RED);
    }

    draw::circle(&mut image, 5, 5, 3).color(C::GREEN).filled();
    assert_eq!(image.get(5, 5), C::GREEN);
    assert_eq!(image.get(9, 9), C::BLACK);
}

#[test]
fn draw_text_touches_pixels() {
    let mut image = Image::new(60, 40);
    draw::text(&mut image, 5, 30, "A")
        .large()
        .thickness(3)
        .align_left()
        .align_bottom()
        .color(YELLOW);

    assert!(!image.is_uniform(C::BLACK));
    // the glyph sits above the baseline anchor
    for y in 31..40 {
        for x in 0..60 {
            assert_eq!(image.get(x, y), C::BLACK);
        }
    }
}
