mod common;

use signcam::{
    features,
    image::{Color, Image},
};

use common::{open_hand, stump_predictor};

#[test]
fn posed_hand_is_recognized_as_a() {
    let dir = tempfile::tempdir().unwrap();
    let hand = open_hand(0.25, 0.25, 0.5);
    let predictor = stump_predictor(dir.path(), vec![hand.clone()]);

    let mut frame = Image::new(320, 240);
    frame.clear(Color::WHITE);
    let prediction = predictor.predict(&mut frame).unwrap().unwrap();

    assert_eq!(prediction.label, 'A');
    assert!(predictor.labels().contains(prediction.label));

    // The box overlaps the hand region (80..213, 60..180 in pixels).
    let b = prediction.bounds;
    assert!(b.x1 < 213 && b.x2 > 80 && b.y1 < 180 && b.y2 > 60, "{b:?}");
    assert_eq!(
        b,
        features::extract(&[hand], 320, 240).unwrap().bounds,
        "drawn box differs from the extracted one"
    );
    assert!(!frame.is_uniform(Color::WHITE));
    assert_eq!(frame.get(150, b.y1 as u32), Color::BLACK);
}

#[test]
fn moved_wrist_changes_the_letter() {
    let dir = tempfile::tempdir().unwrap();
    let mut hand = open_hand(0.25, 0.25, 0.5).points().to_vec();
    // Move the wrist to the right so its x offset exceeds the split threshold.
    hand[0][0] = 0.75;
    let predictor = stump_predictor(dir.path(), vec![hand.into_iter().collect()]);

    let mut frame = Image::new(320, 240);
    let prediction = predictor.predict(&mut frame).unwrap().unwrap();
    assert_eq!(prediction.label, 'B');
}

#[test]
fn blank_frame_is_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = stump_predictor(dir.path(), Vec::new());

    let mut frame = Image::new(320, 240);
    frame.clear(Color::from_rgb8(12, 34, 56));
    let original = frame.clone();

    assert_eq!(predictor.predict(&mut frame).unwrap(), None);
    assert_eq!(frame, original);
}
