//! Synthetic textures and encoding helpers shared by the unit tests.

use crate::types::SAMPLE_SIZE;
use image::GrayImage;
use std::io::Cursor;

/// Fine checkerboard, the "enrolled" texture in most tests. Shifting the
/// phase stands in for "another photo of the same face".
pub(crate) fn checkerboard(block: u32, phase: u32) -> GrayImage {
    GrayImage::from_fn(SAMPLE_SIZE, SAMPLE_SIZE, |x, y| {
        let on = (((x + phase) / block) + (y / block)) % 2 == 0;
        image::Luma([if on { 220 } else { 30 }])
    })
}

/// Smooth horizontal gradient, an unrelated texture.
pub(crate) fn gradient() -> GrayImage {
    GrayImage::from_fn(SAMPLE_SIZE, SAMPLE_SIZE, |x, _| {
        image::Luma([(x * 255 / SAMPLE_SIZE) as u8])
    })
}

pub(crate) fn png_bytes(img: &GrayImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
    cursor.into_inner()
}
