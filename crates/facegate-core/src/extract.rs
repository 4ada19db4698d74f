//! Face extraction: detector boxes in, normalized training/matching crops out.

use crate::detector::FaceDetector;
use crate::types::{BoundingBox, SAMPLE_SIZE};
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Converts detected face regions into the matcher's required format:
/// single-channel, clamped to image bounds, resized to
/// [`SAMPLE_SIZE`]×[`SAMPLE_SIZE`].
pub struct FaceExtractor {
    detector: Box<dyn FaceDetector>,
}

impl FaceExtractor {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self { detector }
    }

    /// Decode raw bytes into the grayscale working format.
    pub fn decode(&self, bytes: &[u8]) -> Result<GrayImage, image::ImageError> {
        Ok(image::load_from_memory(bytes)?.to_luma8())
    }

    /// Normalized crops for every detected face, lazily, in detector order.
    /// Recomputed on every call; an empty iterator means no face was found —
    /// callers branch on emptiness, not on an error.
    pub fn crops<'a>(&self, image: &'a GrayImage) -> impl Iterator<Item = GrayImage> + 'a {
        self.detector
            .detect(image)
            .into_iter()
            .filter_map(move |bbox| crop_face(image, &bbox))
    }
}

/// Clamp a box to the image bounds and cut the normalized sample. A box that
/// clamps to zero width or height is dropped, not an error.
fn crop_face(image: &GrayImage, bbox: &BoundingBox) -> Option<GrayImage> {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let x0 = bbox.x.clamp(0.0, w);
    let y0 = bbox.y.clamp(0.0, h);
    let x1 = (bbox.x + bbox.width).clamp(0.0, w);
    let y1 = (bbox.y + bbox.height).clamp(0.0, h);

    let cw = (x1 - x0) as u32;
    let ch = (y1 - y0) as u32;
    if cw == 0 || ch == 0 {
        return None;
    }

    let region = imageops::crop_imm(image, x0 as u32, y0 as u32, cw, ch).to_image();
    Some(imageops::resize(
        &region,
        SAMPLE_SIZE,
        SAMPLE_SIZE,
        FilterType::Triangle,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::FullFrameDetector;

    struct FixedBoxes(Vec<BoundingBox>);

    impl FaceDetector for FixedBoxes {
        fn detect(&self, _image: &GrayImage) -> Vec<BoundingBox> {
            self.0.clone()
        }
    }

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_crops_are_sample_sized() {
        let extractor = FaceExtractor::new(Box::new(FullFrameDetector));
        let img = GrayImage::new(250, 190);
        let crops: Vec<_> = extractor.crops(&img).collect();
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].dimensions(), (SAMPLE_SIZE, SAMPLE_SIZE));
    }

    #[test]
    fn test_out_of_bounds_box_is_clamped() {
        let extractor = FaceExtractor::new(Box::new(FixedBoxes(vec![bbox(
            -20.0, -20.0, 400.0, 400.0,
        )])));
        let img = GrayImage::new(100, 100);
        assert_eq!(extractor.crops(&img).count(), 1);
    }

    #[test]
    fn test_degenerate_box_is_dropped() {
        let extractor = FaceExtractor::new(Box::new(FixedBoxes(vec![
            bbox(150.0, 150.0, 50.0, 50.0), // entirely outside a 100x100 frame
            bbox(10.0, 10.0, 0.0, 30.0),
        ])));
        let img = GrayImage::new(100, 100);
        assert_eq!(extractor.crops(&img).count(), 0);
    }

    #[test]
    fn test_no_detection_is_empty_not_error() {
        let extractor = FaceExtractor::new(Box::new(FixedBoxes(Vec::new())));
        let img = GrayImage::new(100, 100);
        assert_eq!(extractor.crops(&img).count(), 0);
    }

    #[test]
    fn test_relative_box_conversion() {
        let b = BoundingBox::from_relative(0.25, 0.5, 0.5, 0.25, 0.8, 200, 100);
        assert_eq!(b.x, 50.0);
        assert_eq!(b.y, 50.0);
        assert_eq!(b.width, 100.0);
        assert_eq!(b.height, 25.0);
    }
}
