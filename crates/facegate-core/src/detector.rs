//! Face detector seam.

use crate::types::BoundingBox;
use image::GrayImage;

/// Locates faces in a grayscale frame. Detection itself lives outside the
/// core; implementations adapt whatever detector the deployment ships
/// (a cascade, a DNN service) to this seam. An empty result means "no face",
/// never an error.
pub trait FaceDetector: Send {
    fn detect(&self, image: &GrayImage) -> Vec<BoundingBox>;
}

/// Degraded default: reports the whole frame as a single face.
///
/// Suitable when images arrive pre-cropped by the capture client (the
/// enrollment path) or when no detector service is wired up. Empty frames
/// produce no detections.
pub struct FullFrameDetector;

impl FaceDetector for FullFrameDetector {
    fn detect(&self, image: &GrayImage) -> Vec<BoundingBox> {
        if image.width() == 0 || image.height() == 0 {
            return Vec::new();
        }
        vec![BoundingBox {
            x: 0.0,
            y: 0.0,
            width: image.width() as f32,
            height: image.height() as f32,
            confidence: 1.0,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame_covers_image() {
        let img = GrayImage::new(64, 48);
        let boxes = FullFrameDetector.detect(&img);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].width, 64.0);
        assert_eq!(boxes[0].height, 48.0);
    }

    #[test]
    fn test_empty_frame_no_detection() {
        let img = GrayImage::new(0, 0);
        assert!(FullFrameDetector.detect(&img).is_empty());
    }
}
