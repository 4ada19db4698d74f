use serde::{Deserialize, Serialize};

/// Side length of a normalized face crop (grayscale, square).
pub const SAMPLE_SIZE: u32 = 100;

/// Bounding box for a detected face, in pixel coordinates of the probed image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Convert a box reported in relative coordinates (0.0–1.0, as some
    /// detectors emit) into pixel coordinates for a frame of the given size.
    pub fn from_relative(
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        confidence: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            x: x * frame_width as f32,
            y: y * frame_height as f32,
            width: width * frame_width as f32,
            height: height * frame_height as f32,
            confidence,
        }
    }
}

/// Which matcher produced a positive recognition. The two confidence scales
/// are calibrated independently and are not comparable: `Model` reports
/// `100 − distance`, `Fallback` reports the service's raw 0–100 similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    Model,
    Fallback,
}

/// Outcome of one recognition request. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Recognized {
        name: String,
        confidence: f32,
        matcher: MatcherKind,
    },
    /// The probe contained no detectable face. Distinct from `NotRecognized`.
    NoFaceDetected,
    /// Faces were found but none matched, by either matcher. A normal
    /// outcome, not an error.
    NotRecognized,
    /// No trained model exists for the user. The fallback is never consulted
    /// here: it substitutes the matcher, not the enrollment.
    ModelMissing,
}
