//! facegate-core — Per-user face enrollment, training, and recognition.
//!
//! Curates a bounded enrollment image set, trains an LBPH appearance model
//! from it, mirrors both to a remote store, and answers "does this probe
//! photo match the enrolled person". Detection and the fallback comparison
//! service are injected seams; the core never owns a camera or a network.

pub mod curator;
pub mod detector;
pub mod extract;
pub mod lbph;
pub mod recognizer;
pub mod trainer;
pub mod types;
pub mod user;

#[cfg(test)]
pub(crate) mod testimg;

pub use curator::{CuratedImage, CuratorError, ImageCurator};
pub use detector::{FaceDetector, FullFrameDetector};
pub use extract::FaceExtractor;
pub use lbph::LbphModel;
pub use recognizer::{CompareError, CompareService, RecognizeError, Recognizer, RecognizerConfig};
pub use trainer::{ModelTrainer, TrainError, TrainedModel};
pub use types::{BoundingBox, MatcherKind, RecognitionOutcome, SAMPLE_SIZE};
