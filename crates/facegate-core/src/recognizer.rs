//! Recognition decision: model fetch, probe scoring, confidence policy,
//! and the fallback comparison service.

use crate::extract::FaceExtractor;
use crate::lbph::{LbphModel, ModelCodecError};
use crate::types::{MatcherKind, RecognitionOutcome};
use crate::user;
use facegate_store::{MirrorClient, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("comparison service unavailable: {0}")]
    Unavailable(String),
    #[error("comparison service protocol error: {0}")]
    Protocol(String),
}

/// Secondary face-similarity signal from an external service: two images in,
/// a 0–100 similarity out. Calibrated independently of the LBPH distance
/// scale; the two are never blended.
pub trait CompareService: Send {
    fn compare(&self, probe: &[u8], reference: &[u8]) -> Result<f32, CompareError>;
}

#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// LBPH acceptance bound: a face is recognized when its distance falls
    /// below this. Lower distance = better match.
    pub distance_threshold: f32,
    /// Fallback acceptance bound on the service's 0–100 similarity scale.
    pub fallback_threshold: f32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 50.0,
            fallback_threshold: 80.0,
        }
    }
}

#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("missing or invalid username or image data")]
    MissingInput,
    #[error("probe image did not decode: {0}")]
    InvalidImage(#[from] image::ImageError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("stored model is unreadable: {0}")]
    Model(#[from] ModelCodecError),
}

pub struct Recognizer {
    client: MirrorClient,
    extractor: FaceExtractor,
    fallback: Option<Box<dyn CompareService>>,
    config: RecognizerConfig,
}

impl Recognizer {
    pub fn new(client: MirrorClient, extractor: FaceExtractor, config: RecognizerConfig) -> Self {
        Self {
            client,
            extractor,
            fallback: None,
            config,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn CompareService>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Decide whether the probe photo matches the enrolled user.
    ///
    /// Policy, applied uniformly: the first detected face whose distance
    /// clears the threshold short-circuits the scan — remaining detections
    /// are not scored. Only when no face clears it is the fallback service
    /// consulted, against each enrolled reference image, best similarity
    /// wins.
    pub fn recognize(
        &self,
        raw_name: &str,
        probe: &[u8],
    ) -> Result<RecognitionOutcome, RecognizeError> {
        let name = user::normalize(raw_name).ok_or(RecognizeError::MissingInput)?;
        if probe.is_empty() {
            return Err(RecognizeError::MissingInput);
        }

        // Without a trained model there is nothing to compare against for
        // this user; the fallback substitutes the matcher, not the
        // enrollment, so it is not consulted here.
        let model_bytes = match self.client.fetch_model(&name) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                tracing::info!(user = %name, "no trained model");
                return Ok(RecognitionOutcome::ModelMissing);
            }
            Err(e) => return Err(e.into()),
        };
        let model = LbphModel::from_bytes(&model_bytes)?;

        let gray = self.extractor.decode(probe)?;
        let mut any_face = false;
        for crop in self.extractor.crops(&gray) {
            any_face = true;
            let distance = model.predict(&crop);
            tracing::debug!(user = %name, distance, "scored probe face");
            if distance < self.config.distance_threshold {
                return Ok(RecognitionOutcome::Recognized {
                    name,
                    confidence: 100.0 - distance,
                    matcher: MatcherKind::Model,
                });
            }
        }
        if !any_face {
            tracing::info!(user = %name, "no face detected in probe");
            return Ok(RecognitionOutcome::NoFaceDetected);
        }

        if let Some(fallback) = &self.fallback {
            if let Some(similarity) = self.best_fallback_similarity(&name, probe, fallback.as_ref())
            {
                tracing::info!(user = %name, similarity, "fallback comparison best score");
                if similarity > self.config.fallback_threshold {
                    return Ok(RecognitionOutcome::Recognized {
                        name,
                        confidence: similarity,
                        matcher: MatcherKind::Fallback,
                    });
                }
            }
        }

        Ok(RecognitionOutcome::NotRecognized)
    }

    /// Best fallback similarity of the probe against the enrolled reference
    /// images. The fallback is a secondary signal: transport and protocol
    /// failures downgrade to "no signal" with a warning, never to a request
    /// failure.
    fn best_fallback_similarity(
        &self,
        name: &str,
        probe: &[u8],
        fallback: &dyn CompareService,
    ) -> Option<f32> {
        let references = match self.client.fetch_images(name) {
            Ok(images) => images,
            Err(e) => {
                tracing::warn!(user = %name, error = %e, "fallback skipped, reference fetch failed");
                return None;
            }
        };
        let mut best: Option<f32> = None;
        for (index, reference) in &references {
            match fallback.compare(probe, reference) {
                Ok(similarity) => {
                    if best.map_or(true, |b| similarity > b) {
                        best = Some(similarity);
                    }
                }
                Err(e) => {
                    tracing::warn!(user = %name, index, error = %e, "fallback comparison failed");
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{FaceDetector, FullFrameDetector};
    use crate::extract::FaceExtractor;
    use crate::testimg::{checkerboard, gradient, png_bytes};
    use crate::trainer::ModelTrainer;
    use crate::types::BoundingBox;
    use facegate_store::FsConnector;
    use image::GrayImage;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct BlindDetector;

    impl FaceDetector for BlindDetector {
        fn detect(&self, _image: &GrayImage) -> Vec<BoundingBox> {
            Vec::new()
        }
    }

    /// Fallback that must never run.
    struct PanickingFallback;

    impl CompareService for PanickingFallback {
        fn compare(&self, _probe: &[u8], _reference: &[u8]) -> Result<f32, CompareError> {
            panic!("fallback must not be consulted");
        }
    }

    struct FixedFallback(f32);

    impl CompareService for FixedFallback {
        fn compare(&self, _probe: &[u8], _reference: &[u8]) -> Result<f32, CompareError> {
            Ok(self.0)
        }
    }

    struct DownFallback;

    impl CompareService for DownFallback {
        fn compare(&self, _probe: &[u8], _reference: &[u8]) -> Result<f32, CompareError> {
            Err(CompareError::Unavailable("connection refused".into()))
        }
    }

    struct Fixture {
        _remote: TempDir,
        local: TempDir,
        client: MirrorClient,
    }

    fn fixture() -> Fixture {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let client = MirrorClient::new(Arc::new(FsConnector::new(remote.path()).unwrap()));
        Fixture {
            _remote: remote,
            local,
            client,
        }
    }

    fn enroll_and_train(f: &Fixture, user: &str, images: &[GrayImage]) {
        for (i, img) in images.iter().enumerate() {
            f.client.put_image(user, i as u32, &png_bytes(img)).unwrap();
        }
        ModelTrainer::new(
            f.client.clone(),
            FaceExtractor::new(Box::new(FullFrameDetector)),
            f.local.path(),
        )
        .train(user)
        .unwrap();
    }

    fn recognizer(f: &Fixture, detector: Box<dyn FaceDetector>) -> Recognizer {
        Recognizer::new(
            f.client.clone(),
            FaceExtractor::new(detector),
            RecognizerConfig::default(),
        )
    }

    #[test]
    fn test_model_missing_never_consults_fallback() {
        let f = fixture();
        let r = recognizer(&f, Box::new(FullFrameDetector))
            .with_fallback(Box::new(PanickingFallback));
        let outcome = r
            .recognize("nobody", &png_bytes(&checkerboard(4, 0)))
            .unwrap();
        assert_eq!(outcome, RecognitionOutcome::ModelMissing);
    }

    #[test]
    fn test_no_face_detected_distinct_from_not_recognized() {
        let f = fixture();
        enroll_and_train(&f, "alice", &[checkerboard(4, 0)]);
        let r = recognizer(&f, Box::new(BlindDetector));
        let outcome = r.recognize("alice", &png_bytes(&gradient())).unwrap();
        assert_eq!(outcome, RecognitionOutcome::NoFaceDetected);
    }

    #[test]
    fn test_end_to_end_match_and_reject() {
        let f = fixture();
        enroll_and_train(
            &f,
            "alice",
            &[checkerboard(4, 0), checkerboard(4, 1), checkerboard(4, 2)],
        );
        let r = recognizer(&f, Box::new(FullFrameDetector));

        // a fourth photo of the same texture
        match r.recognize("alice", &png_bytes(&checkerboard(4, 3))).unwrap() {
            RecognitionOutcome::Recognized {
                name,
                confidence,
                matcher,
            } => {
                assert_eq!(name, "alice");
                assert_eq!(matcher, MatcherKind::Model);
                assert!(confidence > 50.0, "confidence was {confidence}");
            }
            other => panic!("expected a match, got {other:?}"),
        }

        // an unrelated face
        let outcome = r.recognize("alice", &png_bytes(&gradient())).unwrap();
        assert_eq!(outcome, RecognitionOutcome::NotRecognized);
    }

    #[test]
    fn test_username_casing_resolves_same_model() {
        let f = fixture();
        enroll_and_train(&f, "alice", &[checkerboard(4, 0)]);
        let r = recognizer(&f, Box::new(FullFrameDetector));
        let outcome = r
            .recognize(" Alice ", &png_bytes(&checkerboard(4, 0)))
            .unwrap();
        assert!(matches!(outcome, RecognitionOutcome::Recognized { .. }));
    }

    /// Detector reporting two fixed half-frame regions, in a fixed order.
    struct TwoRegionDetector {
        reversed: bool,
    }

    impl FaceDetector for TwoRegionDetector {
        fn detect(&self, image: &GrayImage) -> Vec<BoundingBox> {
            let half = image.width() as f32 / 2.0;
            let left = BoundingBox {
                x: 0.0,
                y: 0.0,
                width: half,
                height: image.height() as f32,
                confidence: 1.0,
            };
            let right = BoundingBox {
                x: half,
                ..left.clone()
            };
            if self.reversed {
                vec![right, left]
            } else {
                vec![left, right]
            }
        }
    }

    /// Probe whose left half carries the enrolled texture and whose right
    /// half is unrelated.
    fn split_probe() -> GrayImage {
        let enrolled = checkerboard(4, 0);
        let other = gradient();
        GrayImage::from_fn(2 * crate::SAMPLE_SIZE, crate::SAMPLE_SIZE, |x, y| {
            if x < crate::SAMPLE_SIZE {
                *enrolled.get_pixel(x, y)
            } else {
                *other.get_pixel(x - crate::SAMPLE_SIZE, y)
            }
        })
    }

    #[test]
    fn test_first_matching_region_accepted() {
        let f = fixture();
        enroll_and_train(&f, "alice", &[checkerboard(4, 0)]);
        let r = recognizer(&f, Box::new(TwoRegionDetector { reversed: false }));
        let outcome = r.recognize("alice", &png_bytes(&split_probe())).unwrap();
        assert!(
            matches!(
                outcome,
                RecognitionOutcome::Recognized {
                    matcher: MatcherKind::Model,
                    ..
                }
            ),
            "got {outcome:?}"
        );
    }

    #[test]
    fn test_scan_continues_past_non_matching_region() {
        let f = fixture();
        enroll_and_train(&f, "alice", &[checkerboard(4, 0)]);
        // unrelated region first: a match later in detector order must
        // still be found
        let r = recognizer(&f, Box::new(TwoRegionDetector { reversed: true }));
        let outcome = r.recognize("alice", &png_bytes(&split_probe())).unwrap();
        assert!(matches!(outcome, RecognitionOutcome::Recognized { .. }));
    }

    #[test]
    fn test_fallback_accepts_when_model_inconclusive() {
        let f = fixture();
        enroll_and_train(&f, "alice", &[checkerboard(4, 0)]);
        let r = recognizer(&f, Box::new(FullFrameDetector))
            .with_fallback(Box::new(FixedFallback(92.5)));
        match r.recognize("alice", &png_bytes(&gradient())).unwrap() {
            RecognitionOutcome::Recognized {
                confidence,
                matcher,
                ..
            } => {
                assert_eq!(matcher, MatcherKind::Fallback);
                assert!((confidence - 92.5).abs() < 1e-6);
            }
            other => panic!("expected fallback match, got {other:?}"),
        }
    }

    #[test]
    fn test_fallback_below_threshold_not_recognized() {
        let f = fixture();
        enroll_and_train(&f, "alice", &[checkerboard(4, 0)]);
        let r = recognizer(&f, Box::new(FullFrameDetector))
            .with_fallback(Box::new(FixedFallback(40.0)));
        let outcome = r.recognize("alice", &png_bytes(&gradient())).unwrap();
        assert_eq!(outcome, RecognitionOutcome::NotRecognized);
    }

    #[test]
    fn test_fallback_outage_downgrades_to_not_recognized() {
        let f = fixture();
        enroll_and_train(&f, "alice", &[checkerboard(4, 0)]);
        let r = recognizer(&f, Box::new(FullFrameDetector)).with_fallback(Box::new(DownFallback));
        let outcome = r.recognize("alice", &png_bytes(&gradient())).unwrap();
        assert_eq!(outcome, RecognitionOutcome::NotRecognized);
    }

    #[test]
    fn test_missing_probe_bytes() {
        let f = fixture();
        let r = recognizer(&f, Box::new(FullFrameDetector));
        assert!(matches!(
            r.recognize("alice", &[]),
            Err(RecognizeError::MissingInput)
        ));
    }
}
