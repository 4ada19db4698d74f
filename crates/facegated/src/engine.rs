//! Engine thread: owns the core components and serializes all enrollment,
//! training, and recognition work.
//!
//! One dedicated OS thread processes requests in arrival order, which gives
//! the required mutual exclusion on `train()` and on the evict-then-add step
//! of enrollment without any per-user locking. HTTP handlers talk to it
//! through a clone-safe handle.

use crate::compare::FaceCompareClient;
use crate::config::FallbackConfig;
use facegate_core::{
    CuratedImage, CuratorError, ImageCurator, ModelTrainer, RecognitionOutcome, RecognizeError,
    Recognizer, TrainError, TrainedModel,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Curator(#[from] CuratorError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Recognize(#[from] RecognizeError),
    #[error("engine thread exited")]
    ChannelClosed,
}

enum EngineRequest {
    Enroll {
        user: String,
        image: Vec<u8>,
        reply: oneshot::Sender<Result<CuratedImage, CuratorError>>,
    },
    Train {
        user: String,
        reply: oneshot::Sender<Result<TrainedModel, TrainError>>,
    },
    Recognize {
        user: String,
        image: Vec<u8>,
        reply: oneshot::Sender<Result<RecognitionOutcome, RecognizeError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub async fn enroll(&self, user: String, image: Vec<u8>) -> Result<CuratedImage, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Enroll {
                user,
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx
            .await
            .map_err(|_| EngineError::ChannelClosed)?
            .map_err(Into::into)
    }

    pub async fn train(&self, user: String) -> Result<TrainedModel, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Train {
                user,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx
            .await
            .map_err(|_| EngineError::ChannelClosed)?
            .map_err(Into::into)
    }

    pub async fn recognize(
        &self,
        user: String,
        image: Vec<u8>,
    ) -> Result<RecognitionOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Recognize {
                user,
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx
            .await
            .map_err(|_| EngineError::ChannelClosed)?
            .map_err(Into::into)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The fallback comparison client is built on the engine thread (its
/// blocking HTTP client must not live on the async runtime). A fallback
/// that fails to build is logged and skipped — the daemon still serves
/// local-model recognition.
pub fn spawn_engine(
    curator: ImageCurator,
    trainer: ModelTrainer,
    recognizer: Recognizer,
    fallback: Option<FallbackConfig>,
) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            let recognizer = match fallback {
                Some(cfg) => match FaceCompareClient::new(cfg) {
                    Ok(client) => {
                        tracing::info!("fallback comparison service configured");
                        recognizer.with_fallback(Box::new(client))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "fallback client unavailable; continuing without it");
                        recognizer
                    }
                },
                None => recognizer,
            };

            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Enroll { user, image, reply } => {
                        let _ = reply.send(curator.add_image(&user, &image));
                    }
                    EngineRequest::Train { user, reply } => {
                        let _ = reply.send(trainer.train(&user));
                    }
                    EngineRequest::Recognize { user, image, reply } => {
                        let _ = reply.send(recognizer.recognize(&user, &image));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::{FaceExtractor, FullFrameDetector, RecognizerConfig, SAMPLE_SIZE};
    use facegate_store::{FsConnector, MirrorClient};
    use image::GrayImage;
    use std::io::Cursor;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn texture(phase: u32) -> Vec<u8> {
        let img = GrayImage::from_fn(SAMPLE_SIZE, SAMPLE_SIZE, |x, y| {
            let on = (((x + phase) / 4) + (y / 4)) % 2 == 0;
            image::Luma([if on { 220 } else { 30 }])
        });
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    fn spawn_test_engine(remote: &TempDir, local: &TempDir) -> EngineHandle {
        let client = MirrorClient::new(Arc::new(FsConnector::new(remote.path()).unwrap()));
        let curator = ImageCurator::new(client.clone(), local.path());
        let trainer = ModelTrainer::new(
            client.clone(),
            FaceExtractor::new(Box::new(FullFrameDetector)),
            local.path(),
        );
        let recognizer = Recognizer::new(
            client,
            FaceExtractor::new(Box::new(FullFrameDetector)),
            RecognizerConfig::default(),
        );
        spawn_engine(curator, trainer, recognizer, None)
    }

    #[tokio::test]
    async fn test_enroll_train_recognize_through_engine() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let engine = spawn_test_engine(&remote, &local);

        for phase in 0..3 {
            let curated = engine
                .enroll("Alice".to_string(), texture(phase))
                .await
                .unwrap();
            assert_eq!(curated.count, phase as usize + 1);
        }

        let trained = engine.train("alice".to_string()).await.unwrap();
        assert_eq!(trained.remote_path, "model/alice/lbph_model_alice.json");

        let outcome = engine
            .recognize("ALICE".to_string(), texture(3))
            .await
            .unwrap();
        assert!(matches!(outcome, RecognitionOutcome::Recognized { .. }));
    }

    #[tokio::test]
    async fn test_engine_surfaces_core_errors() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let engine = spawn_test_engine(&remote, &local);

        assert!(matches!(
            engine.train("ghost".to_string()).await,
            Err(EngineError::Train(TrainError::NoDataset))
        ));
        assert!(matches!(
            engine.enroll(String::new(), texture(0)).await,
            Err(EngineError::Curator(CuratorError::MissingInput))
        ));
    }
}
