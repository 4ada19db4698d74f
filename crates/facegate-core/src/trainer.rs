//! Per-user model training: fetch the image set fresh from the remote
//! mirror, extract faces, train the LBPH model, publish it back.

use crate::extract::FaceExtractor;
use crate::lbph::{LbphModel, ModelCodecError};
use crate::user;
use facegate_store::{MirrorClient, StoreError};
use image::imageops;
use image::GrayImage;
use std::path::PathBuf;
use thiserror::Error;

/// Fixed augmentation rotation, degrees. Each accepted crop contributes the
/// original, a horizontal flip, and a ±rotation pair to the training set.
const AUGMENT_ROTATION_DEG: f32 = 5.0;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("missing or invalid username")]
    MissingInput,
    #[error("no enrollment images for user")]
    NoDataset,
    #[error("no usable faces in the enrollment images")]
    NoFaces,
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("model encoding failed: {0}")]
    Codec(#[from] ModelCodecError),
}

#[derive(Debug, Clone)]
pub struct TrainedModel {
    /// Remote-relative path of the published model artifact.
    pub remote_path: String,
    /// Training samples after extraction and augmentation.
    pub samples: usize,
}

pub struct ModelTrainer {
    client: MirrorClient,
    extractor: FaceExtractor,
    data_dir: PathBuf,
    augment: bool,
}

impl ModelTrainer {
    pub fn new(client: MirrorClient, extractor: FaceExtractor, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            extractor,
            data_dir: data_dir.into(),
            augment: true,
        }
    }

    pub fn with_augmentation(mut self, augment: bool) -> Self {
        self.augment = augment;
        self
    }

    /// Train the user's model and publish it to the remote mirror.
    ///
    /// Destructive on success: the prior model is replaced wholesale, never
    /// merged. On failure nothing is uploaded, so the prior model (if any)
    /// stays untouched at its remote path.
    pub fn train(&self, raw_name: &str) -> Result<TrainedModel, TrainError> {
        let name = user::normalize(raw_name).ok_or(TrainError::MissingInput)?;

        // Remote is the source of truth for training; overwrite any stale
        // local copy before extracting.
        let images = self.client.fetch_images(&name)?;
        if images.is_empty() {
            return Err(TrainError::NoDataset);
        }
        tracing::info!(user = %name, images = images.len(), "training started");

        let mut samples: Vec<GrayImage> = Vec::new();
        for (index, bytes) in &images {
            self.refresh_local(&name, *index, bytes);
            let gray = match self.extractor.decode(bytes) {
                Ok(gray) => gray,
                Err(e) => {
                    tracing::warn!(user = %name, index, error = %e, "skipping undecodable enrollment image");
                    continue;
                }
            };
            for crop in self.extractor.crops(&gray) {
                if self.augment {
                    samples.push(imageops::flip_horizontal(&crop));
                    samples.push(rotate(&crop, AUGMENT_ROTATION_DEG));
                    samples.push(rotate(&crop, -AUGMENT_ROTATION_DEG));
                }
                samples.push(crop);
            }
        }
        if samples.is_empty() {
            return Err(TrainError::NoFaces);
        }

        let model = LbphModel::train(&name, &samples);
        let bytes = model.to_bytes()?;

        self.save_local_model(&name, &bytes);
        let remote_path = self.client.put_model(&name, &bytes)?;
        tracing::info!(user = %name, samples = samples.len(), path = %remote_path, "model published");

        Ok(TrainedModel {
            remote_path,
            samples: samples.len(),
        })
    }

    fn refresh_local(&self, name: &str, index: u32, bytes: &[u8]) {
        let path = self
            .data_dir
            .join(facegate_store::client::image_path(name, index));
        if let Err(e) = write_with_parents(&path, bytes) {
            tracing::warn!(user = %name, index, error = %e, "local dataset refresh failed");
        }
    }

    /// Local model copy is a cache, not the publication step; failures here
    /// only warn.
    fn save_local_model(&self, name: &str, bytes: &[u8]) {
        let path = self
            .data_dir
            .join(facegate_store::client::model_path(name));
        if let Err(e) = write_with_parents(&path, bytes) {
            tracing::warn!(user = %name, error = %e, "local model save failed");
        }
    }
}

fn write_with_parents(path: &std::path::Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}

/// Rotate about the image center by `degrees`, inverse-mapping each output
/// pixel and bilinear-sampling with clamped coordinates.
fn rotate(img: &GrayImage, degrees: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let (cx, cy) = ((w as f32 - 1.0) / 2.0, (h as f32 - 1.0) / 2.0);
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();

    GrayImage::from_fn(w, h, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        // inverse rotation
        let sx = cos * dx + sin * dy + cx;
        let sy = -sin * dx + cos * dy + cy;
        image::Luma([sample_bilinear(img, sx, sy)])
    })
}

fn sample_bilinear(img: &GrayImage, sx: f32, sy: f32) -> u8 {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let x0 = (sx.floor() as i32).clamp(0, w - 1);
    let y0 = (sy.floor() as i32).clamp(0, h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = (sx - sx.floor()).clamp(0.0, 1.0);
    let fy = (sy - sy.floor()).clamp(0.0, 1.0);

    let at = |x: i32, y: i32| img.get_pixel(x as u32, y as u32)[0] as f32;
    let val = at(x0, y0) * (1.0 - fx) * (1.0 - fy)
        + at(x1, y0) * fx * (1.0 - fy)
        + at(x0, y1) * (1.0 - fx) * fy
        + at(x1, y1) * fx * fy;
    val.round().clamp(0.0, 255.0) as u8
}
