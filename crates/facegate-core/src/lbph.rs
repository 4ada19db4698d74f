//! Local Binary Pattern Histogram appearance model.
//!
//! Single-class: the model holds one texture descriptor per training sample
//! for one user, and prediction is the minimum chi-square distance from the
//! probe's descriptor to any sample. Lower distance = closer to this user's
//! trained distribution. There is no multi-user label space.

use crate::types::SAMPLE_SIZE;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// Cells per axis; each face crop is partitioned into an 8×8 grid.
const GRID_X: u32 = 8;
const GRID_Y: u32 = 8;
/// Rotation-invariant uniform (riu2) mapping for 8 neighbors: codes 0–8 for
/// uniform patterns (by set-bit count), 9 for everything else.
const LBP_BINS: usize = 10;
const NON_UNIFORM_BIN: u8 = 9;

const MODEL_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ModelCodecError {
    #[error("model artifact is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported model version {0}")]
    Version(u32),
}

/// Trained per-user LBPH model. Opaque to callers: built by training,
/// serialized to the remote mirror, read back for prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LbphModel {
    version: u32,
    user: String,
    grid_x: u32,
    grid_y: u32,
    /// One concatenated per-cell histogram vector per training sample.
    histograms: Vec<Vec<f32>>,
}

impl LbphModel {
    /// Train from normalized face crops, all carrying the single class label
    /// for `user`. Callers guarantee `samples` is non-empty.
    pub fn train(user: &str, samples: &[GrayImage]) -> Self {
        let histograms = samples.iter().map(descriptor).collect();
        Self {
            version: MODEL_VERSION,
            user: user.to_string(),
            grid_x: GRID_X,
            grid_y: GRID_Y,
            histograms,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn sample_count(&self) -> usize {
        self.histograms.len()
    }

    /// Distance from the probe to the nearest training sample, on a 0–200
    /// band (100 × per-cell-averaged chi-square). Identical texture ≈ 0.
    pub fn predict(&self, probe: &GrayImage) -> f32 {
        let probe_hist = descriptor(probe);
        self.histograms
            .iter()
            .map(|h| chi_square(&probe_hist, h))
            .fold(f32::INFINITY, f32::min)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelCodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelCodecError> {
        let model: Self = serde_json::from_slice(bytes)?;
        if model.version != MODEL_VERSION {
            return Err(ModelCodecError::Version(model.version));
        }
        Ok(model)
    }
}

/// riu2 code table for all 256 radius-1 neighborhoods, built once.
fn riu2_table() -> &'static [u8; 256] {
    static TABLE: OnceLock<[u8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u8; 256];
        for (pattern, code) in table.iter_mut().enumerate() {
            let p = pattern as u8;
            let transitions = (p ^ p.rotate_left(1)).count_ones();
            *code = if transitions <= 2 {
                p.count_ones() as u8
            } else {
                NON_UNIFORM_BIN
            };
        }
        table
    })
}

/// Clockwise neighbor offsets starting at the top-left, radius 1.
const NEIGHBORS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// Concatenated per-cell riu2 histograms for one crop. Each cell histogram
/// is normalized to sum 1 so cell sizes that don't divide evenly carry the
/// same weight. Border pixels are skipped (no full neighborhood).
fn descriptor(img: &GrayImage) -> Vec<f32> {
    debug_assert_eq!(img.dimensions(), (SAMPLE_SIZE, SAMPLE_SIZE));
    let table = riu2_table();
    let (w, h) = img.dimensions();
    let cells = (GRID_X * GRID_Y) as usize;
    let mut hist = vec![0.0f32; cells * LBP_BINS];
    let mut counts = vec![0.0f32; cells];

    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let center = img.get_pixel(x, y)[0];
            let mut pattern = 0u8;
            for (bit, (dx, dy)) in NEIGHBORS.iter().enumerate() {
                let nx = (x as i32 + dx) as u32;
                let ny = (y as i32 + dy) as u32;
                if img.get_pixel(nx, ny)[0] >= center {
                    pattern |= 1 << bit;
                }
            }
            let code = table[pattern as usize] as usize;

            let cx = x * GRID_X / w;
            let cy = y * GRID_Y / h;
            let cell = (cy * GRID_X + cx) as usize;
            hist[cell * LBP_BINS + code] += 1.0;
            counts[cell] += 1.0;
        }
    }

    for cell in 0..cells {
        if counts[cell] > 0.0 {
            for bin in 0..LBP_BINS {
                hist[cell * LBP_BINS + bin] /= counts[cell];
            }
        }
    }
    hist
}

/// Chi-square over concatenated histograms, averaged per cell and scaled by
/// 100. Per-cell chi-square lies in [0, 2], so the result lies in [0, 200].
fn chi_square(a: &[f32], b: &[f32]) -> f32 {
    const EPS: f32 = 1e-10;
    let total: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d / (x + y + EPS)
        })
        .sum();
    100.0 * total / (GRID_X * GRID_Y) as f32
}
