//! Enrollment image curation: a bounded, insertion-ordered set per user,
//! cached locally and mirrored to the remote store.

use crate::user;
use facegate_store::client::image_path;
use facegate_store::{MirrorClient, StoreError};
use std::path::PathBuf;
use thiserror::Error;

/// Maximum enrollment images per user. Adding beyond this evicts the oldest.
pub const CAPACITY: usize = 10;

#[derive(Error, Debug)]
pub enum CuratorError {
    #[error("missing or invalid username or image data")]
    MissingInput,
    #[error("image data did not decode: {0}")]
    InvalidImage(#[from] image::ImageError),
    #[error("neither local save nor remote mirror succeeded: {0}")]
    Storage(#[from] StoreError),
}

/// Result of accepting one enrollment image.
#[derive(Debug, Clone)]
pub struct CuratedImage {
    /// Remote-relative path of the stored image.
    pub remote_path: String,
    /// Image set size after the add, ≤ [`CAPACITY`].
    pub count: usize,
    /// False when the local save succeeded but the remote mirror did not.
    /// Non-fatal: training still proceeds against local data.
    pub mirrored: bool,
}

pub struct ImageCurator {
    client: MirrorClient,
    data_dir: PathBuf,
}

impl ImageCurator {
    pub fn new(client: MirrorClient, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            data_dir: data_dir.into(),
        }
    }

    /// Accept one enrollment image for a user.
    ///
    /// Indices are ever-increasing (max + 1); eviction leaves gaps and never
    /// renumbers, so a filename is never silently reused. FIFO order is the
    /// numeric index order.
    pub fn add_image(&self, raw_name: &str, bytes: &[u8]) -> Result<CuratedImage, CuratorError> {
        let name = user::normalize(raw_name).ok_or(CuratorError::MissingInput)?;
        if bytes.is_empty() {
            return Err(CuratorError::MissingInput);
        }
        // Reject undecodable bytes up front rather than poisoning the set.
        image::load_from_memory(bytes)?;

        let mut indices = match self.client.list_images(&name) {
            Ok(indices) => indices,
            Err(e) => {
                tracing::warn!(user = %name, error = %e, "remote listing failed, curating from local cache");
                self.local_indices(&name)
            }
        };

        while indices.len() >= CAPACITY {
            let oldest = indices.remove(0);
            if let Err(e) = self.client.delete_image(&name, oldest) {
                tracing::warn!(user = %name, index = oldest, error = %e, "remote evict failed");
            }
            let local = self.local_path(&name, oldest);
            if let Err(e) = std::fs::remove_file(&local) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(user = %name, path = %local.display(), error = %e, "local evict failed");
                }
            }
            tracing::info!(user = %name, index = oldest, "evicted oldest enrollment image");
        }

        let index = indices.last().map_or(0, |last| last + 1);

        let local_ok = match self.save_local(&name, index, bytes) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user = %name, index, error = %e, "local save failed");
                false
            }
        };
        let mirrored = match self.client.put_image(&name, index, bytes) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(user = %name, index, error = %e, "remote mirror failed");
                if !local_ok {
                    return Err(CuratorError::Storage(e));
                }
                false
            }
        };

        Ok(CuratedImage {
            remote_path: image_path(&name, index),
            count: indices.len() + 1,
            mirrored,
        })
    }

    fn local_path(&self, name: &str, index: u32) -> PathBuf {
        self.data_dir.join(image_path(name, index))
    }

    fn save_local(&self, name: &str, index: u32, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.local_path(name, index);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)
    }

    fn local_indices(&self, name: &str) -> Vec<u32> {
        let dir = self.data_dir.join(facegate_store::client::dataset_dir(name));
        let mut indices: Vec<u32> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| {
                        e.file_name()
                            .to_string_lossy()
                            .strip_suffix(".jpg")?
                            .parse()
                            .ok()
                    })
                    .collect()
            })
            .unwrap_or_default();
        indices.sort_unstable();
        indices
    }
}
