//! Per-user remote mirror layout and the client that reads/writes it.
//!
//! Layout, keyed by a case-normalized username:
//!   `dataset/<user>/<index>.jpg`            — enrollment images
//!   `model/<user>/lbph_model_<user>.json`   — trained model artifact

use crate::object_store::{StoreConnector, StoreError};
use std::sync::Arc;

pub fn dataset_dir(user: &str) -> String {
    format!("dataset/{user}")
}

pub fn image_path(user: &str, index: u32) -> String {
    format!("dataset/{user}/{index}.jpg")
}

pub fn model_dir(user: &str) -> String {
    format!("model/{user}")
}

pub fn model_path(user: &str) -> String {
    format!("model/{user}/lbph_model_{user}.json")
}

/// Remote mirror client. Every public operation opens its own store session
/// and releases it before returning, on error paths included — a failed call
/// can never poison a handle shared with the next one.
#[derive(Clone)]
pub struct MirrorClient {
    connector: Arc<dyn StoreConnector>,
}

impl MirrorClient {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self { connector }
    }

    /// Fetch the user's trained model. A zero-byte artifact is treated the
    /// same as an absent one: `NotFound`, never an empty model.
    pub fn fetch_model(&self, user: &str) -> Result<Vec<u8>, StoreError> {
        let path = model_path(user);
        let mut store = self.connector.connect()?;
        if store.size(&path)? == 0 {
            tracing::warn!(user, path = %path, "remote model is zero bytes, treating as absent");
            return Err(StoreError::NotFound(path));
        }
        store.get(&path)
    }

    /// Upload a trained model, write-then-publish: the artifact lands at a
    /// `.part` path and is renamed into place only once fully written, so a
    /// half-written model is never visible at its final path.
    pub fn put_model(&self, user: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let path = model_path(user);
        let part = format!("{path}.part");
        let mut store = self.connector.connect()?;
        store.mkdir_all(&model_dir(user))?;
        store.put(&part, bytes)?;
        store.rename(&part, &path)?;
        Ok(path)
    }

    /// Enrollment image indices for the user, ascending. A missing user
    /// directory is an empty set, not an error.
    pub fn list_images(&self, user: &str) -> Result<Vec<u32>, StoreError> {
        let mut store = self.connector.connect()?;
        let names = match store.list(&dataset_dir(user)) {
            Ok(names) => names,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut indices: Vec<u32> = names
            .iter()
            .filter_map(|n| n.strip_suffix(".jpg")?.parse().ok())
            .collect();
        indices.sort_unstable();
        Ok(indices)
    }

    /// Fetch the user's full image set, ascending by index, in one session.
    pub fn fetch_images(&self, user: &str) -> Result<Vec<(u32, Vec<u8>)>, StoreError> {
        let mut store = self.connector.connect()?;
        let names = match store.list(&dataset_dir(user)) {
            Ok(names) => names,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut indices: Vec<u32> = names
            .iter()
            .filter_map(|n| n.strip_suffix(".jpg")?.parse().ok())
            .collect();
        indices.sort_unstable();

        let mut images = Vec::with_capacity(indices.len());
        for index in indices {
            let bytes = store.get(&image_path(user, index))?;
            images.push((index, bytes));
        }
        Ok(images)
    }

    pub fn put_image(&self, user: &str, index: u32, bytes: &[u8]) -> Result<String, StoreError> {
        let path = image_path(user, index);
        let mut store = self.connector.connect()?;
        store.mkdir_all(&dataset_dir(user))?;
        store.put(&path, bytes)?;
        Ok(path)
    }

    pub fn delete_image(&self, user: &str, index: u32) -> Result<(), StoreError> {
        let mut store = self.connector.connect()?;
        store.remove(&image_path(user, index))
    }
}
