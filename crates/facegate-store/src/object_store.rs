//! Object store seam: one session, path-addressed get/put/list operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt artifact at {path}: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("store connect failed: {0}")]
    Connect(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// One open store session. Paths are relative, `/`-separated.
///
/// Sessions are values: dropping one releases the underlying connection,
/// on every exit path. A session is never shared across unrelated requests.
pub trait ObjectStore {
    fn get(&mut self, path: &str) -> Result<Vec<u8>, StoreError>;
    fn put(&mut self, path: &str, bytes: &[u8]) -> Result<(), StoreError>;
    /// File names (not full paths) directly under `dir`, unordered.
    fn list(&mut self, dir: &str) -> Result<Vec<String>, StoreError>;
    fn exists(&mut self, path: &str) -> Result<bool, StoreError>;
    /// Size in bytes; `NotFound` when the path is absent.
    fn size(&mut self, path: &str) -> Result<u64, StoreError>;
    fn mkdir_all(&mut self, dir: &str) -> Result<(), StoreError>;
    fn rename(&mut self, from: &str, to: &str) -> Result<(), StoreError>;
    fn remove(&mut self, path: &str) -> Result<(), StoreError>;
}

/// Opens one [`ObjectStore`] session per logical operation.
pub trait StoreConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn ObjectStore>, StoreError>;
}
