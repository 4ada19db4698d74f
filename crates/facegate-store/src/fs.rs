//! Filesystem-backed object store.

use crate::object_store::{ObjectStore, StoreConnector, StoreError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Opens [`FsStore`] sessions rooted at a fixed directory.
pub struct FsConnector {
    root: PathBuf,
}

impl FsConnector {
    /// The root is created if absent, so a fresh deployment starts empty
    /// rather than failing every operation.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl StoreConnector for FsConnector {
    fn connect(&self) -> Result<Box<dyn ObjectStore>, StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::Connect(format!(
                "store root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(Box::new(FsStore {
            root: self.root.clone(),
        }))
    }
}

struct FsStore {
    root: PathBuf,
}

impl FsStore {
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        // Relative, forward-only paths; reject traversal out of the root.
        if Path::new(path)
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            return Err(StoreError::Corrupt {
                path: path.to_string(),
                reason: "path escapes store root".to_string(),
            });
        }
        Ok(self.root.join(path))
    }
}

fn map_io(path: &str, err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(path.to_string())
    } else {
        StoreError::Io(err)
    }
}

impl ObjectStore for FsStore {
    fn get(&mut self, path: &str) -> Result<Vec<u8>, StoreError> {
        let full = self.resolve(path)?;
        std::fs::read(&full).map_err(|e| map_io(path, e))
    }

    fn put(&mut self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        std::fs::write(&full, bytes).map_err(|e| map_io(path, e))
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, StoreError> {
        let full = self.resolve(dir)?;
        let entries = std::fs::read_dir(&full).map_err(|e| map_io(dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::Io)?;
            if entry.file_type().map_err(StoreError::Io)?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn exists(&mut self, path: &str) -> Result<bool, StoreError> {
        Ok(self.resolve(path)?.exists())
    }

    fn size(&mut self, path: &str) -> Result<u64, StoreError> {
        let full = self.resolve(path)?;
        let meta = std::fs::metadata(&full).map_err(|e| map_io(path, e))?;
        Ok(meta.len())
    }

    fn mkdir_all(&mut self, dir: &str) -> Result<(), StoreError> {
        let full = self.resolve(dir)?;
        std::fs::create_dir_all(&full).map_err(StoreError::Io)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        let from_full = self.resolve(from)?;
        let to_full = self.resolve(to)?;
        std::fs::rename(&from_full, &to_full).map_err(|e| map_io(from, e))
    }

    fn remove(&mut self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        std::fs::remove_file(&full).map_err(|e| map_io(path, e))
    }
}
