//! facegate-store — Remote mirror access for enrollment images and models.
//!
//! The remote object store is a seam: [`ObjectStore`] is one open session,
//! [`StoreConnector`] opens a fresh session per logical operation. The
//! filesystem backend covers tests and deployments where the remote volume
//! is locally mounted.

pub mod client;
pub mod fs;
pub mod object_store;

pub use client::MirrorClient;
pub use fs::FsConnector;
pub use object_store::{ObjectStore, StoreConnector, StoreError};
