//! Remote object storage for materialized artifacts.

pub mod store;

pub use store::{HttpObjectStore, ObjectStore, StorageError};
