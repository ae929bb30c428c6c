//! crates/planner_core/src/ports.rs
//!
//! Defines the service contracts (traits) the planner core depends on.
//! These traits form the boundary of the hexagonal architecture: the hosted
//! document database, the image CDN and the local client state all sit
//! behind them.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

use crate::document::Document;
use crate::query::{Query, WatchTarget};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Remote operation failed: {0}")]
    Remote(String),
    #[error("Malformed document: {0}")]
    Decode(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A live result set: every item is the full snapshot after a change.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = PortResult<Vec<Document>>> + Send>>;

/// Options for [`DocumentStore::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Merge top-level fields into an existing document instead of replacing it.
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, collection: &str, id: &str) -> PortResult<Option<Document>>;

    /// Filtered and ordered read of one collection.
    async fn query(&self, query: &Query) -> PortResult<Vec<Document>>;

    /// Inserts a document under a generated id and returns that id.
    async fn add(&self, collection: &str, data: Value) -> PortResult<String>;

    /// Writes a document under a known id, replacing or merging.
    async fn set(&self, collection: &str, id: &str, data: Value, options: SetOptions) -> PortResult<()>;

    /// Merges fields into an existing document; `NotFound` if it is absent.
    async fn update(&self, collection: &str, id: &str, partial: Value) -> PortResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> PortResult<()>;

    /// Opens a live query. The stream yields the current result first and then
    /// the full result after every change, until it is dropped.
    fn watch(&self, target: &WatchTarget) -> PortResult<SnapshotStream>;
}

/// Parameters of an image upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub public_id: String,
    pub folder: String,
    pub format: String,
    pub quality: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub secure_url: String,
    pub public_id: String,
}

#[async_trait]
pub trait ImageCdn: Send + Sync {
    /// Uploads an already cropped image.
    async fn upload(&self, image: Bytes, options: &UploadOptions) -> PortResult<UploadedImage>;

    /// Removes an uploaded image.
    async fn delete(&self, public_id: &str) -> PortResult<()>;

    /// Whether a delivery URL currently serves an image.
    async fn exists(&self, url: &str) -> PortResult<bool>;
}

/// Small string values persisted on the client between runs.
pub trait ClientStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}
