//! The user's paper library.
//!
//! [`LibraryStore`] is a session cache fronting a persisted per-user document
//! collection ([`LibraryBackend`]). Writes land in the cache first and are then
//! forwarded to the backend; [`LibraryStore::load_remote`] is the point where
//! the cache is reconciled with what the backend holds.

mod file;
mod memory;
mod store;

pub use file::FileLibraryBackend;
pub use memory::MemoryLibraryBackend;
pub use store::LibraryStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One document as held by the persisted store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Key the document is stored under
    pub id: String,
    pub data: Value,
}

/// Persisted, per-user document collection
///
/// Failures are [`crate::Error::PersistenceUnavailable`].
#[async_trait]
pub trait LibraryBackend: Send + Sync + std::fmt::Debug {
    /// All documents of a user
    async fn get_all(&self, user: &str) -> Result<Vec<StoredDocument>>;

    /// Create or replace the document stored under `id`
    async fn set(&self, user: &str, id: &str, data: &Value) -> Result<()>;

    /// Delete the document stored under `id`; deleting a missing id succeeds
    async fn delete(&self, user: &str, id: &str) -> Result<()>;
}
