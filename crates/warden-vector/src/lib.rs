//! Resource-aware vector store
//!
//! An abstract vector-store interface plus a decorator that quota-checks
//! every operation before execution and records consumption after, so the
//! governance core sees vector traffic without callers changing. With no
//! enforcer configured the decorator is a transparent pass-through.

pub mod guarded;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use warden_common::Violation;

pub use guarded::{GuardedVectorStore, DEFAULT_STORAGE_MB_PER_POINT};
pub use memory::InMemoryVectorStore;

/// One stored vector with its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub payload: Value,
}

/// One search result, best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub payload: Value,
}

/// Serializable dump of a full collection, used by export/restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDump {
    pub collection: String,
    pub dimension: usize,
    pub points: Vec<VectorPoint>,
}

/// Vector store failure. Quota violations propagate through here so a
/// guarded store can sit behind the same interface as a bare one.
#[derive(Error, Debug)]
pub enum VectorStoreError {
    /// The governance core blocked the operation
    #[error("{0}")]
    Quota(#[from] Violation),

    /// Unknown collection
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Collection already exists
    #[error("collection already exists: {0}")]
    CollectionExists(String),

    /// Query/point dimension does not match the collection
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Backend-specific failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for vector store operations.
pub type VectorResult<T> = Result<T, VectorStoreError>;

/// Abstract vector store: collection lifecycle, point operations, and
/// export/restore. Implementations are backend clients; the governance
/// decorator wraps any of them.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection for vectors of the given dimension.
    async fn create_collection(&self, collection: &str, dimension: usize) -> VectorResult<()>;

    /// Drop a collection and all of its points.
    async fn drop_collection(&self, collection: &str) -> VectorResult<()>;

    /// Names of existing collections.
    async fn list_collections(&self) -> VectorResult<Vec<String>>;

    /// Insert or replace points.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> VectorResult<()>;

    /// Nearest-neighbor search, best hits first.
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> VectorResult<Vec<SearchHit>>;

    /// Delete points by id, returning how many existed.
    async fn delete(&self, collection: &str, ids: &[String]) -> VectorResult<usize>;

    /// Export a full collection.
    async fn export_collection(&self, collection: &str) -> VectorResult<CollectionDump>;

    /// Recreate a collection from a dump.
    async fn restore_collection(&self, dump: CollectionDump) -> VectorResult<()>;
}
