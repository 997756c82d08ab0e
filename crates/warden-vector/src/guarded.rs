//! Resource-aware decorator
//!
//! Wraps any [`VectorStore`] so every operation is checked against the
//! tenant's vector quotas before execution and recorded after. Check or
//! delegate failure propagates without recording usage. The decorator is
//! built per tenant; collection naming stays the caller's concern.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{CollectionDump, SearchHit, VectorPoint, VectorResult, VectorStore};
use warden_tenant::QuotaEnforcer;

/// Storage attributed to one point, in MB. A fixed heuristic, not a
/// measured size: changing it changes quota semantics, so it stays an
/// explicit constant with a per-wrapper override.
pub const DEFAULT_STORAGE_MB_PER_POINT: f64 = 0.004;

/// Quota-checking decorator around a vector store, scoped to one tenant.
/// Without an enforcer it is a transparent pass-through.
pub struct GuardedVectorStore {
    inner: Arc<dyn VectorStore>,
    quotas: Option<Arc<QuotaEnforcer>>,
    tenant_id: String,
    storage_mb_per_point: f64,
}

impl GuardedVectorStore {
    pub fn new(
        inner: Arc<dyn VectorStore>,
        quotas: Option<Arc<QuotaEnforcer>>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            quotas,
            tenant_id: tenant_id.into(),
            storage_mb_per_point: DEFAULT_STORAGE_MB_PER_POINT,
        }
    }

    /// Override the per-point storage heuristic.
    pub fn with_storage_mb_per_point(mut self, mb: f64) -> Self {
        self.storage_mb_per_point = mb;
        self
    }

    fn check(&self, queries: u64, writes: u64, storage_mb_delta: f64) -> VectorResult<()> {
        if let Some(quotas) = &self.quotas {
            quotas.check_vector_quota(&self.tenant_id, queries, writes, storage_mb_delta)?;
        }
        Ok(())
    }

    fn record(&self, queries: u64, writes: u64, storage_mb_delta: f64) {
        if let Some(quotas) = &self.quotas {
            quotas.record_vector_usage(&self.tenant_id, queries, writes, storage_mb_delta);
        }
    }
}

#[async_trait]
impl VectorStore for GuardedVectorStore {
    async fn create_collection(&self, collection: &str, dimension: usize) -> VectorResult<()> {
        self.inner.create_collection(collection, dimension).await
    }

    async fn drop_collection(&self, collection: &str) -> VectorResult<()> {
        self.inner.drop_collection(collection).await
    }

    async fn list_collections(&self) -> VectorResult<Vec<String>> {
        self.inner.list_collections().await
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> VectorResult<()> {
        let writes = points.len() as u64;
        let storage = writes as f64 * self.storage_mb_per_point;
        self.check(0, writes, storage)?;
        self.inner.upsert(collection, points).await?;
        self.record(0, writes, storage);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> VectorResult<Vec<SearchHit>> {
        // Fixed cost of one query unit per search.
        self.check(1, 0, 0.0)?;
        let hits = self.inner.search(collection, query, limit).await?;
        self.record(1, 0, 0.0);
        Ok(hits)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> VectorResult<usize> {
        let writes = ids.len() as u64;
        // Negative storage delta; deletions are never blocked on storage.
        self.check(0, writes, 0.0)?;
        let removed = self.inner.delete(collection, ids).await?;
        self.record(0, writes, -(removed as f64) * self.storage_mb_per_point);
        Ok(removed)
    }

    async fn export_collection(&self, collection: &str) -> VectorResult<CollectionDump> {
        self.inner.export_collection(collection).await
    }

    async fn restore_collection(&self, dump: CollectionDump) -> VectorResult<()> {
        let writes = dump.points.len() as u64;
        let storage = writes as f64 * self.storage_mb_per_point;
        self.check(0, writes, storage)?;
        self.inner.restore_collection(dump).await?;
        self.record(0, writes, storage);
        Ok(())
    }
}
