//! In-memory vector store
//!
//! Reference backend used by tests and local development. Brute-force
//! cosine search; no persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{CollectionDump, SearchHit, VectorPoint, VectorResult, VectorStore, VectorStoreError};

struct Collection {
    dimension: usize,
    points: HashMap<String, VectorPoint>,
}

/// Brute-force in-memory backend.
pub struct InMemoryVectorStore {
    collections: DashMap<String, Collection>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
        }
    }

    /// Number of points currently stored in a collection.
    pub fn point_count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, collection: &str, dimension: usize) -> VectorResult<()> {
        if self.collections.contains_key(collection) {
            return Err(VectorStoreError::CollectionExists(collection.to_string()));
        }
        self.collections.insert(
            collection.to_string(),
            Collection {
                dimension,
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> VectorResult<()> {
        self.collections
            .remove(collection)
            .map(|_| ())
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))
    }

    async fn list_collections(&self) -> VectorResult<Vec<String>> {
        Ok(self.collections.iter().map(|e| e.key().clone()).collect())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> VectorResult<()> {
        let mut entry = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        for point in &points {
            if point.vector.len() != entry.dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: entry.dimension,
                    got: point.vector.len(),
                });
            }
        }
        for point in points {
            entry.points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> VectorResult<Vec<SearchHit>> {
        let entry = self
            .collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        if query.len() != entry.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: entry.dimension,
                got: query.len(),
            });
        }
        let mut hits: Vec<SearchHit> = entry
            .points
            .values()
            .map(|p| SearchHit {
                id: p.id.clone(),
                score: cosine(query, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> VectorResult<usize> {
        let mut entry = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        let mut removed = 0;
        for id in ids {
            if entry.points.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn export_collection(&self, collection: &str) -> VectorResult<CollectionDump> {
        let entry = self
            .collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        Ok(CollectionDump {
            collection: collection.to_string(),
            dimension: entry.dimension,
            points: entry.points.values().cloned().collect(),
        })
    }

    async fn restore_collection(&self, dump: CollectionDump) -> VectorResult<()> {
        let mut points = HashMap::new();
        for point in dump.points {
            if point.vector.len() != dump.dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: dump.dimension,
                    got: point.vector.len(),
                });
            }
            points.insert(point.id.clone(), point);
        }
        self.collections.insert(
            dump.collection,
            Collection {
                dimension: dump.dimension,
                points,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(id: &str, vector: Vec<f32>) -> VectorPoint {
        VectorPoint {
            id: id.to_string(),
            vector,
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                vec![
                    point("aligned", vec![1.0, 0.0]),
                    point("orthogonal", vec![0.0, 1.0]),
                    point("close", vec![0.9, 0.1]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("docs", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "aligned");
        assert_eq!(hits[1].id, "close");
    }

    #[tokio::test]
    async fn delete_reports_how_many_existed() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 1).await.unwrap();
        store
            .upsert("docs", vec![point("a", vec![1.0]), point("b", vec![2.0])])
            .await
            .unwrap();
        let removed = store
            .delete("docs", &["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.point_count("docs"), 1);
    }

    #[tokio::test]
    async fn export_restore_round_trip() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 1).await.unwrap();
        store.upsert("docs", vec![point("a", vec![1.0])]).await.unwrap();

        let dump = store.export_collection("docs").await.unwrap();
        let other = InMemoryVectorStore::new();
        other.restore_collection(dump).await.unwrap();
        assert_eq!(other.point_count("docs"), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        let err = store.upsert("docs", vec![point("a", vec![1.0])]).await;
        assert!(matches!(
            err,
            Err(VectorStoreError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }
}
