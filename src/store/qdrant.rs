//! Qdrant chunk store.
//!
//! Chunks are Qdrant points: the embedding is the point's dense vector and
//! the remaining attributes live in the payload. Filtered search is a
//! payload-filtered `scroll`; nearest-neighbour search is `search_points`.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    Condition, Filter, PointId, Range, ScrollPointsBuilder, SearchPointsBuilder, Value,
    VectorsOutput,
};

use crate::models::IndexedChunk;

use super::{ChunkStore, OverlapFilter, StoreError};

/// Payload field names written by the indexing pipeline.
pub const FIELD_FILEPATH: &str = "filepath";
pub const FIELD_START_LINE: &str = "start_line";
pub const FIELD_END_LINE: &str = "end_line";
pub const FIELD_FUNCTION_NAME: &str = "function_name";
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_EMBEDDING: &str = "embedding";
pub const FIELD_IMPORTANCE: &str = "importance";

/// Chunk store over a Qdrant collection.
#[derive(Clone)]
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl QdrantStore {
    /// Connect to Qdrant at `url` (gRPC endpoint, usually port 6334).
    pub fn new(url: &str, api_key: Option<&str>, collection: &str) -> Result<Self, StoreError> {
        let mut config = Qdrant::from_url(url);
        if let Some(key) = api_key {
            config = config.api_key(key.to_string());
        }
        let client = config
            .build()
            .map_err(|e| StoreError::Backend(format!("failed to create Qdrant client: {e}")))?;
        Ok(Self {
            client,
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

/// Build the Qdrant filter for a hunk-scoped query.
pub fn overlap_filter(filter: &OverlapFilter) -> Filter {
    Filter::must([
        Condition::matches(FIELD_FILEPATH, filter.filepath.clone()),
        Condition::range(
            FIELD_START_LINE,
            Range {
                lte: Some(f64::from(filter.end_line)),
                ..Default::default()
            },
        ),
        Condition::range(
            FIELD_END_LINE,
            Range {
                gte: Some(f64::from(filter.start_line)),
                ..Default::default()
            },
        ),
    ])
}

#[async_trait]
impl ChunkStore for QdrantStore {
    async fn filtered_search(
        &self,
        filter: &OverlapFilter,
        limit: usize,
    ) -> Result<Vec<IndexedChunk>, StoreError> {
        let request = ScrollPointsBuilder::new(&self.collection)
            .filter(overlap_filter(filter))
            .limit(u32::try_from(limit).unwrap_or(u32::MAX))
            .with_payload(true)
            .with_vectors(true);

        let response = self
            .client
            .scroll(request)
            .await
            .map_err(|e| StoreError::Backend(format!("Qdrant scroll failed: {e}")))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| chunk_from_point(point.id, point.payload, point.vectors))
            .collect())
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<IndexedChunk>, StoreError> {
        let request = SearchPointsBuilder::new(&self.collection, vector.to_vec(), k as u64)
            .with_payload(true)
            .with_vectors(true);

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| StoreError::Backend(format!("Qdrant search failed: {e}")))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| chunk_from_point(point.id, point.payload, point.vectors))
            .collect())
    }
}

/// Convert a Qdrant point into an [`IndexedChunk`].
///
/// Returns `None` (and logs) for points missing the path or line attributes,
/// or whose stored range is inverted.
pub fn chunk_from_point(
    id: Option<PointId>,
    payload: HashMap<String, Value>,
    vectors: Option<VectorsOutput>,
) -> Option<IndexedChunk> {
    let id = id.map(|p| point_id_string(&p)).unwrap_or_default();

    let (Some(filepath), Some(start_line), Some(end_line)) = (
        payload_str(&payload, FIELD_FILEPATH),
        payload_line(&payload, FIELD_START_LINE),
        payload_line(&payload, FIELD_END_LINE),
    ) else {
        tracing::debug!(%id, "skipping point without filepath/start_line/end_line");
        return None;
    };
    if start_line > end_line {
        tracing::debug!(%id, start_line, end_line, "skipping point with inverted line range");
        return None;
    }

    let embedding = dense_vector(vectors)
        .filter(|v| !v.is_empty())
        .or_else(|| payload_vector(&payload, FIELD_EMBEDDING))
        .unwrap_or_default();

    Some(IndexedChunk {
        id,
        filepath,
        function_name: payload_str(&payload, FIELD_FUNCTION_NAME).filter(|s| !s.is_empty()),
        start_line,
        end_line,
        content: payload_str(&payload, FIELD_CONTENT).unwrap_or_default(),
        embedding,
        importance: payload_number(&payload, FIELD_IMPORTANCE)
            .map(|v| v as f32)
            .unwrap_or(1.0),
    })
}

fn point_id_string(id: &PointId) -> String {
    match &id.point_id_options {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u.clone(),
        None => String::new(),
    }
}

/// Extract the dense vector from a point, preferring a vector named
/// `embedding` when the collection uses named vectors.
#[allow(deprecated)]
fn dense_vector(vectors: Option<VectorsOutput>) -> Option<Vec<f32>> {
    match vectors?.vectors_options? {
        VectorsOptions::Vector(v) => Some(v.data),
        VectorsOptions::Vectors(mut named) => named
            .vectors
            .remove(FIELD_EMBEDDING)
            .or_else(|| named.vectors.into_values().next())
            .map(|v| v.data),
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_number(payload: &HashMap<String, Value>, key: &str) -> Option<f64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(i) => Some(*i as f64),
        Kind::DoubleValue(d) => Some(*d),
        Kind::StringValue(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn payload_line(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
    let n = payload_number(payload, key)?;
    if n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX) {
        Some(n as u32)
    } else {
        None
    }
}

fn payload_vector(payload: &HashMap<String, Value>, key: &str) -> Option<Vec<f32>> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::ListValue(list) => list
            .values
            .iter()
            .map(|v| match v.kind.as_ref()? {
                Kind::DoubleValue(d) => Some(*d as f32),
                Kind::IntegerValue(i) => Some(*i as f32),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}
