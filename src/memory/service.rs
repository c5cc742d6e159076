//! Memory service delegating storage to Qdrant and embedding generation to
//! the configured provider.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, OpenAiEmbeddingClient, model_dimension},
    memory::types::{MemoryError, MemoryRecord, RawEntry, SearchResultItem},
    qdrant::{QdrantClient, ScoredPoint, StoredPoint, user_filter},
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Abstraction over the memory adapter used by the HTTP surface.
///
/// Handlers depend on this trait so tests can drive them with stubs.
#[async_trait]
pub trait MemoryApi: Send + Sync {
    /// Store a memory for a user, returning the assigned identifier.
    async fn add(
        &self,
        content: &str,
        user_id: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String, MemoryError>;

    /// Semantic search over a user's memories.
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SearchResultItem>, MemoryError>;

    /// List up to `limit` memories stored for a user.
    async fn list_all(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Delete a single memory by identifier.
    async fn delete(&self, memory_id: &str) -> Result<(), MemoryError>;
}

/// Concrete adapter owning the vector-store transport, the embedding
/// client, and the collection name. Construct once near process start and
/// share through an `Arc`; no retries or circuit breaking happen here —
/// every upstream failure propagates to the endpoint layer.
pub struct MemoryService {
    embedder: Box<dyn EmbeddingClient>,
    store: QdrantClient,
    collection: String,
}

impl MemoryService {
    /// Build an adapter from already-constructed parts.
    pub fn new(embedder: Box<dyn EmbeddingClient>, store: QdrantClient, collection: String) -> Self {
        Self {
            embedder,
            store,
            collection,
        }
    }

    /// Connect to the configured vector store and embedding provider.
    ///
    /// Probes Qdrant by ensuring the memory collection and its payload
    /// index exist, so an unreachable store surfaces here rather than on
    /// the first request. The caller decides what an initialization
    /// failure means for the process.
    pub async fn connect(config: &Config) -> Result<Self, MemoryError> {
        tracing::info!(url = %config.qdrant_url, "Connecting to Qdrant");
        let embedder = OpenAiEmbeddingClient::new(
            &config.openai_base_url,
            &config.openai_api_key,
            &config.openai_embedding_model,
        )?;
        let store = QdrantClient::new(&config.qdrant_url, config.qdrant_api_key.clone())?;

        let vector_size = model_dimension(&config.openai_embedding_model);
        store
            .create_collection_if_not_exists(&config.collection_name, vector_size)
            .await?;
        store
            .ensure_payload_indexes(&config.collection_name)
            .await?;
        tracing::info!(collection = %config.collection_name, "Memory collection ready");

        Ok(Self::new(
            Box::new(embedder),
            store,
            config.collection_name.clone(),
        ))
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let mut vectors = self.embedder.embed(vec![text.to_string()]).await?;
        vectors.pop().ok_or(MemoryError::EmptyEmbedding)
    }
}

#[async_trait]
impl MemoryApi for MemoryService {
    async fn add(
        &self,
        content: &str,
        user_id: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String, MemoryError> {
        let vector = self.embed_one(content).await?;
        let memory_id = Uuid::new_v4().to_string();
        let payload = build_payload(content, user_id, metadata, &current_timestamp_rfc3339());
        self.store
            .upsert_point(&self.collection, &memory_id, vector, payload)
            .await?;
        Ok(memory_id)
    }

    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SearchResultItem>, MemoryError> {
        let vector = self.embed_one(query).await?;
        let hits = self
            .store
            .query_points(&self.collection, vector, user_filter(user_id), limit)
            .await?;
        Ok(hits.into_iter().map(search_item_from_point).collect())
    }

    async fn list_all(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let points = self
            .store
            .scroll_points(&self.collection, user_filter(user_id), limit)
            .await?;
        Ok(points
            .into_iter()
            .map(|point| record_from_point(point, user_id))
            .collect())
    }

    async fn delete(&self, memory_id: &str) -> Result<(), MemoryError> {
        self.store
            .delete_points(&self.collection, &[memory_id.to_string()])
            .await?;
        Ok(())
    }
}

/// Build the payload stored alongside each memory vector.
fn build_payload(
    content: &str,
    user_id: &str,
    metadata: Option<Map<String, Value>>,
    timestamp_rfc3339: &str,
) -> Value {
    let mut payload = Map::new();
    payload.insert("memory".into(), Value::String(content.to_string()));
    payload.insert("user_id".into(), Value::String(user_id.to_string()));
    payload.insert(
        "created_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    if let Some(metadata) = metadata.filter(|map| !map.is_empty()) {
        payload.insert("metadata".into(), Value::Object(metadata));
    }
    Value::Object(payload)
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Normalize a scored point into the fixed search item shape. The
/// point-level score and identifier are authoritative; payload-level
/// values only fill the gaps legacy writers left.
fn search_item_from_point(point: ScoredPoint) -> SearchResultItem {
    let ScoredPoint { id, score, payload } = point;
    let mut item = match payload {
        Some(map) => RawEntry::from_value(Value::Object(map)).into_search_item(),
        None => RawEntry::from_value(Value::Null).into_search_item(),
    };
    item.score = score;
    if item.memory_id.is_none() {
        item.memory_id = Some(id);
    }
    item
}

fn record_from_point(point: StoredPoint, user_id: &str) -> MemoryRecord {
    let StoredPoint { id, payload } = point;
    let entry = match payload {
        Some(map) => RawEntry::from_value(Value::Object(map)),
        None => RawEntry::from_value(Value::Null),
    };
    entry.into_record(id, user_id)
}
