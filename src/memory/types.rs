//! Data types, errors, and raw-shape normalization for the memory adapter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors emitted by the memory adapter.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] crate::embedding::EmbeddingError),
    /// Vector store interaction failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] crate::qdrant::QdrantError),
    /// Embedding provider returned no vectors for the input.
    #[error("Embedding provider returned no vectors for the input")]
    EmptyEmbedding,
}

/// Stored memory record returned by list operations.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryRecord {
    /// Identifier assigned by the vector store.
    pub id: String,
    /// Memory text.
    pub memory: String,
    /// Owner of the memory.
    pub user_id: String,
    /// Arbitrary key/value metadata stored alongside the memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Creation timestamp in RFC3339, when the writer recorded one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Normalized search result item returned to API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResultItem {
    /// Memory text matched by the query.
    pub memory: String,
    /// Similarity score reported by the vector store.
    pub score: f32,
    /// Metadata stored alongside the memory, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Identifier of the matched memory, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,
}

/// Raw entry as stored by the writers this collection has seen.
///
/// The current writer stores a structured record under top-level keys;
/// earlier writers used `text` or `data` for the memory text, and the
/// oldest stored the bare text alone. Each variant has its own
/// normalization arm so handlers never inspect shapes themselves.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawEntry {
    /// Structured record, current or legacy field names.
    Record(RawRecord),
    /// Bare memory text with nothing attached.
    Text(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRecord {
    #[serde(alias = "text", alias = "data")]
    pub(crate) memory: Option<String>,
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) user_id: Option<String>,
    #[serde(default)]
    pub(crate) score: Option<f32>,
    #[serde(default)]
    pub(crate) metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub(crate) created_at: Option<String>,
}

impl RawEntry {
    /// Decode an entry value, falling back to an empty record when the
    /// shape is unrecognizable.
    pub(crate) fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or(Self::Record(RawRecord {
            memory: None,
            id: None,
            user_id: None,
            score: None,
            metadata: None,
            created_at: None,
        }))
    }

    /// Collapse any entry shape into the fixed search item: text, score
    /// defaulting to 0.0, metadata defaulting to absent.
    pub(crate) fn into_search_item(self) -> SearchResultItem {
        match self {
            Self::Record(record) => SearchResultItem {
                memory: record.memory.unwrap_or_default(),
                score: record.score.unwrap_or(0.0),
                metadata: record.metadata,
                memory_id: record.id,
            },
            Self::Text(text) => SearchResultItem {
                memory: text,
                score: 0.0,
                metadata: None,
                memory_id: None,
            },
        }
    }

    /// Collapse any entry shape into a stored record owned by `user_id`.
    ///
    /// `fallback_id` is the point identifier assigned by the store, used
    /// when the payload itself carries none.
    pub(crate) fn into_record(self, fallback_id: String, user_id: &str) -> MemoryRecord {
        match self {
            Self::Record(record) => MemoryRecord {
                id: record.id.unwrap_or(fallback_id),
                memory: record.memory.unwrap_or_default(),
                user_id: record.user_id.unwrap_or_else(|| user_id.to_string()),
                metadata: record.metadata,
                created_at: record.created_at,
            },
            Self::Text(text) => MemoryRecord {
                id: fallback_id,
                memory: text,
                user_id: user_id.to_string(),
                metadata: None,
                created_at: None,
            },
        }
    }
}
