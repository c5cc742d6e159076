//! Request and response schemas for the HTTP surface.

use crate::memory::{MemoryRecord, SearchResultItem};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Request body for `POST /memory/add`, also a single batch item.
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct MemoryInput {
    /// Memory text to store.
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    /// Owner of the memory.
    #[validate(length(min = 1, max = 100))]
    pub user_id: String,
    /// Optional metadata stored alongside the memory.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Request body for `POST /memory/search`.
#[derive(Debug, Deserialize, Validate)]
pub struct SearchInput {
    /// Natural language query text.
    #[validate(length(min = 1, max = 500))]
    pub query: String,
    /// User whose memories are searched.
    #[validate(length(min = 1, max = 100))]
    pub user_id: String,
    /// Maximum number of results.
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    5
}

/// Request body for `POST /memory/batch/add`.
#[derive(Debug, Deserialize, Validate)]
pub struct BatchMemoryInput {
    /// Memories to store; at most 50 per request.
    #[validate(length(min = 1, max = 50), nested)]
    pub memories: Vec<MemoryInput>,
}

/// Query parameters for `GET /memory/{user_id}`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum number of memories to return.
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    100
}

/// Standard success envelope shared by mutation endpoints.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    /// Whether the operation completed without errors.
    pub success: bool,
    /// Human-readable outcome description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Operation-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Response body for `POST /memory/search`.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Always `true`; failures use the error envelope instead.
    pub success: bool,
    /// Normalized search results, best match first.
    pub results: Vec<SearchResultItem>,
    /// Number of entries in `results`.
    pub count: usize,
}

/// Response body for `GET /memory/{user_id}`.
#[derive(Debug, Serialize)]
pub struct MemoryListResponse {
    /// Always `true`; failures use the error envelope instead.
    pub success: bool,
    /// Stored records for the user.
    pub memories: Vec<MemoryRecord>,
    /// Number of entries in `memories`.
    pub count: usize,
}

/// Outcome entry for a failed batch item.
#[derive(Debug, Serialize)]
pub struct BatchItemError {
    /// Zero-based position of the failing item in the request.
    pub index: usize,
    /// Failure description for that item.
    pub error: String,
}

/// Error envelope shared by every failure path.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Failure description.
    pub error: String,
    /// Additional detail, such as per-field validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Build an envelope with no extra detail attached.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            detail: None,
        }
    }
}
