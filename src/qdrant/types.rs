//! Shared types used by the Qdrant client.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Scored payload returned by similarity queries.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Identifier assigned to the vector.
    pub id: String,
    /// Similarity score computed by Qdrant.
    pub score: f32,
    /// Optional payload associated with the vector.
    pub payload: Option<Map<String, Value>>,
}

/// Point identifier and payload returned by scroll reads.
#[derive(Debug, Clone)]
pub struct StoredPoint {
    /// Identifier assigned to the vector.
    pub id: String,
    /// Optional payload associated with the vector.
    pub payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

/// Query results have shipped both as a bare point array and wrapped in an
/// object with a `points` key, depending on the Qdrant version.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

impl QueryResponseResult {
    pub(crate) fn into_points(self) -> Vec<QueryPoint> {
        match self {
            Self::Points(points) => points,
            Self::Object { points } => points,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResponse {
    pub(crate) result: ScrollResponseResult,
}

/// Scroll results are normally an object with `points` and a pagination
/// cursor; older servers returned the bare point sequence.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ScrollResponseResult {
    Object {
        #[serde(default)]
        points: Vec<ScrollPoint>,
        #[serde(default)]
        next_page_offset: Option<Value>,
    },
    Points(Vec<ScrollPoint>),
}

impl ScrollResponseResult {
    pub(crate) fn into_page(self) -> (Vec<ScrollPoint>, Option<Value>) {
        match self {
            Self::Object {
                points,
                next_page_offset,
            } => (points, next_page_offset),
            Self::Points(points) => (points, None),
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct ScrollPoint {
    #[serde(default)]
    pub(crate) id: Option<Value>,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
