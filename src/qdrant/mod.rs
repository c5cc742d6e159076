//! Qdrant vector store integration.

pub mod client;
pub mod filters;
pub mod types;

pub use client::QdrantClient;
pub use filters::user_filter;
pub use types::{QdrantError, ScoredPoint, StoredPoint};
