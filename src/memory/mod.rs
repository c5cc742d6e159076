//! Memory-client adapter coordinating embedding generation and vector-store
//! calls on behalf of the HTTP surface.

pub mod service;
pub mod types;

pub use service::{MemoryApi, MemoryService};
pub use types::{MemoryError, MemoryRecord, SearchResultItem};
