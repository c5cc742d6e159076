#![deny(missing_docs)]

//! Core library for the memserve memory service.

/// HTTP routing, request schemas, and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and the OpenAI adapter.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Memory-client adapter coordinating the vector store and embedder.
pub mod memory;
/// Qdrant vector store integration.
pub mod qdrant;
