//! HTTP surface for the memory service.
//!
//! A compact Axum router with one handler per operation:
//!
//! - `GET /health` – Availability report; 200 even when the vector store is
//!   unreachable, with `status` flipping between `healthy` and `degraded`.
//! - `GET /` – Static service metadata and endpoint directory.
//! - `POST /memory/add` – Store one memory for a user.
//! - `POST /memory/search` – Semantic search over a user's memories.
//! - `GET /memory/{user_id}` – List stored memories for a user.
//! - `DELETE /memory/{memory_id}` – Delete a single memory.
//! - `DELETE /memory/user/{user_id}` – Delete every memory a user owns.
//! - `POST /memory/batch/add` – Store up to 50 memories, reporting per-item
//!   outcomes.
//!
//! Handlers are generic over [`MemoryApi`] so tests can drive the full
//! router with a stub adapter.

pub mod extract;
pub mod handlers;
pub mod schemas;

use crate::api::schemas::ErrorBody;
use crate::config::get_config;
use crate::memory::{MemoryApi, MemoryError, MemoryService};
use axum::{
    Json, Router,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors, cors::CorsLayer, trace::TraceLayer};

/// Shared state handed to every request handler.
///
/// Replaces a global mutable adapter reference: the context is constructed
/// explicitly at startup and passed through router state. The adapter slot
/// is written only outside concurrent request-serving windows, so no lock
/// is carried.
pub struct ServiceContext<S> {
    memory: Option<Arc<S>>,
}

impl ServiceContext<MemoryService> {
    /// Connect the memory adapter, tolerating an unavailable vector store.
    ///
    /// A connection failure leaves the adapter unset and the process
    /// running: memory operations answer 503 and health reports degraded
    /// until the service is restarted. A transient dependency outage must
    /// not keep the container from passing liveness checks.
    pub async fn initialize() -> Self {
        let config = get_config();
        match MemoryService::connect(config).await {
            Ok(service) => {
                tracing::info!(collection = %config.collection_name, "Memory service initialized");
                Self {
                    memory: Some(Arc::new(service)),
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, url = %config.qdrant_url, "Could not initialize memory service");
                tracing::warn!(
                    "Memory operations will be unavailable until the vector store becomes reachable"
                );
                Self { memory: None }
            }
        }
    }
}

impl<S> ServiceContext<S> {
    /// Build a context around an already-connected adapter.
    pub fn with_memory(memory: S) -> Self {
        Self {
            memory: Some(Arc::new(memory)),
        }
    }

    /// Build a context with no adapter, mirroring a failed startup.
    pub fn disconnected() -> Self {
        Self { memory: None }
    }

    /// Whether the memory adapter is available.
    pub fn is_connected(&self) -> bool {
        self.memory.is_some()
    }

    /// Access the adapter, or the service-unavailable error when unset.
    pub(crate) fn memory(&self) -> Result<&Arc<S>, ApiError> {
        self.memory.as_ref().ok_or(ApiError::Unavailable)
    }

    /// Release the adapter reference. Safe to call more than once.
    pub fn close(&mut self) {
        if self.memory.take().is_some() {
            tracing::info!("Memory service connection released");
        }
    }
}

/// Failures surfaced by the HTTP handlers.
pub enum ApiError {
    /// Memory adapter is not initialized; the service is degraded.
    Unavailable,
    /// A delegated library call failed.
    Upstream {
        /// Operation description prefixed to the client-facing message.
        context: &'static str,
        /// Underlying adapter error.
        source: MemoryError,
    },
}

impl ApiError {
    pub(crate) fn upstream(context: &'static str, source: MemoryError) -> Self {
        Self::Upstream { context, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Memory service not initialized".to_string(),
            ),
            Self::Upstream { context, source } => {
                tracing::error!(error = %source, context, "Upstream operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{context}: {source}"),
                )
            }
        };
        (status, Json(ErrorBody::new(error))).into_response()
    }
}

/// Build the HTTP router exposing the memory API surface.
pub fn create_router<S>(context: Arc<ServiceContext<S>>) -> Router
where
    S: MemoryApi + 'static,
{
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health::<S>))
        .route("/memory/add", post(handlers::add_memory::<S>))
        .route("/memory/search", post(handlers::search_memory::<S>))
        .route("/memory/batch/add", post(handlers::add_memories_batch::<S>))
        .route(
            "/memory/user/:user_id",
            delete(handlers::delete_user_memories::<S>),
        )
        .route(
            "/memory/:id",
            get(handlers::get_memories::<S>).delete(handlers::delete_memory::<S>),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&get_config().cors_origins))
        .with_state(context)
}

/// Translate the configured origin list into a CORS layer.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods(cors::Any)
            .allow_headers(cors::Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(parsed)
            .allow_methods(cors::Any)
            .allow_headers(cors::Any)
    }
}

/// Convert a handler panic into the generic error envelope.
///
/// The panic message is always logged; it reaches the client only when the
/// debug flag is set.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|message| message.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(detail = %detail, "Unhandled panic while serving request");

    let body = ErrorBody {
        success: false,
        error: "Internal server error".to_string(),
        detail: get_config()
            .debug
            .then(|| serde_json::Value::String(detail)),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
