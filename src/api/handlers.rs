//! REST handlers for the memory endpoints.

use crate::api::schemas::{
    BatchItemError, BatchMemoryInput, ListQuery, MemoryInput, MemoryListResponse, SearchInput,
    SearchResponse, SuccessResponse,
};
use crate::api::{ApiError, ServiceContext, extract::ValidatedJson};
use crate::config::get_config;
use crate::memory::MemoryApi;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Upper bound on records fetched when clearing a user's memories.
const DELETE_ALL_FETCH_LIMIT: usize = 10_000;

/// Availability report. Always 200; the body flips between `healthy` and
/// `degraded` so orchestrators keep the container alive through a vector
/// store outage.
pub async fn health<S>(State(context): State<Arc<ServiceContext<S>>>) -> Json<Value>
where
    S: MemoryApi,
{
    let config = get_config();
    let connected = context.is_connected();
    Json(json!({
        "status": if connected { "healthy" } else { "degraded" },
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "connections": {
            "qdrant": {
                "url": config.qdrant_url,
                "status": if connected { "connected" } else { "disconnected" },
            },
            "collection": config.collection_name,
        }
    }))
}

/// Static service metadata and endpoint directory.
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "endpoints": {
            "health": "/health",
            "add_memory": "/memory/add",
            "search_memory": "/memory/search",
            "get_memories": "/memory/{user_id}",
            "delete_memory": "/memory/{memory_id}",
            "delete_user_memories": "/memory/user/{user_id}",
            "batch_add": "/memory/batch/add",
        }
    }))
}

/// Store a new memory for a user.
pub async fn add_memory<S>(
    State(context): State<Arc<ServiceContext<S>>>,
    ValidatedJson(input): ValidatedJson<MemoryInput>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    S: MemoryApi,
{
    let memory = context.memory()?;
    let memory_id = memory
        .add(&input.content, &input.user_id, input.metadata)
        .await
        .map_err(|source| ApiError::upstream("Failed to add memory", source))?;

    tracing::info!(user_id = %input.user_id, memory_id = %memory_id, "Memory added");
    Ok(Json(SuccessResponse {
        success: true,
        message: Some("Memory added successfully".to_string()),
        data: Some(json!({ "memory_id": memory_id })),
    }))
}

/// Semantic search over a user's memories.
pub async fn search_memory<S>(
    State(context): State<Arc<ServiceContext<S>>>,
    ValidatedJson(input): ValidatedJson<SearchInput>,
) -> Result<Json<SearchResponse>, ApiError>
where
    S: MemoryApi,
{
    let memory = context.memory()?;
    let results = memory
        .search(&input.query, &input.user_id, input.limit)
        .await
        .map_err(|source| ApiError::upstream("Failed to search memory", source))?;

    tracing::info!(user_id = %input.user_id, results = results.len(), "Search completed");
    let count = results.len();
    Ok(Json(SearchResponse {
        success: true,
        results,
        count,
    }))
}

/// List stored memories for a user.
pub async fn get_memories<S>(
    State(context): State<Arc<ServiceContext<S>>>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<MemoryListResponse>, ApiError>
where
    S: MemoryApi,
{
    let memory = context.memory()?;
    let memories = memory
        .list_all(&user_id, query.limit)
        .await
        .map_err(|source| ApiError::upstream("Failed to get memories", source))?;

    tracing::info!(user_id = %user_id, count = memories.len(), "Memories retrieved");
    let count = memories.len();
    Ok(Json(MemoryListResponse {
        success: true,
        memories,
        count,
    }))
}

/// Delete a single memory by identifier.
pub async fn delete_memory<S>(
    State(context): State<Arc<ServiceContext<S>>>,
    Path(memory_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    S: MemoryApi,
{
    let memory = context.memory()?;
    memory
        .delete(&memory_id)
        .await
        .map_err(|source| ApiError::upstream("Failed to delete memory", source))?;

    tracing::info!(memory_id = %memory_id, "Memory deleted");
    Ok(Json(SuccessResponse {
        success: true,
        message: Some("Memory deleted successfully".to_string()),
        data: None,
    }))
}

/// Delete every memory a user owns.
///
/// Fetch-all-then-delete-each with no transactional guarantee. The loop
/// keeps going past individual failures so one bad point cannot strand the
/// rest of the set; the response carries the success count and, when any
/// deletion failed, the failure count.
pub async fn delete_user_memories<S>(
    State(context): State<Arc<ServiceContext<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    S: MemoryApi,
{
    let memory = context.memory()?;
    let records = memory
        .list_all(&user_id, DELETE_ALL_FETCH_LIMIT)
        .await
        .map_err(|source| ApiError::upstream("Failed to delete memories", source))?;

    let mut deleted_count = 0usize;
    let mut failed_count = 0usize;
    for record in &records {
        match memory.delete(&record.id).await {
            Ok(()) => deleted_count += 1,
            Err(error) => {
                failed_count += 1;
                tracing::warn!(memory_id = %record.id, error = %error, "Failed to delete memory during bulk clear");
            }
        }
    }

    tracing::info!(user_id = %user_id, deleted_count, failed_count, "User memories deleted");
    let mut data = Map::new();
    data.insert("deleted_count".into(), json!(deleted_count));
    if failed_count > 0 {
        data.insert("failed_count".into(), json!(failed_count));
    }
    Ok(Json(SuccessResponse {
        success: true,
        message: Some(format!("Deleted {deleted_count} memories")),
        data: Some(Value::Object(data)),
    }))
}

/// Store up to 50 memories in one request.
///
/// Items are attempted independently and in order; a failing item is
/// reported with its index and never aborts the rest of the batch.
pub async fn add_memories_batch<S>(
    State(context): State<Arc<ServiceContext<S>>>,
    ValidatedJson(batch): ValidatedJson<BatchMemoryInput>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    S: MemoryApi,
{
    let memory = context.memory()?;
    let mut memory_ids = Vec::new();
    let mut errors: Vec<BatchItemError> = Vec::new();

    for (index, item) in batch.memories.into_iter().enumerate() {
        match memory.add(&item.content, &item.user_id, item.metadata).await {
            Ok(memory_id) => memory_ids.push(memory_id),
            Err(error) => errors.push(BatchItemError {
                index,
                error: error.to_string(),
            }),
        }
    }

    tracing::info!(added = memory_ids.len(), failed = errors.len(), "Batch add completed");
    let mut data = Map::new();
    data.insert("memory_ids".into(), json!(memory_ids));
    if !errors.is_empty() {
        data.insert("errors".into(), json!(errors));
    }
    Ok(Json(SuccessResponse {
        success: errors.is_empty(),
        message: Some(format!("Added {} memories", memory_ids.len())),
        data: Some(Value::Object(data)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::config::{CONFIG, Config};
    use crate::memory::{MemoryError, MemoryRecord, SearchResultItem};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use std::sync::Once;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    fn ensure_test_config() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = CONFIG.set(Config {
                qdrant_url: "http://127.0.0.1:6333".into(),
                qdrant_api_key: None,
                openai_api_key: "test-key".into(),
                openai_base_url: "http://127.0.0.1:1".into(),
                openai_embedding_model: "text-embedding-3-small".into(),
                collection_name: "user_memories".into(),
                host: "127.0.0.1".into(),
                port: 8002,
                cors_origins: vec!["*".into()],
                log_level: "info".into(),
                debug: false,
            });
        });
    }

    /// Stub adapter recording calls and returning canned data.
    #[derive(Default)]
    struct StubMemory {
        added: Mutex<Vec<(String, String)>>,
        deleted: Mutex<Vec<String>>,
        search_results: Vec<SearchResultItem>,
        list_results: Vec<MemoryRecord>,
        fail_adds_containing: Option<String>,
        failing_delete_ids: Vec<String>,
    }

    #[async_trait]
    impl MemoryApi for StubMemory {
        async fn add(
            &self,
            content: &str,
            user_id: &str,
            _metadata: Option<Map<String, Value>>,
        ) -> Result<String, MemoryError> {
            if let Some(marker) = &self.fail_adds_containing
                && content.contains(marker.as_str())
            {
                return Err(MemoryError::EmptyEmbedding);
            }
            let mut guard = self.added.lock().await;
            guard.push((content.to_string(), user_id.to_string()));
            Ok(format!("mem-{}", guard.len()))
        }

        async fn search(
            &self,
            _query: &str,
            _user_id: &str,
            limit: usize,
        ) -> Result<Vec<SearchResultItem>, MemoryError> {
            Ok(self.search_results.iter().take(limit).cloned().collect())
        }

        async fn list_all(
            &self,
            _user_id: &str,
            limit: usize,
        ) -> Result<Vec<MemoryRecord>, MemoryError> {
            Ok(self.list_results.iter().take(limit).cloned().collect())
        }

        async fn delete(&self, memory_id: &str) -> Result<(), MemoryError> {
            if self.failing_delete_ids.iter().any(|id| id == memory_id) {
                return Err(MemoryError::EmptyEmbedding);
            }
            self.deleted.lock().await.push(memory_id.to_string());
            Ok(())
        }
    }

    fn record(id: &str, memory: &str, user_id: &str) -> MemoryRecord {
        MemoryRecord {
            id: id.to_string(),
            memory: memory.to_string(),
            user_id: user_id.to_string(),
            metadata: None,
            created_at: None,
        }
    }

    fn hit(memory: &str, score: f32) -> SearchResultItem {
        SearchResultItem {
            memory: memory.to_string(),
            score,
            metadata: None,
            memory_id: None,
        }
    }

    fn router_with(stub: StubMemory) -> (axum::Router, Arc<ServiceContext<StubMemory>>) {
        ensure_test_config();
        let context = Arc::new(ServiceContext::with_memory(stub));
        (create_router(context.clone()), context)
    }

    fn disconnected_router() -> axum::Router {
        ensure_test_config();
        create_router(Arc::new(ServiceContext::<StubMemory>::disconnected()))
    }

    async fn send_json(
        app: axum::Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.oneshot(request).await.expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    #[tokio::test]
    async fn add_memory_returns_assigned_id() {
        let (app, context) = router_with(StubMemory::default());
        let (status, body) = send_json(
            app,
            Method::POST,
            "/memory/add",
            Some(json!({ "content": "User prefers dark mode", "user_id": "alice" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let memory_id = body["data"]["memory_id"].as_str().expect("memory_id");
        assert!(!memory_id.is_empty());

        let stub = context.memory().ok().expect("stub present");
        let added = stub.added.lock().await;
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].1, "alice");
    }

    #[tokio::test]
    async fn add_memory_rejects_oversized_content_before_the_adapter() {
        let (app, context) = router_with(StubMemory::default());
        let oversized = "x".repeat(10_001);
        let (status, body) = send_json(
            app,
            Method::POST,
            "/memory/add",
            Some(json!({ "content": oversized, "user_id": "alice" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["detail"]["content"].is_array());

        let stub = context.memory().ok().expect("stub present");
        assert!(stub.added.lock().await.is_empty());
    }

    #[tokio::test]
    async fn add_memory_rejects_oversized_user_id_before_the_adapter() {
        let (app, context) = router_with(StubMemory::default());
        let (status, _body) = send_json(
            app,
            Method::POST,
            "/memory/add",
            Some(json!({ "content": "ok", "user_id": "u".repeat(101) })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let stub = context.memory().ok().expect("stub present");
        assert!(stub.added.lock().await.is_empty());
    }

    #[tokio::test]
    async fn memory_operations_return_503_when_disconnected() {
        let app = disconnected_router();
        let (status, body) = send_json(
            app,
            Method::POST,
            "/memory/add",
            Some(json!({ "content": "note", "user_id": "alice" })),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Memory service not initialized");
    }

    #[tokio::test]
    async fn search_respects_the_requested_limit() {
        let stub = StubMemory {
            search_results: (0..10).map(|i| hit(&format!("memory {i}"), 0.9)).collect(),
            ..Default::default()
        };
        let (app, _context) = router_with(stub);
        let (status, body) = send_json(
            app,
            Method::POST,
            "/memory/search",
            Some(json!({ "query": "preferences", "user_id": "alice", "limit": 3 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
        assert_eq!(body["results"].as_array().expect("results").len(), 3);
    }

    #[tokio::test]
    async fn search_defaults_to_five_results() {
        let stub = StubMemory {
            search_results: (0..10).map(|i| hit(&format!("memory {i}"), 0.9)).collect(),
            ..Default::default()
        };
        let (app, _context) = router_with(stub);
        let (status, body) = send_json(
            app,
            Method::POST,
            "/memory/search",
            Some(json!({ "query": "preferences", "user_id": "alice" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 5);
    }

    #[tokio::test]
    async fn search_rejects_out_of_range_limit() {
        let (app, _context) = router_with(StubMemory::default());
        let (status, _body) = send_json(
            app,
            Method::POST,
            "/memory/search",
            Some(json!({ "query": "q", "user_id": "alice", "limit": 0 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_memories_lists_user_records() {
        let stub = StubMemory {
            list_results: vec![
                record("m1", "first", "alice"),
                record("m2", "second", "alice"),
            ],
            ..Default::default()
        };
        let (app, _context) = router_with(stub);
        let (status, body) = send_json(app, Method::GET, "/memory/alice", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 2);
        assert_eq!(body["memories"][0]["memory"], "first");
        assert_eq!(body["memories"][1]["id"], "m2");
    }

    #[tokio::test]
    async fn delete_memory_reports_success() {
        let (app, context) = router_with(StubMemory::default());
        let (status, body) = send_json(app, Method::DELETE, "/memory/mem-42", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Memory deleted successfully");

        let stub = context.memory().ok().expect("stub present");
        assert_eq!(*stub.deleted.lock().await, vec!["mem-42".to_string()]);
    }

    #[tokio::test]
    async fn delete_user_memories_counts_every_deletion() {
        let stub = StubMemory {
            list_results: vec![
                record("m1", "a", "alice"),
                record("m2", "b", "alice"),
                record("m3", "c", "alice"),
            ],
            ..Default::default()
        };
        let (app, _context) = router_with(stub);
        let (status, body) = send_json(app, Method::DELETE, "/memory/user/alice", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["deleted_count"], 3);
        assert!(body["data"].get("failed_count").is_none());
    }

    #[tokio::test]
    async fn delete_user_memories_continues_past_failures() {
        let stub = StubMemory {
            list_results: vec![
                record("m1", "a", "alice"),
                record("m2", "b", "alice"),
                record("m3", "c", "alice"),
            ],
            failing_delete_ids: vec!["m2".to_string()],
            ..Default::default()
        };
        let (app, context) = router_with(stub);
        let (status, body) = send_json(app, Method::DELETE, "/memory/user/alice", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted_count"], 2);
        assert_eq!(body["data"]["failed_count"], 1);

        let stub = context.memory().ok().expect("stub present");
        assert_eq!(stub.deleted.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn delete_user_memories_with_no_records_reports_zero() {
        let (app, _context) = router_with(StubMemory::default());
        let (status, body) = send_json(app, Method::DELETE, "/memory/user/nobody", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["deleted_count"], 0);
    }

    #[tokio::test]
    async fn batch_add_stores_every_valid_item() {
        let (app, _context) = router_with(StubMemory::default());
        let memories: Vec<Value> = (0..4)
            .map(|i| json!({ "content": format!("note {i}"), "user_id": "alice" }))
            .collect();
        let (status, body) = send_json(
            app,
            Method::POST,
            "/memory/batch/add",
            Some(json!({ "memories": memories })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["memory_ids"].as_array().expect("ids").len(), 4);
        assert!(body["data"].get("errors").is_none());
    }

    #[tokio::test]
    async fn batch_add_reports_the_failing_index_and_keeps_going() {
        let stub = StubMemory {
            fail_adds_containing: Some("poison".to_string()),
            ..Default::default()
        };
        let (app, _context) = router_with(stub);
        let (status, body) = send_json(
            app,
            Method::POST,
            "/memory/batch/add",
            Some(json!({ "memories": [
                { "content": "first", "user_id": "alice" },
                { "content": "poison pill", "user_id": "alice" },
                { "content": "third", "user_id": "alice" },
            ] })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["memory_ids"].as_array().expect("ids").len(), 2);
        let errors = body["data"]["errors"].as_array().expect("errors");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["index"], 1);
        assert!(errors[0]["error"].as_str().expect("error message").len() > 0);
    }

    #[tokio::test]
    async fn batch_add_rejects_more_than_fifty_items() {
        let (app, context) = router_with(StubMemory::default());
        let memories: Vec<Value> = (0..51)
            .map(|i| json!({ "content": format!("note {i}"), "user_id": "alice" }))
            .collect();
        let (status, _body) = send_json(
            app,
            Method::POST,
            "/memory/batch/add",
            Some(json!({ "memories": memories })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let stub = context.memory().ok().expect("stub present");
        assert!(stub.added.lock().await.is_empty());
    }

    #[tokio::test]
    async fn health_reports_degraded_when_disconnected() {
        let app = disconnected_router();
        let (status, body) = send_json(app, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["connections"]["qdrant"]["status"], "disconnected");
        assert_eq!(body["connections"]["collection"], "user_memories");
    }

    #[tokio::test]
    async fn health_reports_healthy_when_connected() {
        let (app, _context) = router_with(StubMemory::default());
        let (status, body) = send_json(app, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["connections"]["qdrant"]["status"], "connected");
    }

    #[tokio::test]
    async fn root_lists_every_endpoint() {
        let (app, _context) = router_with(StubMemory::default());
        let (status, body) = send_json(app, Method::GET, "/", None).await;

        assert_eq!(status, StatusCode::OK);
        let endpoints = body["endpoints"].as_object().expect("endpoints");
        for key in [
            "health",
            "add_memory",
            "search_memory",
            "get_memories",
            "delete_memory",
            "delete_user_memories",
            "batch_add",
        ] {
            assert!(endpoints.contains_key(key), "missing endpoint entry: {key}");
        }
    }
}
