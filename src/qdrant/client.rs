//! HTTP client wrapper for interacting with Qdrant.

use crate::qdrant::types::{
    QdrantError, QueryResponse, ScoredPoint, ScrollResponse, StoredPoint,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

/// Upper bound on points fetched per scroll page.
const SCROLL_PAGE_SIZE: usize = 256;

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantClient {
    /// Construct a new client for the given Qdrant instance.
    ///
    /// Connection attempts are bounded by a short timeout so an unreachable
    /// store fails fast during the startup probe instead of hanging the
    /// process.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder()
            .user_agent("memserve/1.0")
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create a collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }

        tracing::debug!(
            collection = collection_name,
            vector_size,
            "Creating collection"
        );
        self.create_collection(collection_name, vector_size).await
    }

    /// Create or update a collection with the specified vector size.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection ensured/created");
        })
        .await
    }

    /// Ensure the keyword index used for user scoping exists.
    pub async fn ensure_payload_indexes(&self, collection_name: &str) -> Result<(), QdrantError> {
        let body = json!({
            "field_name": "user_id",
            "field_schema": "keyword",
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}/index"))
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            tracing::debug!(collection = collection_name, "Payload index ensured");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Failed to ensure payload index");
            Err(error)
        }
    }

    /// Upload a single vector with its payload, waiting for the write to land.
    pub async fn upsert_point(
        &self,
        collection_name: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Value,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "points": [
                {
                    "id": id,
                    "vector": vector,
                    "payload": payload,
                }
            ]
        });

        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )
            .query(&[("wait", true)])
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, id, "Point upserted");
        })
        .await
    }

    /// Perform a similarity search against a collection, returning scored payloads.
    pub async fn query_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        filter: Value,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "filter": filter,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let results = payload
            .result
            .into_points()
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect();

        Ok(results)
    }

    /// Read up to `limit` points matching the filter, following scroll
    /// pagination as needed.
    pub async fn scroll_points(
        &self,
        collection_name: &str,
        filter: Value,
        limit: usize,
    ) -> Result<Vec<StoredPoint>, QdrantError> {
        let mut offset: Option<Value> = None;
        let mut results: Vec<StoredPoint> = Vec::new();
        if limit == 0 {
            return Ok(results);
        }

        loop {
            let page_size = (limit - results.len()).min(SCROLL_PAGE_SIZE);
            let mut body = json!({
                "with_payload": true,
                "with_vector": false,
                "limit": page_size,
                "filter": filter.clone(),
            });
            if let Some(cursor) = offset.clone() {
                body.as_object_mut()
                    .expect("scroll body should remain an object")
                    .insert("offset".into(), cursor);
            }

            let response = self
                .request(
                    Method::POST,
                    &format!("collections/{collection_name}/points/scroll"),
                )
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Failed to scroll points");
                return Err(error);
            }

            let ScrollResponse { result } = response.json().await?;
            let (points, next_page_offset) = result.into_page();
            for point in points {
                if let Some(id) = point.id {
                    results.push(StoredPoint {
                        id: stringify_point_id(id),
                        payload: point.payload,
                    });
                }
            }

            if results.len() >= limit {
                results.truncate(limit);
                break;
            }
            match next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(results)
    }

    /// Delete the given points, waiting for the write to land.
    pub async fn delete_points(
        &self,
        collection_name: &str,
        ids: &[String],
    ) -> Result<(), QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": ids }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, count = ids.len(), "Points deleted");
        })
        .await
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
