//! Embedding client abstraction and the OpenAI adapter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider rejected the request or reported a failure.
    #[error("Embeddings API error ({status}): {body}")]
    Api {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider returned a different number of vectors than inputs.
    #[error("Embeddings API returned {actual} vectors for {expected} inputs")]
    MissingVectors {
        /// Number of input texts submitted.
        expected: usize,
        /// Number of vectors present in the response.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Client for the OpenAI embeddings API.
pub struct OpenAiEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddingClient {
    /// Construct a client against the given API base URL.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, EmbeddingError> {
        let client = Client::builder().user_agent("memserve/1.0").build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Deserialize)]
struct EmbeddingObject {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        tracing::debug!(model = %self.model, inputs = texts.len(), "Generating embeddings");

        let request = EmbeddingsRequest {
            model: &self.model,
            input: &texts,
        };
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = EmbeddingError::Api { status, body };
            tracing::error!(error = %error, "Embeddings request failed");
            return Err(error);
        }

        let payload: EmbeddingsResponse = response.json().await?;
        if payload.data.len() != texts.len() {
            return Err(EmbeddingError::MissingVectors {
                expected: texts.len(),
                actual: payload.data.len(),
            });
        }

        // The API does not guarantee response order.
        let mut data = payload.data;
        data.sort_by_key(|object| object.index);
        Ok(data.into_iter().map(|object| object.embedding).collect())
    }
}

/// Vector size produced by a given embedding model.
///
/// Unknown models fall back to 1536, the dimension of the small OpenAI
/// models this service is deployed with.
pub fn model_dimension(model: &str) -> u64 {
    match model {
        "text-embedding-3-large" => 3072,
        "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
        _ => 1536,
    }
}
