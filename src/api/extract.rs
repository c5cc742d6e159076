//! JSON extractor that validates request bodies before handlers run.

use crate::api::schemas::ErrorBody;
use axum::{
    Json, async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON extractor enforcing the schema bounds declared with `validator`.
///
/// Rejected bodies never reach a handler: malformed JSON propagates the
/// deserializer's status, and out-of-range fields return 400 with
/// per-field detail.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state).await.map_err(|err| {
            let status = err.status();
            let body = ErrorBody::new(err.body_text());
            (status, Json(body)).into_response()
        })?;

        data.validate().map_err(|errors| {
            let detail = serde_json::to_value(&errors).unwrap_or(serde_json::Value::Null);
            let body = ErrorBody {
                success: false,
                error: "Request validation failed".to_string(),
                detail: Some(detail),
            };
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        })?;

        Ok(Self(data))
    }
}
