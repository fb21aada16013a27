//! Handler for `GET /healthz`.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use sift_core::store::IndexStore;

/// `200 {"status":"ok"}` if the store answers a ping, `503` otherwise.
pub async fn handler<S>(State(store): State<Arc<S>>) -> (StatusCode, Json<Value>)
where
  S: IndexStore,
{
  match store.ping().await {
    Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
    Err(e) => {
      tracing::warn!(error = %e, "health check failed");
      (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "unavailable" })))
    }
  }
}
