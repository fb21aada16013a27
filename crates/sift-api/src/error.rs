//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use sift_core::StoreError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("search failed: {0}")]
  SearchFailed(#[source] StoreError),
}

impl From<sift_core::Error> for ApiError {
  fn from(err: sift_core::Error) -> Self {
    match err {
      sift_core::Error::EmptyQuery => {
        ApiError::BadRequest("query contains no searchable terms".to_owned())
      }
      sift_core::Error::Malformed(m) => ApiError::BadRequest(m),
      sift_core::Error::Store(e) => ApiError::SearchFailed(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::SearchFailed(e) => {
        tracing::error!(error = %e, "search failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
