//! Handler for `GET /search`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use sift_core::{
  rank::{SearchResponse, Searcher},
  store::IndexStore,
};

use crate::error::ApiError;

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  /// Free-text query.
  pub q: Option<String>,
}

/// `GET /search?q=...`
pub async fn handler<S>(
  State(searcher): State<Arc<Searcher<S>>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError>
where
  S: IndexStore,
{
  let query = params
    .q
    .filter(|q| !q.trim().is_empty())
    .ok_or_else(|| ApiError::BadRequest("missing query parameter `q`".to_owned()))?;

  let response = searcher.search(&query).await?;
  Ok(Json(response))
}
