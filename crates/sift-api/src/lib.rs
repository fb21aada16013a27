//! JSON search API for sift.
//!
//! Exposes axum [`Router`]s backed by any [`sift_core::store::IndexStore`].
//! Binding, TLS and process lifecycle are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = sift_api::api_router(Arc::new(searcher));
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod health;
pub mod search;

use std::sync::Arc;

use axum::{Router, http::Method, routing::get};
use sift_core::{rank::Searcher, store::IndexStore};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

pub use error::ApiError;

/// Build the full read-side router: `GET /search` and `GET /healthz`.
///
/// The returned `Router<()>` can be served directly or nested into a parent
/// router regardless of its state type.
pub fn api_router<S>(searcher: Arc<Searcher<S>>) -> Router<()>
where
  S: IndexStore + 'static,
{
  let store = Arc::clone(searcher.store());

  Router::new()
    .route("/search", get(search::handler::<S>))
    .with_state(searcher)
    .merge(health_routes(store))
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]),
    )
    .layer(TraceLayer::new_for_http())
}

/// Build a router exposing only `GET /healthz`, for processes that index
/// but do not serve search.
pub fn health_router<S>(store: Arc<S>) -> Router<()>
where
  S: IndexStore + 'static,
{
  health_routes(store).layer(TraceLayer::new_for_http())
}

fn health_routes<S>(store: Arc<S>) -> Router<()>
where
  S: IndexStore + 'static,
{
  Router::new()
    .route("/healthz", get(health::handler::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests;
