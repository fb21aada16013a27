use std::{collections::HashMap, sync::Arc};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use serde_json::Value;
use sift_core::{
  StoreError,
  normalize::{Lookup, QueryNormalizer},
  page::{Page, PageId, RelevanceEdge},
  rank::{SearchResponse, Searcher},
  reconcile::Reconciler,
  record::ExtractionRecord,
  store::{IndexStats, IndexStore, IndexTransaction, RankedPage},
};
use sift_store_sqlite::SqliteStore;
use tower::ServiceExt as _;

use crate::{api_router, health_router};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn record(json: &str) -> ExtractionRecord {
  ExtractionRecord::from_slice(json.as_bytes()).unwrap()
}

async fn seeded_store() -> Arc<SqliteStore> {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  Reconciler::new(Arc::clone(&store))
    .reconcile(vec![
      record(
        r#"{"url":"https://dogs.example","title":"Dogs",
            "keywords":{
              "dog":{"term_frequency":0.5,"relevance":1.0,"inverse_document_frequency":2.0},
              "run":{"term_frequency":0.2,"relevance":1.0,"inverse_document_frequency":1.0}}}"#,
      ),
      record(
        r#"{"url":"https://cats.example","title":"Cats",
            "keywords":{
              "cat":{"term_frequency":0.9,"relevance":1.0,"inverse_document_frequency":1.0}}}"#,
      ),
    ])
    .await
    .unwrap();
  store
}

fn searcher<S: IndexStore>(store: Arc<S>) -> Arc<Searcher<S>> {
  let lemmas: Lookup = HashMap::from([("running".to_owned(), "run".to_owned())]);
  Arc::new(Searcher::new(store, QueryNormalizer::new(lemmas, Lookup::new())))
}

async fn get(app: Router, uri: &str) -> Response {
  let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
  app.oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

/// A backend whose every call fails.
struct OfflineStore;

fn offline(operation: &'static str) -> StoreError {
  StoreError::new(operation, "database is offline")
}

impl IndexStore for OfflineStore {
  async fn write<F, T>(&self, _f: F) -> Result<T, StoreError>
  where
    F: FnOnce(&mut dyn IndexTransaction) -> Result<T, StoreError>
      + Send
      + 'static,
    T: Send + 'static,
  {
    Err(offline("begin"))
  }

  async fn ranked_search(
    &self,
    _terms: &[String],
    _limit: usize,
  ) -> Result<Vec<RankedPage>, StoreError> {
    Err(offline("ranked_search"))
  }

  async fn top_terms_for_page(
    &self,
    _page_id: PageId,
    _k: usize,
  ) -> Result<Vec<String>, StoreError> {
    Err(offline("top_terms_for_page"))
  }

  async fn get_page(&self, _url: &str) -> Result<Option<Page>, StoreError> {
    Err(offline("get_page"))
  }

  async fn edges_for_page(
    &self,
    _page_id: PageId,
  ) -> Result<Vec<RelevanceEdge>, StoreError> {
    Err(offline("edges_for_page"))
  }

  async fn stats(&self) -> Result<IndexStats, StoreError> { Err(offline("stats")) }

  async fn ping(&self) -> Result<(), StoreError> { Err(offline("ping")) }
}

// ─── /search ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_ranks_and_previews() {
  let app = api_router(searcher(seeded_store().await));
  let resp = get(app, "/search?q=Dogs%27%20Running").await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body: SearchResponse = serde_json::from_value(json_body(resp).await).unwrap();
  assert_eq!(body.total_hits, 1);
  assert_eq!(body.results.len(), 1);
  let hit = &body.results[0];
  assert_eq!(hit.url, "https://dogs.example");
  assert_eq!(hit.title, "Dogs");
  assert!((hit.score - 1.2).abs() < 1e-9, "score: {}", hit.score);
  assert_eq!(hit.keywords, vec!["dog", "run"]);
  assert!(body.query_time.ends_with('s'));
}

#[tokio::test]
async fn search_without_matches_is_empty_ok() {
  let app = api_router(searcher(seeded_store().await));
  let resp = get(app, "/search?q=parrot").await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body = json_body(resp).await;
  assert_eq!(body["total_hits"], 0);
  assert_eq!(body["results"], Value::Array(vec![]));
}

#[tokio::test]
async fn missing_or_blank_query_is_bad_request() {
  let store = seeded_store().await;
  for uri in ["/search", "/search?q=", "/search?q=%20%20"] {
    let resp = get(api_router(searcher(Arc::clone(&store))), uri).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "uri: {uri}");
    assert!(json_body(resp).await["error"].is_string());
  }
}

#[tokio::test]
async fn query_that_normalizes_to_nothing_is_bad_request() {
  let app = api_router(searcher(seeded_store().await));
  let resp = get(app, "/search?q=%21%21%21%20%3F%3F").await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let body = json_body(resp).await;
  assert_eq!(body["error"], "query contains no searchable terms");
}

#[tokio::test]
async fn store_failure_is_internal_error() {
  let app = api_router(searcher(Arc::new(OfflineStore)));
  let resp = get(app, "/search?q=dog").await;
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

  let body = json_body(resp).await;
  let message = body["error"].as_str().unwrap();
  assert!(message.starts_with("search failed: "), "error: {message}");
}

#[tokio::test]
async fn cors_allows_any_origin() {
  let app = api_router(searcher(seeded_store().await));
  let req = Request::builder()
    .uri("/search?q=dog")
    .header(header::ORIGIN, "https://somewhere.example")
    .body(Body::empty())
    .unwrap();
  let resp = app.oneshot(req).await.unwrap();

  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(
    resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
    "*"
  );
}

// ─── /healthz ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn healthz_reports_ok() {
  let app = api_router(searcher(seeded_store().await));
  let resp = get(app, "/healthz").await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn healthz_reports_unavailable_store() {
  let resp = get(health_router(Arc::new(OfflineStore)), "/healthz").await;
  assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(json_body(resp).await["status"], "unavailable");
}

#[tokio::test]
async fn health_router_does_not_serve_search() {
  let app = health_router(seeded_store().await);
  assert_eq!(get(app.clone(), "/healthz").await.status(), StatusCode::OK);
  assert_eq!(get(app, "/search?q=dog").await.status(), StatusCode::NOT_FOUND);
}
