//! The `IndexStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `sift-store-sqlite`).
//! The ingestion consumer and the search API depend on this abstraction, not
//! on any concrete backend.

use std::{collections::HashMap, future::Future};

use serde::{Deserialize, Serialize};

use crate::{
  StoreError,
  page::{EdgeUpsert, Page, PageId, PageUpsert, RelevanceEdge, TermId},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// One row of [`IndexStore::ranked_search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPage {
  pub page_id: PageId,
  pub url:     String,
  pub title:   String,
  /// `Σ(tf × idf × relevance)` over the page's edges to the query terms.
  pub score:   f64,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
  pub pages: u64,
  pub terms: u64,
  pub edges: u64,
}

// ─── Write scope ─────────────────────────────────────────────────────────────

/// The upserts available inside one [`IndexStore::write`] scope.
///
/// Every method is idempotent: replaying the same input leaves the store in
/// the same state. Inputs are expected to be deduplicated by their key.
pub trait IndexTransaction {
  /// Insert unseen URLs and update `title` of existing ones.
  ///
  /// Returns the id of every input URL, including pre-existing ones.
  fn upsert_pages(
    &mut self,
    pages: &[PageUpsert],
  ) -> Result<HashMap<String, PageId>, StoreError>;

  /// Insert unseen words. Existing words are left untouched.
  ///
  /// Returns the id of every input word, including pre-existing ones.
  fn upsert_terms(
    &mut self,
    words: &[String],
  ) -> Result<HashMap<String, TermId>, StoreError>;

  /// Insert new edges and overwrite the numeric fields of existing ones.
  ///
  /// Returns the number of rows written.
  fn upsert_relevance_edges(
    &mut self,
    edges: &[EdgeUpsert],
  ) -> Result<usize, StoreError>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a sift index backend.
///
/// Writes only happen through [`IndexStore::write`], which runs a closure
/// against an [`IndexTransaction`] and commits it atomically. Concurrent
/// writers (other tasks or other processes) are reconciled by the backend's
/// unique constraints and conflict clauses, never by application locks.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait IndexStore: Send + Sync {
  /// Run `f` inside a single transaction.
  ///
  /// The transaction commits only if `f` returns `Ok`; otherwise every write
  /// made through the [`IndexTransaction`] is rolled back.
  fn write<F, T>(
    &self,
    f: F,
  ) -> impl Future<Output = Result<T, StoreError>> + Send + '_
  where
    F: FnOnce(&mut dyn IndexTransaction) -> Result<T, StoreError>
      + Send
      + 'static,
    T: Send + 'static;

  /// Pages with at least one edge to any of `terms`, ordered by aggregate
  /// score descending and truncated to `limit`. Ties keep page insertion
  /// order.
  fn ranked_search<'a>(
    &'a self,
    terms: &'a [String],
    limit: usize,
  ) -> impl Future<Output = Result<Vec<RankedPage>, StoreError>> + Send + 'a;

  /// The `k` words contributing most to `page_id`, strongest first.
  fn top_terms_for_page(
    &self,
    page_id: PageId,
    k: usize,
  ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send + '_;

  /// Look up a page by URL. Returns `None` if it was never ingested.
  fn get_page<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<Option<Page>, StoreError>> + Send + 'a;

  /// All edges of a page, ordered by term id.
  fn edges_for_page(
    &self,
    page_id: PageId,
  ) -> impl Future<Output = Result<Vec<RelevanceEdge>, StoreError>> + Send + '_;

  fn stats(&self) -> impl Future<Output = Result<IndexStats, StoreError>> + Send + '_;

  /// Round-trip to the backend; used by health checks.
  fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send + '_;
}
