//! Ranked keyword search over an [`IndexStore`].

use std::{sync::Arc, time::Instant};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  normalize::QueryNormalizer,
  store::IndexStore,
};

pub const DEFAULT_RESULT_LIMIT: usize = 20;
pub const DEFAULT_PREVIEW_TERMS: usize = 5;

/// One ranked page with a preview of its strongest keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
  pub url:      String,
  pub title:    String,
  pub score:    f64,
  pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
  pub results:    Vec<SearchHit>,
  /// Wall-clock time of the whole search, e.g. `"0.001234s"`.
  pub query_time: String,
  /// Number of returned results; never exceeds the result limit.
  pub total_hits: usize,
}

/// Normalizes queries and ranks pages for them.
pub struct Searcher<S> {
  store:         Arc<S>,
  normalizer:    QueryNormalizer,
  result_limit:  usize,
  preview_terms: usize,
}

impl<S: IndexStore> Searcher<S> {
  pub fn new(store: Arc<S>, normalizer: QueryNormalizer) -> Self {
    Self {
      store,
      normalizer,
      result_limit: DEFAULT_RESULT_LIMIT,
      preview_terms: DEFAULT_PREVIEW_TERMS,
    }
  }

  pub fn with_limits(mut self, result_limit: usize, preview_terms: usize) -> Self {
    self.result_limit = result_limit;
    self.preview_terms = preview_terms;
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Search for `query`.
  ///
  /// Fails with [`Error::EmptyQuery`] if normalization leaves no terms, and
  /// with [`Error::Store`] if any store call fails; partial rankings are
  /// never returned.
  pub async fn search(&self, query: &str) -> Result<SearchResponse> {
    let start = Instant::now();

    let terms = self.normalizer.normalize(query);
    if terms.is_empty() {
      return Err(Error::EmptyQuery);
    }

    let ranked = self.store.ranked_search(&terms, self.result_limit).await?;

    let mut results = Vec::with_capacity(ranked.len());
    for page in ranked {
      let keywords = self
        .store
        .top_terms_for_page(page.page_id, self.preview_terms)
        .await?;
      results.push(SearchHit {
        url: page.url,
        title: page.title,
        score: page.score,
        keywords,
      });
    }

    let elapsed = start.elapsed();
    let total_hits = results.len();
    tracing::debug!(
      terms = terms.len(),
      hits = total_hits,
      elapsed_ms = elapsed.as_millis() as u64,
      "search complete"
    );

    Ok(SearchResponse {
      results,
      query_time: format!("{:.6}s", elapsed.as_secs_f64()),
      total_hits,
    })
  }
}
