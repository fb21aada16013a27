//! Reconciliation of an extraction batch into store upserts.
//!
//! A batch may mention the same page or the same word many times (a page
//! recrawled within one flush window, a word shared by many pages). The plan
//! collapses those repeats with last-write-wins semantics before anything
//! touches the store, then applies pages, terms and edges in that order
//! inside one [`IndexStore::write`] scope. Edges reference both pages and
//! terms by surrogate id, so the order is fixed.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::{
  StoreError,
  normalize::index_word,
  page::{EdgeUpsert, PageUpsert},
  record::ExtractionRecord,
  store::{IndexStore, IndexTransaction},
};

/// What one flush wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
  pub records: usize,
  pub pages:   usize,
  pub terms:   usize,
  pub edges:   usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Weights {
  term_frequency:             f64,
  relevance:                  f64,
  inverse_document_frequency: f64,
}

/// A deduplicated batch, ready to be applied to an [`IndexTransaction`].
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
  records: usize,
  /// url → title, first-appearance order, last title wins.
  pages:   IndexMap<String, String>,
  terms:   IndexSet<String>,
  /// (url, word) → weights, last occurrence wins.
  edges:   IndexMap<(String, String), Weights>,
}

impl ReconcilePlan {
  pub fn from_records(records: impl IntoIterator<Item = ExtractionRecord>) -> Self {
    let mut plan = Self::default();

    for record in records {
      plan.records += 1;
      plan.pages.insert(record.url.clone(), record.title);

      for (word, props) in record.keywords {
        let Some(word) = index_word(&word) else { continue };
        plan.terms.insert(word.clone());
        plan.edges.insert((record.url.clone(), word), Weights {
          term_frequency:             props.term_frequency,
          relevance:                  props.relevance,
          inverse_document_frequency: props.idf_or_default(),
        });
      }
    }

    plan
  }

  pub fn is_empty(&self) -> bool { self.records == 0 }

  pub fn summary(&self) -> ReconcileSummary {
    ReconcileSummary {
      records: self.records,
      pages:   self.pages.len(),
      terms:   self.terms.len(),
      edges:   self.edges.len(),
    }
  }

  /// Apply the plan: pages, then terms, then edges.
  pub fn apply(
    self,
    tx: &mut dyn IndexTransaction,
  ) -> Result<ReconcileSummary, StoreError> {
    let summary = self.summary();

    let pages: Vec<PageUpsert> = self
      .pages
      .into_iter()
      .map(|(url, title)| PageUpsert { url, title })
      .collect();
    let page_ids = tx.upsert_pages(&pages)?;

    let words: Vec<String> = self.terms.into_iter().collect();
    let term_ids = tx.upsert_terms(&words)?;

    let edges = self
      .edges
      .into_iter()
      .map(|((url, word), w)| {
        let page_id = *page_ids.get(&url).ok_or_else(|| {
          StoreError::new("upsert_relevance_edges", format!("no id resolved for page {url:?}"))
        })?;
        let term_id = *term_ids.get(&word).ok_or_else(|| {
          StoreError::new("upsert_relevance_edges", format!("no id resolved for term {word:?}"))
        })?;
        Ok(EdgeUpsert {
          page_id,
          term_id,
          term_frequency: w.term_frequency,
          relevance: w.relevance,
          inverse_document_frequency: w.inverse_document_frequency,
        })
      })
      .collect::<Result<Vec<_>, StoreError>>()?;
    tx.upsert_relevance_edges(&edges)?;

    Ok(summary)
  }
}

/// Commits extraction batches to an [`IndexStore`].
pub struct Reconciler<S> {
  store: Arc<S>,
}

impl<S> Clone for Reconciler<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: IndexStore> Reconciler<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Deduplicate `records` and commit them as one unit of work.
  ///
  /// Nothing is committed if any step fails. Because every upsert is
  /// idempotent the whole batch can simply be retried.
  pub async fn reconcile(
    &self,
    records: Vec<ExtractionRecord>,
  ) -> Result<ReconcileSummary, StoreError> {
    let plan = ReconcilePlan::from_records(records);
    if plan.is_empty() {
      return Ok(ReconcileSummary::default());
    }

    let summary = self.store.write(move |tx| plan.apply(tx)).await?;
    tracing::debug!(
      records = summary.records,
      pages = summary.pages,
      terms = summary.terms,
      edges = summary.edges,
      "batch reconciled"
    );
    Ok(summary)
  }
}
