//! Persisted entities of the index: pages, terms and the relevance edges
//! between them.
//!
//! Surrogate ids are assigned by the store on first insert and never change.
//! Business keys (`url` for pages, `word` for terms) are unique.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PageId = i64;
pub type TermId = i64;

/// A crawled web page, stored as a `websites` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
  pub id:         PageId,
  pub url:        String,
  /// Last-write-wins; every re-ingestion of `url` overwrites it.
  pub title:      String,
  pub indexed_at: DateTime<Utc>,
}

/// Input row for [`IndexTransaction::upsert_pages`](crate::store::IndexTransaction::upsert_pages).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUpsert {
  pub url:   String,
  pub title: String,
}

/// A normalized index term, stored as a `keywords` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
  pub id:   TermId,
  pub word: String,
}

/// The weighted association between one page and one term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceEdge {
  pub page_id:                    PageId,
  pub term_id:                    TermId,
  pub word:                       String,
  pub term_frequency:             f64,
  pub relevance:                  f64,
  pub inverse_document_frequency: f64,
}

/// Input row for [`IndexTransaction::upsert_relevance_edges`](crate::store::IndexTransaction::upsert_relevance_edges).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeUpsert {
  pub page_id:                    PageId,
  pub term_id:                    TermId,
  pub term_frequency:             f64,
  pub relevance:                  f64,
  pub inverse_document_frequency: f64,
}
