//! Error types for `sift-core`.

use thiserror::Error;

/// A boxed, thread-safe error used as the cause of a [`StoreError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failed store operation.
///
/// `operation` names the step that failed (`"upsert_pages"`,
/// `"ranked_search"`, `"commit"`, ...). The caller decides whether to retry.
#[derive(Debug, Error)]
#[error("{operation} failed: {source}")]
pub struct StoreError {
  pub operation: &'static str,
  #[source]
  pub source:    BoxError,
}

impl StoreError {
  pub fn new(operation: &'static str, source: impl Into<BoxError>) -> Self {
    Self { operation, source: source.into() }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// A payload that can never be ingested. Poison messages are rejected
  /// permanently and never redelivered.
  #[error("malformed extraction record: {0}")]
  Malformed(String),

  #[error("query contains no searchable terms")]
  EmptyQuery,

  #[error(transparent)]
  Store(#[from] StoreError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
