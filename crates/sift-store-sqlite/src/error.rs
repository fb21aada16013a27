//! Error type for `sift-store-sqlite`.
//!
//! Trait methods of [`sift_core::store::IndexStore`] report failures as
//! [`sift_core::StoreError`]; this type covers opening the store and decoding
//! rows, and becomes the cause of a `StoreError` where needed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
