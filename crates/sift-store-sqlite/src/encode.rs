//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings.

use chrono::{DateTime, Utc};
use sift_core::page::Page;

use crate::{Error, Result};

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Raw values read directly from a `websites` row.
pub struct RawPage {
  pub id:         i64,
  pub url:        String,
  pub title:      String,
  pub indexed_at: String,
}

impl RawPage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      url:        row.get(1)?,
      title:      row.get(2)?,
      indexed_at: row.get(3)?,
    })
  }

  pub fn into_page(self) -> Result<Page> {
    Ok(Page {
      id:         self.id,
      url:        self.url,
      title:      self.title,
      indexed_at: decode_dt(&self.indexed_at)?,
    })
  }
}
