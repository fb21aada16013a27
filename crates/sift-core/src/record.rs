//! Extraction records: the unit of work produced by the crawler.
//!
//! One record arrives per queue delivery:
//!
//! ```json
//! { "url": "https://example.com", "title": "Example",
//!   "keywords": { "example": { "term_frequency": 0.2, "relevance": 0.8 } } }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// IDF assigned to an edge when the producer does not supply one.
pub const DEFAULT_INVERSE_DOCUMENT_FREQUENCY: f64 = 0.01;

/// Producer-supplied weights for one word on one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeywordProperties {
  pub term_frequency:             f64,
  pub relevance:                  f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub inverse_document_frequency: Option<f64>,
}

impl KeywordProperties {
  pub fn idf_or_default(&self) -> f64 {
    self
      .inverse_document_frequency
      .unwrap_or(DEFAULT_INVERSE_DOCUMENT_FREQUENCY)
  }

  /// This keyword's share of the page score, multiplied in the same order
  /// the store ranks with.
  pub fn contribution(&self) -> f64 {
    self.term_frequency * self.idf_or_default() * self.relevance
  }
}

/// A page together with the keywords extracted from it.
///
/// Keywords keep the order in which the producer serialised them so that new
/// terms receive ids in a stable order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
  pub url:      String,
  pub title:    String,
  pub keywords: IndexMap<String, KeywordProperties>,
}

impl ExtractionRecord {
  /// Parse and validate a raw queue payload.
  ///
  /// Any failure is [`Error::Malformed`].
  pub fn from_slice(payload: &[u8]) -> Result<Self> {
    let record: Self = serde_json::from_slice(payload)
      .map_err(|e| Error::Malformed(e.to_string()))?;
    record.validate()?;
    Ok(record)
  }

  fn validate(&self) -> Result<()> {
    if self.url.trim().is_empty() {
      return Err(Error::Malformed("url must not be empty".into()));
    }

    for (word, props) in &self.keywords {
      let weights = [
        ("term_frequency", Some(props.term_frequency)),
        ("relevance", Some(props.relevance)),
        ("inverse_document_frequency", props.inverse_document_frequency),
      ];
      for (field, value) in weights {
        if let Some(v) = value
          && !(v.is_finite() && v >= 0.0)
        {
          return Err(Error::Malformed(format!(
            "keyword {word:?}: {field} must be a non-negative number, got {v}"
          )));
        }
      }

      let contribution = props.contribution();
      if !contribution.is_finite() {
        return Err(Error::Malformed(format!(
          "keyword {word:?}: tf × idf × relevance overflows to {contribution}"
        )));
      }
    }

    Ok(())
  }
}
