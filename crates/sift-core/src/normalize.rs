//! Query normalization: free text in, index terms out.
//!
//! Steps, in order, each switchable through [`NormalizeOptions`]:
//!
//! 1. lowercase, then split on whitespace;
//! 2. trim each token and its trailing possessive characters;
//! 3. drop every character outside `[a-z0-9]`;
//! 4. lemmatization lookup;
//! 5. synonym/transform lookup (applied to the lemmatized token);
//! 6. drop tokens left empty.

use std::collections::HashMap;

/// A `word -> canonical word` table.
pub type Lookup = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
  pub lowercase:              bool,
  /// Strip trailing `'` and `s` characters (`dogs'` → `dog`).
  pub trim_possessive:        bool,
  pub strip_non_alphanumeric: bool,
  pub lemmatize:              bool,
  pub transform:              bool,
  /// Drop tokens that end up empty instead of searching for `""`.
  pub drop_empty:             bool,
}

impl Default for NormalizeOptions {
  fn default() -> Self {
    Self {
      lowercase:              true,
      trim_possessive:        true,
      strip_non_alphanumeric: true,
      lemmatize:              true,
      transform:              true,
      drop_empty:             true,
    }
  }
}

/// Normalizes raw queries against injected lemma and transform tables.
#[derive(Debug, Clone, Default)]
pub struct QueryNormalizer {
  options:    NormalizeOptions,
  lemmas:     Lookup,
  transforms: Lookup,
}

impl QueryNormalizer {
  pub fn new(lemmas: Lookup, transforms: Lookup) -> Self {
    Self { options: NormalizeOptions::default(), lemmas, transforms }
  }

  pub fn with_options(mut self, options: NormalizeOptions) -> Self {
    self.options = options;
    self
  }

  /// Turn `query` into an ordered list of terms. Duplicates are kept.
  pub fn normalize(&self, query: &str) -> Vec<String> {
    let query = if self.options.lowercase {
      query.to_lowercase()
    } else {
      query.to_owned()
    };

    query
      .split_whitespace()
      .map(|token| self.normalize_token(token))
      .filter(|term| !(self.options.drop_empty && term.is_empty()))
      .collect()
  }

  fn normalize_token(&self, token: &str) -> String {
    let mut token = token.trim();
    if self.options.trim_possessive {
      token = token.trim_end_matches(['\'', 's']);
    }

    let mut term: String = if self.options.strip_non_alphanumeric {
      token
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
    } else {
      token.to_owned()
    };

    if self.options.lemmatize
      && let Some(lemma) = self.lemmas.get(&term)
    {
      term = lemma.clone();
    }
    if self.options.transform
      && let Some(replacement) = self.transforms.get(&term)
    {
      term = replacement.clone();
    }

    term
  }
}

/// Canonical form of a producer-supplied keyword: trimmed and lowercased.
///
/// Returns `None` for words that are blank.
pub fn index_word(word: &str) -> Option<String> {
  let word = word.trim();
  if word.is_empty() {
    None
  } else {
    Some(word.to_lowercase())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn table(pairs: &[(&str, &str)]) -> Lookup {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn possessive_punctuation_and_lemma() {
    let n = QueryNormalizer::new(table(&[("running", "run")]), Lookup::new());
    assert_eq!(n.normalize("Dogs' Running!!"), vec!["dog", "run"]);
  }

  #[test]
  fn transform_applies_after_lemma() {
    let n = QueryNormalizer::new(
      table(&[("cars", "car")]),
      table(&[("car", "automobile")]),
    );
    // "cars" loses its trailing `s` first, so the lemma table is not hit but
    // the transform table is.
    assert_eq!(n.normalize("cars"), vec!["automobile"]);

    let n = QueryNormalizer::new(
      table(&[("geese", "goose")]),
      table(&[("goose", "bird")]),
    );
    let opts = NormalizeOptions { trim_possessive: false, ..Default::default() };
    assert_eq!(n.with_options(opts).normalize("GEESE"), vec!["bird"]);
  }

  #[test]
  fn strips_non_alphanumeric_and_keeps_digits() {
    let n = QueryNormalizer::default();
    assert_eq!(n.normalize("  C++ v2.0 \t rust-lang "), vec!["c", "v20", "rustlang"]);
  }

  #[test]
  fn empty_tokens_are_dropped_by_default() {
    let n = QueryNormalizer::default();
    assert_eq!(n.normalize("hello !!! world"), vec!["hello", "world"]);
    assert!(n.normalize("''' ???").is_empty());
  }

  #[test]
  fn empty_tokens_are_kept_when_configured() {
    let opts = NormalizeOptions { drop_empty: false, ..Default::default() };
    let n = QueryNormalizer::default().with_options(opts);
    assert_eq!(n.normalize("hello !!!"), vec!["hello", ""]);
  }

  #[test]
  fn duplicates_are_preserved_in_order() {
    let n = QueryNormalizer::default();
    assert_eq!(n.normalize("foo bar foo"), vec!["foo", "bar", "foo"]);
  }

  #[test]
  fn steps_can_be_disabled() {
    let opts = NormalizeOptions {
      lowercase:              false,
      trim_possessive:        false,
      strip_non_alphanumeric: false,
      lemmatize:              false,
      transform:              false,
      drop_empty:             true,
    };
    let n = QueryNormalizer::new(table(&[("Dogs'", "x")]), Lookup::new())
      .with_options(opts);
    assert_eq!(n.normalize("Dogs' Running!!"), vec!["Dogs'", "Running!!"]);
  }

  #[test]
  fn index_word_trims_and_lowercases() {
    assert_eq!(index_word("  Rust "), Some("rust".to_string()));
    assert_eq!(index_word("   "), None);
  }
}
