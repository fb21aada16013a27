//! Process wiring for sift: configuration, queue binding and the Batcher.
//!
//! The `sift` binary in this crate runs the ingestion consumer, the search
//! API, or both (see `--role`). Everything here is plumbing around the pure
//! pieces in `sift-core`.

pub mod batcher;
pub mod bootstrap;
pub mod error;
pub mod queue;
pub mod supervise;

pub use error::{Error, QueueError, Result};

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;
use sift_core::normalize::{Lookup, NormalizeOptions, QueryNormalizer};

use batcher::BatchPolicy;
use bootstrap::RetryPolicy;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `sift.toml` and `SIFT__*`
/// environment variables. Every section and field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
  pub store:     StoreConfig,
  pub queue:     QueueConfig,
  pub batch:     BatchConfig,
  pub search:    SearchConfig,
  pub indexer:   IndexerConfig,
  pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub path: PathBuf,
}

impl Default for StoreConfig {
  fn default() -> Self { Self { path: PathBuf::from("sift.db") } }
}

impl StoreConfig {
  /// `path` with a leading `~` expanded to the user's home directory.
  pub fn resolved_path(&self) -> PathBuf {
    let s = self.path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
      && let Ok(home) = std::env::var("HOME")
    {
      return PathBuf::from(home).join(rest);
    }
    self.path.clone()
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
  pub url:         String,
  pub stream:      String,
  pub subject:     String,
  /// Durable consumer name; shared by every indexer process.
  pub consumer:    String,
  /// PEM trust root file for TLS connections.
  pub tls_ca_path: Option<PathBuf>,
  /// Base64-encoded PEM trust root, used when `tls_ca_path` is unset.
  pub tls_ca_cert: Option<String>,
}

impl Default for QueueConfig {
  fn default() -> Self {
    Self {
      url:         "nats://localhost:4222".to_string(),
      stream:      "scraped_items".to_string(),
      subject:     "scraped_items".to_string(),
      consumer:    "sift-indexer".to_string(),
      tls_ca_path: None,
      tls_ca_cert: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
  pub max_size:      usize,
  pub idle_flush_ms: u64,
}

impl Default for BatchConfig {
  fn default() -> Self { Self { max_size: 100, idle_flush_ms: 5000 } }
}

impl BatchConfig {
  pub fn policy(&self) -> BatchPolicy {
    BatchPolicy {
      max_size:   self.max_size,
      idle_flush: Duration::from_millis(self.idle_flush_ms),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
  pub host:             String,
  pub port:             u16,
  pub result_limit:     usize,
  pub preview_terms:    usize,
  /// JSON object of `word -> lemma`.
  pub lemmatize_path:   Option<PathBuf>,
  /// JSON object of `word -> replacement`, applied after lemmatization.
  pub transforms_path:  Option<PathBuf>,
  pub drop_empty_terms: bool,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      host:             "0.0.0.0".to_string(),
      port:             3001,
      result_limit:     sift_core::rank::DEFAULT_RESULT_LIMIT,
      preview_terms:    sift_core::rank::DEFAULT_PREVIEW_TERMS,
      lemmatize_path:   None,
      transforms_path:  None,
      drop_empty_terms: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
  /// Port of the `/healthz` listener when only the indexer role runs.
  pub health_port: u16,
}

impl Default for IndexerConfig {
  fn default() -> Self { Self { health_port: 3000 } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
  pub max_attempts: u32,
  pub backoff_ms:   u64,
}

impl Default for BootstrapConfig {
  fn default() -> Self { Self { max_attempts: 10, backoff_ms: 2000 } }
}

impl BootstrapConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.max_attempts,
      backoff:      Duration::from_millis(self.backoff_ms),
    }
  }
}

impl SiftConfig {
  /// Reject values the pipeline cannot run with.
  pub fn validate(&self) -> Result<()> {
    let checks = [
      (self.batch.max_size >= 1, "batch.max_size must be at least 1"),
      (self.batch.idle_flush_ms >= 1, "batch.idle_flush_ms must be at least 1"),
      (self.search.result_limit >= 1, "search.result_limit must be at least 1"),
      (self.bootstrap.max_attempts >= 1, "bootstrap.max_attempts must be at least 1"),
    ];
    match checks.into_iter().find(|(ok, _)| !ok) {
      Some((_, message)) => Err(Error::Config(message.to_string())),
      None => Ok(()),
    }
  }
}

// ─── Lookup tables ────────────────────────────────────────────────────────────

/// Read a `{"word": "replacement"}` JSON object from `path`.
pub async fn load_lookup(path: &Path) -> Result<Lookup> {
  let lookup_err = |source: sift_core::BoxError| Error::Lookup {
    path: path.to_path_buf(),
    source,
  };

  let bytes = tokio::fs::read(path).await.map_err(|e| lookup_err(e.into()))?;
  serde_json::from_slice(&bytes).map_err(|e| lookup_err(e.into()))
}

/// Build the query normalizer described by `config`, loading its tables.
pub async fn build_normalizer(config: &SearchConfig) -> Result<QueryNormalizer> {
  let lemmas = match &config.lemmatize_path {
    Some(path) => load_lookup(path).await?,
    None => Lookup::new(),
  };
  let transforms = match &config.transforms_path {
    Some(path) => load_lookup(path).await?,
    None => Lookup::new(),
  };

  tracing::info!(
    lemmas = lemmas.len(),
    transforms = transforms.len(),
    "loaded normalization tables"
  );

  let options = NormalizeOptions {
    drop_empty: config.drop_empty_terms,
    ..NormalizeOptions::default()
  };
  Ok(QueryNormalizer::new(lemmas, transforms).with_options(options))
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  fn parse(toml: &str) -> SiftConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_yields_defaults() {
    let cfg = parse("");
    assert_eq!(cfg.store.path, PathBuf::from("sift.db"));
    assert_eq!(cfg.queue.stream, "scraped_items");
    assert_eq!(cfg.batch.max_size, 100);
    assert_eq!(cfg.batch.idle_flush_ms, 5000);
    assert_eq!(cfg.search.port, 3001);
    assert_eq!(cfg.search.result_limit, 20);
    assert_eq!(cfg.indexer.health_port, 3000);
    assert_eq!(cfg.bootstrap.max_attempts, 10);
    assert!(cfg.search.drop_empty_terms);
    assert!(cfg.validate().is_ok());
  }

  #[test]
  fn partial_sections_keep_remaining_defaults() {
    let cfg = parse(
      r#"
      [batch]
      max_size = 3

      [queue]
      tls_ca_path = "/etc/ssl/ca.pem"
      "#,
    );
    assert_eq!(cfg.batch.max_size, 3);
    assert_eq!(cfg.batch.idle_flush_ms, 5000);
    assert_eq!(cfg.queue.tls_ca_path, Some(PathBuf::from("/etc/ssl/ca.pem")));
    assert_eq!(cfg.queue.url, "nats://localhost:4222");
    assert_eq!(cfg.batch.policy().idle_flush, Duration::from_secs(5));
  }

  #[test]
  fn zero_batch_size_is_rejected() {
    let cfg = parse("[batch]\nmax_size = 0\n");
    let err = cfg.validate().unwrap_err();
    assert!(matches!(err, Error::Config(ref m) if m.contains("batch.max_size")));
  }

  #[test]
  fn zero_bootstrap_attempts_is_rejected() {
    let cfg = parse("[bootstrap]\nmax_attempts = 0\n");
    assert!(matches!(cfg.validate(), Err(Error::Config(_))));
  }

  #[tokio::test]
  async fn lookup_tables_load_from_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"running": "run", "geese": "goose"}}"#).unwrap();

    let lookup = load_lookup(file.path()).await.unwrap();
    assert_eq!(lookup.len(), 2);
    assert_eq!(lookup["running"], "run");
  }

  #[tokio::test]
  async fn missing_lookup_file_names_the_path() {
    let err = load_lookup(Path::new("/nonexistent/lemmas.json"))
      .await
      .unwrap_err();
    match err {
      Error::Lookup { path, .. } => {
        assert_eq!(path, PathBuf::from("/nonexistent/lemmas.json"));
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn normalizer_uses_configured_tables_and_options() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"running": "run"}}"#).unwrap();

    let config = SearchConfig {
      lemmatize_path: Some(file.path().to_path_buf()),
      drop_empty_terms: false,
      ..SearchConfig::default()
    };
    let normalizer = build_normalizer(&config).await.unwrap();
    assert_eq!(normalizer.normalize("Running ???"), vec!["run", ""]);
  }
}
