//! NATS JetStream binding for the ingestion consumer.
//!
//! The [`Batcher`](crate::batcher::Batcher) only sees the [`Delivery`] trait,
//! so tests drive it with in-process fakes instead of a live server.

use std::{
  future::Future,
  io::Write as _,
  path::{Path, PathBuf},
  time::Duration,
};

use async_nats::{
  Client, ConnectOptions,
  jetstream::{
    self, AckKind,
    consumer::{AckPolicy, PullConsumer, pull},
    stream,
  },
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use futures::{Stream, StreamExt as _};
use sift_core::BoxError;
use tempfile::NamedTempFile;

use crate::{BatchConfig, Error, QueueConfig, QueueError, Result};

/// JetStream's own default; raised further when one batch needs more.
const MIN_MAX_ACK_PENDING: i64 = 1000;

/// Headroom granted on top of the idle window before JetStream may redeliver
/// an unacknowledged message.
const ACK_WAIT_HEADROOM: Duration = Duration::from_secs(30);

// ─── Delivery ─────────────────────────────────────────────────────────────────

/// One message received from the queue, settled exactly once.
pub trait Delivery: Send + 'static {
  fn payload(&self) -> &[u8];

  /// Processing succeeded; the message is removed from the queue.
  fn ack(self) -> impl Future<Output = std::result::Result<(), BoxError>> + Send;

  /// Processing failed transiently; the message is redelivered.
  fn nack(self) -> impl Future<Output = std::result::Result<(), BoxError>> + Send;

  /// The payload can never be processed; the message is never redelivered.
  fn reject(self) -> impl Future<Output = std::result::Result<(), BoxError>> + Send;
}

pub struct JetStreamDelivery(jetstream::Message);

impl Delivery for JetStreamDelivery {
  fn payload(&self) -> &[u8] { &self.0.message.payload }

  async fn ack(self) -> std::result::Result<(), BoxError> { self.0.ack().await }

  async fn nack(self) -> std::result::Result<(), BoxError> {
    self.0.ack_with(AckKind::Nak(None)).await
  }

  async fn reject(self) -> std::result::Result<(), BoxError> {
    self.0.ack_with(AckKind::Term).await
  }
}

// ─── Connection ───────────────────────────────────────────────────────────────

/// A CA bundle the client can read from disk.
///
/// An inline certificate lives in a temp file that is removed when this is
/// dropped. The client rereads it on reconnect, so keep it for the life of
/// the connection.
#[derive(Debug)]
pub enum TrustRoot {
  Path(PathBuf),
  Inline(NamedTempFile),
}

impl TrustRoot {
  pub fn path(&self) -> &Path {
    match self {
      TrustRoot::Path(path) => path,
      TrustRoot::Inline(file) => file.path(),
    }
  }
}

/// Resolve the configured TLS trust root.
///
/// `tls_ca_path` wins over `tls_ca_cert`. An inline certificate is decoded
/// into a fresh temp file, since the client only accepts file paths.
pub fn trust_root(config: &QueueConfig) -> Result<Option<TrustRoot>> {
  if let Some(path) = &config.tls_ca_path {
    return Ok(Some(TrustRoot::Path(path.clone())));
  }
  let Some(encoded) = &config.tls_ca_cert else {
    return Ok(None);
  };

  let pem = B64
    .decode(encoded.trim())
    .map_err(|e| Error::Tls(format!("tls_ca_cert is not valid base64: {e}")))?;

  let mut file = tempfile::Builder::new()
    .prefix("sift-ca-")
    .suffix(".pem")
    .tempfile()
    .map_err(|e| Error::Tls(format!("failed to create CA file: {e}")))?;
  file
    .write_all(&pem)
    .map_err(|e| Error::Tls(format!("failed to write {:?}: {e}", file.path())))?;
  Ok(Some(TrustRoot::Inline(file)))
}

/// Open a client connection, trusting `ca` when given.
pub async fn connect(
  config: &QueueConfig,
  ca: Option<&Path>,
) -> std::result::Result<Client, QueueError> {
  let mut options = ConnectOptions::new().name("sift-indexer");
  if let Some(ca) = ca {
    options = options.add_root_certificates(ca.to_path_buf()).require_tls(true);
  }

  let client = options
    .connect(config.url.as_str())
    .await
    .map_err(|e| QueueError::new("connect", e))?;
  tracing::info!(url = %config.url, "connected to nats");
  Ok(client)
}

/// Ensure the stream and the durable pull consumer exist.
pub async fn subscribe(
  client: Client,
  config: &QueueConfig,
  batch: &BatchConfig,
) -> std::result::Result<PullConsumer, QueueError> {
  let js = jetstream::new(client);

  let stream = js
    .get_or_create_stream(stream::Config {
      name: config.stream.clone(),
      subjects: vec![config.subject.clone()],
      ..Default::default()
    })
    .await
    .map_err(|e| QueueError::new("create_stream", e))?;

  let consumer = stream
    .get_or_create_consumer(&config.consumer, pull::Config {
      durable_name: Some(config.consumer.clone()),
      ack_policy: AckPolicy::Explicit,
      max_ack_pending: max_ack_pending(batch),
      ack_wait: ack_wait(batch),
      ..Default::default()
    })
    .await
    .map_err(|e| QueueError::new("create_consumer", e))?;

  tracing::info!(
    stream = %config.stream,
    consumer = %config.consumer,
    "jetstream consumer ready"
  );
  Ok(consumer)
}

/// The consumer's messages as [`Delivery`] handles.
///
/// Transient stream errors are logged and skipped; the pull consumer keeps
/// fetching afterwards.
pub async fn deliveries(
  consumer: &PullConsumer,
) -> std::result::Result<impl Stream<Item = JetStreamDelivery> + Send + use<>, QueueError> {
  let messages = consumer
    .messages()
    .await
    .map_err(|e| QueueError::new("subscribe", e))?;

  Ok(messages.filter_map(|message| async move {
    match message {
      Ok(message) => Some(JetStreamDelivery(message)),
      Err(e) => {
        tracing::warn!(error = %e, "failed to receive message");
        None
      }
    }
  }))
}

fn max_ack_pending(batch: &BatchConfig) -> i64 {
  let batch = i64::try_from(batch.max_size).unwrap_or(i64::MAX);
  batch.saturating_mul(2).max(MIN_MAX_ACK_PENDING)
}

fn ack_wait(batch: &BatchConfig) -> Duration {
  Duration::from_millis(batch.idle_flush_ms) + ACK_WAIT_HEADROOM
}
