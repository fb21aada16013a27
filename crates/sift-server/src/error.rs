//! Error types for the indexer and search processes.

use std::{io, path::PathBuf};

use sift_core::BoxError;
use thiserror::Error;

/// A failed interaction with the message queue.
#[derive(Debug, Error)]
#[error("queue {operation} failed: {source}")]
pub struct QueueError {
  pub operation: &'static str,
  #[source]
  pub source:    BoxError,
}

impl QueueError {
  pub fn new(operation: &'static str, source: impl Into<BoxError>) -> Self {
    Self { operation, source: source.into() }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// A dependency could not be reached at startup. Fatal.
  #[error("could not connect to {target} after {attempts} attempts: {source}")]
  Bootstrap {
    target:   &'static str,
    attempts: u32,
    #[source]
    source:   BoxError,
  },

  #[error(transparent)]
  Queue(#[from] QueueError),

  #[error("failed to load lookup table {path:?}: {source}")]
  Lookup {
    path:   PathBuf,
    #[source]
    source: BoxError,
  },

  #[error("tls: {0}")]
  Tls(String),

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error("failed to listen for the shutdown signal: {0}")]
  Signal(#[source] io::Error),

  #[error("http server failed: {0}")]
  Http(#[source] io::Error),

  /// A long-running task returned before shutdown was requested.
  #[error("{0} exited before shutdown")]
  TaskExited(&'static str),

  #[error("{task} task failed: {source}")]
  TaskFailed {
    task:   &'static str,
    #[source]
    source: tokio::task::JoinError,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
