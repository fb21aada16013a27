//! Startup retry for the queue and the store.
//!
//! Dependencies (the NATS server, a freshly mounted volume) are often still
//! coming up when the process starts. Connections are retried a bounded number
//! of times with a fixed backoff; exhausting the budget is fatal.

use std::{future::Future, time::Duration};

use sift_core::BoxError;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub backoff:      Duration,
}

/// Call `connect` until it succeeds or `policy.max_attempts` is reached.
///
/// `target` names the dependency in logs and in [`Error::Bootstrap`].
pub async fn connect_with_retry<T, E, F, Fut>(
  target: &'static str,
  policy: RetryPolicy,
  mut connect: F,
) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = std::result::Result<T, E>>,
  E: Into<BoxError>,
{
  let max_attempts = policy.max_attempts.max(1);
  let mut attempt = 1;

  loop {
    match connect().await {
      Ok(value) => {
        if attempt > 1 {
          tracing::info!(dependency = target, attempt, "connected");
        }
        return Ok(value);
      }
      Err(e) => {
        let source: BoxError = e.into();
        if attempt >= max_attempts {
          return Err(Error::Bootstrap { target, attempts: attempt, source });
        }
        tracing::warn!(
          dependency = target,
          attempt,
          max_attempts,
          error = %source,
          "connection failed; retrying in {:?}",
          policy.backoff
        );
        tokio::time::sleep(policy.backoff).await;
        attempt += 1;
      }
    }
  }
}
