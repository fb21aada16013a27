//! Process lifetime: run until told to stop, then drain the consumer.

use std::{future::Future, io};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result, batcher::BatcherStats};

/// Wait for `stop`, the HTTP task or the consumer, whichever finishes first.
///
/// Whatever the cause, `shutdown` is then cancelled, `http` is aborted and the
/// consumer is awaited so it settles every handle it holds. An HTTP failure
/// or a consumer that stopped on its own is returned only after that drain.
pub async fn supervise<F>(
  stop: F,
  shutdown: CancellationToken,
  mut http: JoinHandle<io::Result<()>>,
  mut consumer: Option<JoinHandle<BatcherStats>>,
) -> Result<()>
where
  F: Future<Output = io::Result<()>>,
{
  let consumer_exit = async {
    match &mut consumer {
      Some(handle) => handle.await,
      None => std::future::pending().await,
    }
  };

  let mut joined = None;
  let result = tokio::select! {
    res = stop => {
      tracing::info!("shutdown requested");
      res.map_err(Error::Signal)
    }
    res = &mut http => {
      tracing::warn!("http server exited");
      match res {
        Ok(Ok(())) => Err(Error::TaskExited("http server")),
        Ok(Err(e)) => Err(Error::Http(e)),
        Err(e) => Err(Error::TaskFailed { task: "http server", source: e }),
      }
    }
    res = consumer_exit => {
      tracing::warn!("ingestion stream ended");
      joined = Some(res);
      Err(Error::TaskExited("ingestion consumer"))
    }
  };

  // In-flight HTTP requests are dropped; the consumer finishes its flush.
  shutdown.cancel();
  http.abort();
  if joined.is_none()
    && let Some(handle) = consumer
  {
    joined = Some(handle.await);
  }

  match joined {
    Some(Ok(stats)) => {
      tracing::info!(
        batches = stats.batches_flushed,
        failed = stats.batches_failed,
        acked = stats.records_acked,
        nacked = stats.records_nacked,
        rejected = stats.payloads_rejected,
        "consumer stopped"
      );
      result
    }
    Some(Err(e)) => {
      tracing::error!(error = %e, "consumer task failed");
      result.and(Err(Error::TaskFailed { task: "ingestion consumer", source: e }))
    }
    None => result,
  }
}

#[cfg(test)]
mod tests {
  use std::{
    future::pending,
    sync::{
      Arc,
      atomic::{AtomicBool, Ordering},
    },
  };

  use super::*;

  /// A consumer that only returns once `shutdown` is cancelled.
  fn draining_consumer(
    shutdown: &CancellationToken,
  ) -> (JoinHandle<BatcherStats>, Arc<AtomicBool>) {
    let drained = Arc::new(AtomicBool::new(false));
    let (token, flag) = (shutdown.clone(), Arc::clone(&drained));
    let handle = tokio::spawn(async move {
      token.cancelled().await;
      flag.store(true, Ordering::SeqCst);
      BatcherStats { batches_flushed: 1, ..BatcherStats::default() }
    });
    (handle, drained)
  }

  #[tokio::test]
  async fn stop_signal_drains_the_consumer() {
    let shutdown = CancellationToken::new();
    let (consumer, drained) = draining_consumer(&shutdown);
    let http = tokio::spawn(pending::<io::Result<()>>());

    supervise(async { Ok(()) }, shutdown.clone(), http, Some(consumer))
      .await
      .unwrap();
    assert!(shutdown.is_cancelled());
    assert!(drained.load(Ordering::SeqCst));
  }

  #[tokio::test]
  async fn http_panic_still_drains_the_consumer() {
    let shutdown = CancellationToken::new();
    let (consumer, drained) = draining_consumer(&shutdown);
    let http: JoinHandle<io::Result<()>> = tokio::spawn(async { panic!("listener died") });

    let err = supervise(pending(), shutdown.clone(), http, Some(consumer))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::TaskFailed { task: "http server", .. }), "{err}");
    assert!(drained.load(Ordering::SeqCst));
  }

  #[tokio::test]
  async fn http_error_without_consumer_is_returned() {
    let http = tokio::spawn(async { Err(io::Error::other("listener closed")) });

    let err = supervise(pending(), CancellationToken::new(), http, None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Http(_)), "{err}");
  }

  #[tokio::test]
  async fn consumer_exit_stops_the_process() {
    let shutdown = CancellationToken::new();
    let consumer = tokio::spawn(async { BatcherStats::default() });
    let http = tokio::spawn(pending::<io::Result<()>>());

    let err = supervise(pending(), shutdown.clone(), http, Some(consumer))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::TaskExited("ingestion consumer")), "{err}");
    assert!(shutdown.is_cancelled());
  }
}
