//! Size- or idle-triggered batching of queue deliveries.
//!
//! The Batcher owns its buffer outright. Each valid delivery is parsed,
//! buffered with its handle, and the batch flushes when it reaches
//! `max_size` or when no valid delivery has arrived for `idle_flush`.
//! Flushes run inline in the receive loop, so at most one is in flight.
//!
//! Every handle in a flushed batch is settled the same way: all acked when
//! the batch commits, all nacked for redelivery when it does not.

use std::{fmt, future::Future, pin::pin, time::Duration};

use futures::{Stream, StreamExt as _, future::join_all};
use sift_core::{BoxError, reconcile::Reconciler, record::ExtractionRecord, store::IndexStore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::queue::Delivery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
  /// Flush as soon as this many records are buffered.
  pub max_size:   usize,
  /// Flush a non-empty buffer after this long without a valid delivery.
  pub idle_flush: Duration,
}

/// Counters reported when [`Batcher::run`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherStats {
  pub batches_flushed:   u64,
  pub batches_failed:    u64,
  pub records_acked:     u64,
  pub records_nacked:    u64,
  pub payloads_rejected: u64,
  /// Ack, nack or reject calls that the queue did not confirm.
  pub settle_errors:     u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
  Size,
  Idle,
  Shutdown,
  StreamEnd,
}

impl fmt::Display for FlushTrigger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      FlushTrigger::Size => "size",
      FlushTrigger::Idle => "idle",
      FlushTrigger::Shutdown => "shutdown",
      FlushTrigger::StreamEnd => "stream_end",
    })
  }
}

struct Pending<D> {
  record:   ExtractionRecord,
  delivery: D,
}

pub struct Batcher<S, D> {
  reconciler: Reconciler<S>,
  policy:     BatchPolicy,
  buffer:     Vec<Pending<D>>,
  stats:      BatcherStats,
}

impl<S: IndexStore, D: Delivery> Batcher<S, D> {
  pub fn new(reconciler: Reconciler<S>, mut policy: BatchPolicy) -> Self {
    policy.max_size = policy.max_size.max(1);
    Self {
      reconciler,
      buffer: Vec::with_capacity(policy.max_size),
      policy,
      stats: BatcherStats::default(),
    }
  }

  /// Consume `deliveries` until `shutdown` is cancelled or the stream ends.
  ///
  /// Buffered records are flushed and settled before returning.
  pub async fn run<St>(mut self, deliveries: St, shutdown: CancellationToken) -> BatcherStats
  where
    St: Stream<Item = D> + Send,
  {
    let mut deliveries = pin!(deliveries);
    let idle = tokio::time::sleep(self.policy.idle_flush);
    let mut idle = pin!(idle);

    tracing::info!(
      max_size = self.policy.max_size,
      idle_flush_ms = self.policy.idle_flush.as_millis() as u64,
      "batcher started"
    );

    loop {
      tokio::select! {
        biased;

        () = shutdown.cancelled() => {
          self.flush(FlushTrigger::Shutdown).await;
          break;
        }

        next = deliveries.next() => {
          let Some(delivery) = next else {
            self.flush(FlushTrigger::StreamEnd).await;
            break;
          };
          if self.accept(delivery).await {
            idle.as_mut().reset(Instant::now() + self.policy.idle_flush);
            if self.buffer.len() >= self.policy.max_size {
              self.flush(FlushTrigger::Size).await;
            }
          }
        }

        () = &mut idle, if !self.buffer.is_empty() => {
          self.flush(FlushTrigger::Idle).await;
        }
      }
    }

    tracing::info!(stats = ?self.stats, "batcher stopped");
    self.stats
  }

  /// Parse and buffer one delivery. Returns `false` if it was rejected.
  async fn accept(&mut self, delivery: D) -> bool {
    match ExtractionRecord::from_slice(delivery.payload()) {
      Ok(record) => {
        self.buffer.push(Pending { record, delivery });
        true
      }
      Err(e) => {
        tracing::warn!(error = %e, "rejecting malformed payload");
        self.stats.payloads_rejected += 1;
        if let Err(e) = delivery.reject().await {
          tracing::warn!(error = %e, "failed to reject message");
          self.stats.settle_errors += 1;
        }
        false
      }
    }
  }

  async fn flush(&mut self, trigger: FlushTrigger) {
    if self.buffer.is_empty() {
      return;
    }

    let batch_size = self.buffer.len();
    let (records, deliveries): (Vec<_>, Vec<_>) = self
      .buffer
      .drain(..)
      .map(|p| (p.record, p.delivery))
      .unzip();

    match self.reconciler.reconcile(records).await {
      Ok(summary) => {
        tracing::info!(
          batch_size,
          %trigger,
          pages = summary.pages,
          terms = summary.terms,
          edges = summary.edges,
          "batch committed"
        );
        self.stats.batches_flushed += 1;
        self.stats.records_acked += batch_size as u64;
        self.stats.settle_errors += settle(deliveries, D::ack, "ack").await;

        match self.reconciler.store().stats().await {
          Ok(index) => tracing::info!(
            pages = index.pages,
            terms = index.terms,
            edges = index.edges,
            "index size"
          ),
          Err(e) => tracing::warn!(error = %e, "failed to read index stats"),
        }
      }
      Err(e) => {
        tracing::error!(
          batch_size,
          %trigger,
          error = %e,
          "batch failed; requesting redelivery"
        );
        self.stats.batches_failed += 1;
        self.stats.records_nacked += batch_size as u64;
        self.stats.settle_errors += settle(deliveries, D::nack, "nack").await;
      }
    }
  }
}

/// Settle every delivery concurrently; returns how many calls failed.
async fn settle<D, F, Fut>(deliveries: Vec<D>, f: F, action: &'static str) -> u64
where
  F: FnMut(D) -> Fut,
  Fut: Future<Output = Result<(), BoxError>>,
{
  let mut failed = 0;
  for result in join_all(deliveries.into_iter().map(f)).await {
    if let Err(e) = result {
      tracing::warn!(action, error = %e, "failed to settle message");
      failed += 1;
    }
  }
  failed
}
