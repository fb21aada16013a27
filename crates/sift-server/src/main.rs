//! sift server binary.
//!
//! Reads `sift.toml` (or the path given with `--config`) plus `SIFT__*`
//! environment overrides, then runs the ingestion consumer, the search API,
//! or both, depending on `--role`.
//!
//! ```sh
//! SIFT__BATCH__MAX_SIZE=50 cargo run -p sift-server --bin sift -- --role indexer
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use sift_core::{rank::Searcher, reconcile::Reconciler};
use sift_server::{
  SiftConfig,
  batcher::{Batcher, BatcherStats},
  bootstrap::connect_with_retry,
  build_normalizer, queue,
  supervise::supervise,
};
use sift_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Role {
  /// Ingestion consumer and search API in one process.
  All,
  /// Ingestion consumer only; `/healthz` is served on `indexer.health_port`.
  Indexer,
  /// Search API only.
  Search,
}

#[derive(Parser)]
#[command(author, version, about = "sift keyword indexer and search API")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "sift.toml")]
  config: PathBuf,

  /// Which parts of the pipeline to run.
  #[arg(long, value_enum, default_value_t = Role::All)]
  role: Role,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(
      config::Environment::with_prefix("SIFT")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read configuration")?;

  let cfg: SiftConfig = settings
    .try_deserialize()
    .context("failed to deserialise SiftConfig")?;
  cfg.validate()?;

  let store_path = cfg.store.resolved_path();
  let retry = cfg.bootstrap.policy();
  let shutdown = CancellationToken::new();

  tracing::info!(role = ?cli.role, store = ?store_path, "starting sift");

  // Write side: the consumer task. The trust root outlives the client.
  let trust_root = match cli.role {
    Role::Search => None,
    Role::All | Role::Indexer => queue::trust_root(&cfg.queue)?,
  };
  let mut consumer: Option<JoinHandle<BatcherStats>> = None;
  let mut index_store = None;
  if cli.role != Role::Search {
    let store = connect_with_retry("store", retry, || SqliteStore::open(&store_path))
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?;
    let store = Arc::new(store);

    let ca = trust_root.as_ref().map(queue::TrustRoot::path);
    let client = connect_with_retry("nats", retry, || queue::connect(&cfg.queue, ca)).await?;
    let subscription = connect_with_retry("jetstream", retry, || {
      queue::subscribe(client.clone(), &cfg.queue, &cfg.batch)
    })
    .await?;
    let deliveries = queue::deliveries(&subscription)
      .await
      .context("failed to start consuming")?;

    let batcher = Batcher::new(Reconciler::new(Arc::clone(&store)), cfg.batch.policy());
    consumer = Some(tokio::spawn(batcher.run(deliveries, shutdown.clone())));
    index_store = Some(store);
  }

  // Read side: the HTTP task.
  let (app, address) = match (cli.role, index_store) {
    (Role::Indexer, Some(store)) => (
      sift_api::health_router(store),
      format!("{}:{}", cfg.search.host, cfg.indexer.health_port),
    ),
    _ => {
      // The search path keeps its own connection to the file.
      let store = connect_with_retry("store", retry, || SqliteStore::open(&store_path))
        .await
        .with_context(|| format!("failed to open store at {store_path:?}"))?;
      let normalizer = build_normalizer(&cfg.search).await?;
      let searcher = Searcher::new(Arc::new(store), normalizer)
        .with_limits(cfg.search.result_limit, cfg.search.preview_terms);
      (
        sift_api::api_router(Arc::new(searcher)),
        format!("{}:{}", cfg.search.host, cfg.search.port),
      )
    }
  };

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  let http = tokio::spawn(async move { axum::serve(listener, app).await });

  supervise(tokio::signal::ctrl_c(), shutdown, http, consumer).await?;
  Ok(())
}
