//! [`SqliteStore`], the SQLite implementation of [`IndexStore`].

use std::{collections::HashMap, path::Path, time::Duration};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use sift_core::{
  StoreError,
  page::{EdgeUpsert, Page, PageId, PageUpsert, RelevanceEdge, TermId},
  store::{IndexStats, IndexStore, IndexTransaction, RankedPage},
};

use crate::{
  Result,
  encode::{RawPage, encode_dt},
  schema::{
    EDGES_FOR_PAGE, INSERT_TERM, RANKED_SEARCH, SCHEMA, SELECT_PAGE_BY_URL,
    SELECT_TERM_ID, STATS, TOP_TERMS_FOR_PAGE, UPSERT_EDGE, UPSERT_PAGE,
  },
};

/// How long a writer waits for another process's write lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn op<E>(operation: &'static str) -> impl FnOnce(E) -> StoreError
where
  E: std::error::Error + Send + Sync + 'static,
{
  move |e| StoreError::new(operation, e)
}

fn sql_limit(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A sift index backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Several
/// stores (or processes) may open the same file; writers serialise on
/// SQLite's write lock and conflicts resolve through the upsert clauses.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::info!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store. Useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// The [`IndexTransaction`] handed to [`IndexStore::write`] closures.
struct SqliteTransaction<'a> {
  tx: &'a rusqlite::Transaction<'a>,
}

impl IndexTransaction for SqliteTransaction<'_> {
  fn upsert_pages(
    &mut self,
    pages: &[PageUpsert],
  ) -> Result<HashMap<String, PageId>, StoreError> {
    let indexed_at = encode_dt(Utc::now());
    let mut stmt = self.tx.prepare_cached(UPSERT_PAGE).map_err(op("upsert_pages"))?;

    let mut ids = HashMap::with_capacity(pages.len());
    for page in pages {
      let id: PageId = stmt
        .query_row(
          rusqlite::params![page.url, page.title, indexed_at],
          |row| row.get(0),
        )
        .map_err(op("upsert_pages"))?;
      ids.insert(page.url.clone(), id);
    }
    Ok(ids)
  }

  fn upsert_terms(
    &mut self,
    words: &[String],
  ) -> Result<HashMap<String, TermId>, StoreError> {
    let mut insert = self.tx.prepare_cached(INSERT_TERM).map_err(op("upsert_terms"))?;
    let mut select = self.tx.prepare_cached(SELECT_TERM_ID).map_err(op("upsert_terms"))?;

    let mut ids = HashMap::with_capacity(words.len());
    for word in words {
      insert
        .execute(rusqlite::params![word])
        .map_err(op("upsert_terms"))?;
      let id: TermId = select
        .query_row(rusqlite::params![word], |row| row.get(0))
        .map_err(op("upsert_terms"))?;
      ids.insert(word.clone(), id);
    }
    Ok(ids)
  }

  fn upsert_relevance_edges(
    &mut self,
    edges: &[EdgeUpsert],
  ) -> Result<usize, StoreError> {
    let mut stmt = self
      .tx
      .prepare_cached(UPSERT_EDGE)
      .map_err(op("upsert_relevance_edges"))?;

    let mut written = 0;
    for edge in edges {
      written += stmt
        .execute(rusqlite::params![
          edge.page_id,
          edge.term_id,
          edge.term_frequency,
          edge.relevance,
          edge.inverse_document_frequency,
        ])
        .map_err(op("upsert_relevance_edges"))?;
    }
    Ok(written)
  }
}

// ─── IndexStore impl ─────────────────────────────────────────────────────────

impl IndexStore for SqliteStore {
  async fn write<F, T>(&self, f: F) -> Result<T, StoreError>
  where
    F: FnOnce(&mut dyn IndexTransaction) -> Result<T, StoreError>
      + Send
      + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front so concurrent writers
        // queue on the busy timeout instead of failing mid-transaction.
        let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
          Ok(tx) => tx,
          Err(e) => return Ok(Err(StoreError::new("begin", e))),
        };

        match f(&mut SqliteTransaction { tx: &tx }) {
          Ok(value) => match tx.commit() {
            Ok(()) => Ok(Ok(value)),
            Err(e) => Ok(Err(StoreError::new("commit", e))),
          },
          // Dropping `tx` rolls back.
          Err(e) => Ok(Err(e)),
        }
      })
      .await
      .map_err(op("transaction"))?
  }

  async fn ranked_search(
    &self,
    terms: &[String],
    limit: usize,
  ) -> Result<Vec<RankedPage>, StoreError> {
    let terms_json = serde_json::to_string(terms).map_err(op("ranked_search"))?;
    let limit = sql_limit(limit);

    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(RANKED_SEARCH)?;
        let rows = stmt
          .query_map(rusqlite::params![terms_json, limit], |row| {
            Ok(RankedPage {
              page_id: row.get(0)?,
              url:     row.get(1)?,
              title:   row.get(2)?,
              score:   row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(op("ranked_search"))
  }

  async fn top_terms_for_page(
    &self,
    page_id: PageId,
    k: usize,
  ) -> Result<Vec<String>, StoreError> {
    let k = sql_limit(k);

    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(TOP_TERMS_FOR_PAGE)?;
        let words = stmt
          .query_map(rusqlite::params![page_id, k], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(words)
      })
      .await
      .map_err(op("top_terms_for_page"))
  }

  async fn get_page(&self, url: &str) -> Result<Option<Page>, StoreError> {
    let url = url.to_owned();

    let raw: Option<RawPage> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(SELECT_PAGE_BY_URL, rusqlite::params![url], RawPage::from_row)
            .optional()?,
        )
      })
      .await
      .map_err(op("get_page"))?;

    raw
      .map(RawPage::into_page)
      .transpose()
      .map_err(op("get_page"))
  }

  async fn edges_for_page(
    &self,
    page_id: PageId,
  ) -> Result<Vec<RelevanceEdge>, StoreError> {
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(EDGES_FOR_PAGE)?;
        let edges = stmt
          .query_map(rusqlite::params![page_id], |row| {
            Ok(RelevanceEdge {
              page_id:                    row.get(0)?,
              term_id:                    row.get(1)?,
              word:                       row.get(2)?,
              term_frequency:             row.get(3)?,
              relevance:                  row.get(4)?,
              inverse_document_frequency: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
      })
      .await
      .map_err(op("edges_for_page"))
  }

  async fn stats(&self) -> Result<IndexStats, StoreError> {
    let (pages, terms, edges): (i64, i64, i64) = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(STATS, [], |row| {
          Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?)
      })
      .await
      .map_err(op("stats"))?;

    Ok(IndexStats {
      pages: pages.max(0) as u64,
      terms: terms.max(0) as u64,
      edges: edges.max(0) as u64,
    })
  }

  async fn ping(&self) -> Result<(), StoreError> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await
      .map_err(op("ping"))
  }
}
