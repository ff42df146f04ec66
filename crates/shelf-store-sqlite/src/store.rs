//! [`SqliteStore`]: the SQLite implementation of [`LibraryStore`].

use std::{path::Path, time::Duration};

use rusqlite::TransactionBehavior;
use shelf_core::{LibraryStore, RequestContext, Work};

use crate::{Error, Result, schema::SCHEMA, session::SqliteSession};

/// How long a writer waits for another connection's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A library store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted, and every
/// clone funnels its work through the same connection thread. Independent
/// handles opened on the same file coordinate through SQLite's own locking.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
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

impl LibraryStore for SqliteStore {
  /// Run `work` inside one transaction on the connection thread.
  ///
  /// Writers begin with `BEGIN IMMEDIATE`, taking the database write lock
  /// before their first read, so a borrow's availability check and its
  /// reservation see the same snapshot.
  async fn transact<W: Work>(&self, ctx: RequestContext, work: W) -> shelf_core::Result<W::Output> {
    if ctx.cancel.is_cancelled() {
      return Err(shelf_core::Error::Cancelled);
    }
    let outcome = self
      .conn
      .call(move |conn| {
        let behavior = if W::READ_ONLY {
          TransactionBehavior::Deferred
        } else {
          TransactionBehavior::Immediate
        };
        let tx = conn.transaction_with_behavior(behavior)?;
        let mut session = SqliteSession::new(tx, ctx);
        Ok(work.run(&mut session))
      })
      .await
      .map_err(Error::from)?;
    outcome
  }
}
