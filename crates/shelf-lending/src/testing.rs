//! Shared fixtures for service tests.

use std::{path::PathBuf, sync::Arc};

use shelf_core::RequestContext;
use shelf_store_sqlite::SqliteStore;
use uuid::Uuid;

pub async fn memory_store() -> Arc<SqliteStore> {
  Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  )
}

pub fn ctx() -> RequestContext { RequestContext::anonymous() }

/// A fresh database path under the system temp directory.
pub fn temp_db_path() -> PathBuf {
  std::env::temp_dir().join(format!("shelf-test-{}.db", Uuid::new_v4()))
}
