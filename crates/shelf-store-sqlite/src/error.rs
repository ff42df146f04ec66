//! Error type for `shelf-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] shelf_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value: {value:?}")]
  UnknownValue { column: &'static str, value: String },

  /// The session was used after its transaction was committed.
  #[error("unit of work already committed")]
  Finished,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Domain errors pass through unchanged; everything else is a storage fault.
impl From<Error> for shelf_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(e) => e,
      other => shelf_core::Error::storage(other),
    }
  }
}
