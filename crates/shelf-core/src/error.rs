//! Error types for `shelf-core`.
//!
//! The variants mirror the lending domain's failure taxonomy. Storage
//! backends fold their own errors into [`Error::Storage`] at the port
//! boundary so callers see a single error type.

use thiserror::Error;
use uuid::Uuid;

use crate::aggregate::AggregateKind;

#[derive(Debug, Error)]
pub enum Error {
  /// Bad input to an entity constructor or setter.
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("invalid reference: {0} must not be empty")]
  InvalidReference(&'static str),

  #[error("book {0} has no available copies")]
  OutOfStock(Uuid),

  #[error("user {user_id} already has an active loan of book {book_id}")]
  DuplicateActiveLoan { user_id: Uuid, book_id: Uuid },

  #[error("loan {0} was already returned")]
  AlreadyReturned(Uuid),

  #[error("{kind} not found: {id}")]
  NotFound { kind: AggregateKind, id: Uuid },

  #[error("email is already registered: {0}")]
  EmailTaken(String),

  /// Deliberately says nothing about which credential was wrong.
  #[error("invalid email or password")]
  InvalidCredentials,

  #[error("unit of work was cancelled before commit")]
  Cancelled,

  #[error("password hashing failed: {0}")]
  Hashing(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  pub fn not_found(kind: AggregateKind, id: Uuid) -> Self {
    Self::NotFound { kind, id }
  }

  /// Wrap any backend error as a generic storage failure.
  pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
