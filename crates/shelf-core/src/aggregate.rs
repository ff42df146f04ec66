//! The aggregate abstraction that lets storage code be written once and
//! parameterised by aggregate type.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{audit::AuditMetadata, book::Book, loan::Loan, user::User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
  Book,
  Loan,
  User,
}

impl fmt::Display for AggregateKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Book => "book",
      Self::Loan => "loan",
      Self::User => "user",
    })
  }
}

/// Any aggregate, as held by a pending change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
  Book(Book),
  Loan(Loan),
  User(User),
}

impl Record {
  pub fn kind(&self) -> AggregateKind {
    match self {
      Self::Book(_) => AggregateKind::Book,
      Self::Loan(_) => AggregateKind::Loan,
      Self::User(_) => AggregateKind::User,
    }
  }

  pub fn id(&self) -> Uuid {
    match self {
      Self::Book(b) => b.id(),
      Self::Loan(l) => l.id(),
      Self::User(u) => u.id(),
    }
  }

  pub fn audit(&self) -> &AuditMetadata {
    match self {
      Self::Book(b) => b.audit(),
      Self::Loan(l) => l.audit(),
      Self::User(u) => u.audit(),
    }
  }

  pub fn audit_mut(&mut self) -> &mut AuditMetadata {
    match self {
      Self::Book(b) => b.audit_mut(),
      Self::Loan(l) => l.audit_mut(),
      Self::User(u) => u.audit_mut(),
    }
  }
}

/// Implemented by [`Book`], [`Loan`] and [`User`].
pub trait Aggregate: Clone + Send + 'static {
  const KIND: AggregateKind;

  fn id(&self) -> Uuid;

  fn into_record(self) -> Record;

  /// `None` if `record` holds a different kind of aggregate.
  fn from_record(record: Record) -> Option<Self>;
}

impl Aggregate for Book {
  const KIND: AggregateKind = AggregateKind::Book;

  fn id(&self) -> Uuid { Book::id(self) }

  fn into_record(self) -> Record { Record::Book(self) }

  fn from_record(record: Record) -> Option<Self> {
    match record {
      Record::Book(b) => Some(b),
      _ => None,
    }
  }
}

impl Aggregate for Loan {
  const KIND: AggregateKind = AggregateKind::Loan;

  fn id(&self) -> Uuid { Loan::id(self) }

  fn into_record(self) -> Record { Record::Loan(self) }

  fn from_record(record: Record) -> Option<Self> {
    match record {
      Record::Loan(l) => Some(l),
      _ => None,
    }
  }
}

impl Aggregate for User {
  const KIND: AggregateKind = AggregateKind::User;

  fn id(&self) -> Uuid { User::id(self) }

  fn into_record(self) -> Record { Record::User(self) }

  fn from_record(record: Record) -> Option<Self> {
    match record {
      Record::User(u) => Some(u),
      _ => None,
    }
  }
}
