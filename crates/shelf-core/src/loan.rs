//! Loan: one checkout of one copy, and its borrow/return state machine.
//!
//! ```text
//! Borrowed ──mark_returned──▶ Returned   (terminal)
//! ```

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, audit::AuditMetadata};

/// Derived status of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
  Borrowed,
  Returned,
}

impl fmt::Display for LoanStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Borrowed => "borrowed",
      Self::Returned => "returned",
    })
  }
}

impl FromStr for LoanStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "borrowed" => Ok(Self::Borrowed),
      "returned" => Ok(Self::Returned),
      other => Err(Error::validation(format!("unknown loan status: {other:?}"))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Loan {
  id:          Uuid,
  user_id:     Uuid,
  book_id:     Uuid,
  loan_date:   DateTime<Utc>,
  return_date: Option<DateTime<Utc>>,
  audit:       AuditMetadata,
}

impl Loan {
  /// Open a loan. `when` defaults to now.
  pub fn create(user_id: Uuid, book_id: Uuid, when: Option<DateTime<Utc>>) -> Result<Self> {
    if user_id.is_nil() {
      return Err(Error::InvalidReference("user id"));
    }
    if book_id.is_nil() {
      return Err(Error::InvalidReference("book id"));
    }
    Ok(Self {
      id: Uuid::new_v4(),
      user_id,
      book_id,
      loan_date: when.unwrap_or_else(Utc::now),
      return_date: None,
      audit: AuditMetadata::default(),
    })
  }

  /// Rebuild a loan loaded from storage.
  pub fn restore(
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    loan_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    audit: AuditMetadata,
  ) -> Result<Self> {
    if id.is_nil() {
      return Err(Error::InvalidReference("loan id"));
    }
    let mut loan = Self::create(user_id, book_id, Some(loan_date))?;
    loan.id = id;
    loan.return_date = return_date;
    loan.audit = audit;
    Ok(loan)
  }

  pub fn id(&self) -> Uuid { self.id }

  pub fn user_id(&self) -> Uuid { self.user_id }

  pub fn book_id(&self) -> Uuid { self.book_id }

  pub fn loan_date(&self) -> DateTime<Utc> { self.loan_date }

  pub fn return_date(&self) -> Option<DateTime<Utc>> { self.return_date }

  pub fn audit(&self) -> &AuditMetadata { &self.audit }

  pub(crate) fn audit_mut(&mut self) -> &mut AuditMetadata { &mut self.audit }

  pub fn status(&self) -> LoanStatus {
    match self.return_date {
      Some(_) => LoanStatus::Returned,
      None => LoanStatus::Borrowed,
    }
  }

  pub fn is_active(&self) -> bool { self.return_date.is_none() }

  /// Close the loan. `when` defaults to now. A loan can be returned once.
  pub fn mark_returned(&mut self, when: Option<DateTime<Utc>>) -> Result<()> {
    if self.return_date.is_some() {
      return Err(Error::AlreadyReturned(self.id));
    }
    self.return_date = Some(when.unwrap_or_else(Utc::now));
    Ok(())
  }
}
