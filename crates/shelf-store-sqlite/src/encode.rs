//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed nanosecond
//! precision, so lexical order matches chronological order. UUIDs are stored
//! as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use shelf_core::{
  Book, Loan, Role, User, audit::AuditMetadata, loan::LoanStatus,
  query::LoanHistoryRow,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Role / status ───────────────────────────────────────────────────────────

pub fn encode_role(role: Role) -> &'static str {
  match role {
    Role::Reader => "reader",
    Role::Admin => "admin",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "reader" => Ok(Role::Reader),
    "admin" => Ok(Role::Admin),
    other => Err(Error::UnknownValue { column: "role", value: other.to_owned() }),
  }
}

pub fn encode_status(status: LoanStatus) -> &'static str {
  match status {
    LoanStatus::Borrowed => "borrowed",
    LoanStatus::Returned => "returned",
  }
}

// ─── Audit columns ───────────────────────────────────────────────────────────

/// The four audit columns, in table order.
pub struct RawAudit {
  pub created_at:  Option<String>,
  pub created_by:  Option<String>,
  pub modified_at: Option<String>,
  pub modified_by: Option<String>,
}

impl RawAudit {
  pub fn from_meta(meta: &AuditMetadata) -> Self {
    Self {
      created_at:  meta.created_at.map(encode_dt),
      created_by:  meta.created_by.clone(),
      modified_at: meta.modified_at.map(encode_dt),
      modified_by: meta.modified_by.clone(),
    }
  }

  /// Read the audit columns starting at index `at`.
  fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      created_at:  row.get(at)?,
      created_by:  row.get(at + 1)?,
      modified_at: row.get(at + 2)?,
      modified_by: row.get(at + 3)?,
    })
  }

  fn into_meta(self) -> Result<AuditMetadata> {
    Ok(AuditMetadata {
      created_at:  decode_opt_dt(self.created_at.as_deref())?,
      created_by:  self.created_by,
      modified_at: decode_opt_dt(self.modified_at.as_deref())?,
      modified_by: self.modified_by,
    })
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const BOOK_COLUMNS: &str = "book_id, title, author, genre, available_copies, \
                                created_at, created_by, modified_at, modified_by";

/// Raw values read directly from a `books` row.
pub struct RawBook {
  pub book_id:          String,
  pub title:            String,
  pub author:           String,
  pub genre:            String,
  pub available_copies: i64,
  pub audit:            RawAudit,
}

impl RawBook {
  /// Map a row selected with [`BOOK_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      book_id:          row.get(0)?,
      title:            row.get(1)?,
      author:           row.get(2)?,
      genre:            row.get(3)?,
      available_copies: row.get(4)?,
      audit:            RawAudit::read(row, 5)?,
    })
  }

  pub fn into_book(self) -> Result<Book> {
    Ok(Book::restore(
      decode_uuid(&self.book_id)?,
      &self.title,
      &self.author,
      &self.genre,
      self.available_copies,
      self.audit.into_meta()?,
    )?)
  }
}

pub const LOAN_COLUMNS: &str = "loan_id, user_id, book_id, loan_date, return_date, \
                                created_at, created_by, modified_at, modified_by";

/// Raw values read directly from a `loans` row.
pub struct RawLoan {
  pub loan_id:     String,
  pub user_id:     String,
  pub book_id:     String,
  pub loan_date:   String,
  pub return_date: Option<String>,
  pub audit:       RawAudit,
}

impl RawLoan {
  /// Map a row selected with [`LOAN_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      loan_id:     row.get(0)?,
      user_id:     row.get(1)?,
      book_id:     row.get(2)?,
      loan_date:   row.get(3)?,
      return_date: row.get(4)?,
      audit:       RawAudit::read(row, 5)?,
    })
  }

  pub fn into_loan(self) -> Result<Loan> {
    Ok(Loan::restore(
      decode_uuid(&self.loan_id)?,
      decode_uuid(&self.user_id)?,
      decode_uuid(&self.book_id)?,
      decode_dt(&self.loan_date)?,
      decode_opt_dt(self.return_date.as_deref())?,
      self.audit.into_meta()?,
    )?)
  }
}

pub const USER_COLUMNS: &str = "user_id, name, email, password_hash, role, \
                                created_at, created_by, modified_at, modified_by";

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:       String,
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub role:          String,
  pub audit:         RawAudit,
}

impl RawUser {
  /// Map a row selected with [`USER_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      name:          row.get(1)?,
      email:         row.get(2)?,
      password_hash: row.get(3)?,
      role:          row.get(4)?,
      audit:         RawAudit::read(row, 5)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User::restore(
      decode_uuid(&self.user_id)?,
      &self.name,
      &self.email,
      &self.password_hash,
      decode_role(&self.role)?,
      self.audit.into_meta()?,
    )?)
  }
}

/// Raw values from a `loans` row joined with its book.
pub struct RawHistoryRow {
  pub loan_id:     String,
  pub book_id:     String,
  pub title:       String,
  pub author:      String,
  pub genre:       String,
  pub loan_date:   String,
  pub return_date: Option<String>,
}

impl RawHistoryRow {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      loan_id:     row.get(0)?,
      book_id:     row.get(1)?,
      title:       row.get(2)?,
      author:      row.get(3)?,
      genre:       row.get(4)?,
      loan_date:   row.get(5)?,
      return_date: row.get(6)?,
    })
  }

  pub fn into_row(self) -> Result<LoanHistoryRow> {
    Ok(LoanHistoryRow {
      loan_id:     decode_uuid(&self.loan_id)?,
      book_id:     decode_uuid(&self.book_id)?,
      book_title:  self.title,
      author:      self.author,
      genre:       self.genre,
      loan_date:   decode_dt(&self.loan_date)?,
      return_date: decode_opt_dt(self.return_date.as_deref())?,
    })
  }
}

// ─── LIKE patterns ───────────────────────────────────────────────────────────

/// Build a lowercase `%text%` pattern for `LIKE ... ESCAPE '\'`.
///
/// Only ASCII letters are folded, matching SQLite's built-in `lower()`.
pub fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for c in text.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c.to_ascii_lowercase());
  }
  out.push('%');
  out
}
