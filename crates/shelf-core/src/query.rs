//! Query and paging types for catalog search and loan history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::loan::LoanStatus;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

// ─── Paging ──────────────────────────────────────────────────────────────────

/// A 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
  pub page:      u32,
  pub page_size: u32,
}

impl PageRequest {
  /// Normalise caller input: `page <= 0` becomes 1, `page_size <= 0`
  /// becomes [`DEFAULT_PAGE_SIZE`]. Values above `u32::MAX` are clamped.
  pub fn normalize(page: i64, page_size: i64) -> Self {
    Self {
      page:      positive_or(page, DEFAULT_PAGE),
      page_size: positive_or(page_size, DEFAULT_PAGE_SIZE),
    }
  }

  /// Rows to skip before this page starts.
  pub fn offset(&self) -> u64 {
    u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
  }

  pub fn limit(&self) -> u64 { u64::from(self.page_size) }
}

fn positive_or(value: i64, default: u32) -> u32 {
  if value <= 0 {
    return default;
  }
  u32::try_from(value).unwrap_or(u32::MAX)
}

impl Default for PageRequest {
  fn default() -> Self {
    Self { page: DEFAULT_PAGE, page_size: DEFAULT_PAGE_SIZE }
  }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
  pub items:     Vec<T>,
  pub page:      u32,
  pub page_size: u32,
  /// Matches after filtering, before paging.
  pub total:     u64,
}

impl<T> Page<T> {
  pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
    Self { items, page: request.page, page_size: request.page_size, total }
  }

  pub fn total_pages(&self) -> u64 {
    if self.page_size == 0 {
      return 0;
    }
    self.total.div_ceil(u64::from(self.page_size))
  }

  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
      items:     self.items.into_iter().map(f).collect(),
      page:      self.page,
      page_size: self.page_size,
      total:     self.total,
    }
  }
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Parameters for a catalog search.
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
  /// Case-insensitive substring matched against title, author and genre.
  pub text: Option<String>,
  pub page: PageRequest,
}

/// Parameters for one user's loan history.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
  /// Case-insensitive substring matched against the book's title, author and
  /// genre.
  pub text:   Option<String>,
  /// `None` returns loans in any status.
  pub status: Option<LoanStatus>,
  pub page:   PageRequest,
}

/// Trim free-text input; blank means "no filter".
pub fn search_text(text: Option<&str>) -> Option<&str> {
  text.map(str::trim).filter(|t| !t.is_empty())
}

/// A loan joined with its book, as listed in a user's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanHistoryRow {
  pub loan_id:     Uuid,
  pub book_id:     Uuid,
  pub book_title:  String,
  pub author:      String,
  pub genre:       String,
  pub loan_date:   DateTime<Utc>,
  pub return_date: Option<DateTime<Utc>>,
}

impl LoanHistoryRow {
  pub fn status(&self) -> LoanStatus {
    match self.return_date {
      Some(_) => LoanStatus::Returned,
      None => LoanStatus::Borrowed,
    }
  }
}
