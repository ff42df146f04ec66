//! A reader's loan history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shelf_core::{
  LibraryStore, LoanStatus, RequestContext, Result, UnitOfWork, Work,
  query::{HistoryQuery, LoanHistoryRow, Page, PageRequest},
};
use uuid::Uuid;

/// One loan as shown in a history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanHistoryItem {
  pub loan_id:     Uuid,
  pub book_id:     Uuid,
  pub book_title:  String,
  pub author:      String,
  pub genre:       String,
  pub loan_date:   DateTime<Utc>,
  pub return_date: Option<DateTime<Utc>>,
  pub status:      LoanStatus,
}

impl From<LoanHistoryRow> for LoanHistoryItem {
  fn from(row: LoanHistoryRow) -> Self {
    let status = row.status();
    Self {
      loan_id: row.loan_id,
      book_id: row.book_id,
      book_title: row.book_title,
      author: row.author,
      genre: row.genre,
      loan_date: row.loan_date,
      return_date: row.return_date,
      status,
    }
  }
}

struct LoadHistory {
  user_id: Uuid,
  query:   HistoryQuery,
}

impl Work for LoadHistory {
  type Output = (Vec<LoanHistoryRow>, u64);

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<Self::Output> {
    uow.loan_history(self.user_id, &self.query)
  }
}

pub struct HistoryService<S> {
  store: Arc<S>,
}

impl<S> Clone for HistoryService<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: LibraryStore> HistoryService<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// The user's loans, newest first.
  ///
  /// `text` matches the book's title, author or genre; `status` of `None`
  /// includes both active and returned loans. Paging is normalised as in
  /// catalog search.
  pub async fn history(
    &self,
    ctx: RequestContext,
    user_id: Uuid,
    text: Option<&str>,
    status: Option<LoanStatus>,
    page: i64,
    page_size: i64,
  ) -> Result<Page<LoanHistoryItem>> {
    let request = PageRequest::normalize(page, page_size);
    let query = HistoryQuery { text: text.map(str::to_owned), status, page: request };
    let (rows, total) = self.store.transact(ctx, LoadHistory { user_id, query }).await?;
    Ok(Page::new(rows, request, total).map(LoanHistoryItem::from))
  }
}
