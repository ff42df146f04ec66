//! Borrow and return: the two workflows that move copies between the shelf
//! and readers.
//!
//! Each runs as a single [`Work`] so the book and loan changes commit
//! together or not at all. The store's write lock is held from the first
//! read, which makes the availability check, the duplicate-loan check and the
//! reservation one atomic step.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shelf_core::{
  AggregateKind, Book, Error, LibraryStore, Loan, RequestContext, Result, UnitOfWork, Work,
};
use tracing::{info, warn};
use uuid::Uuid;

// ─── Results ─────────────────────────────────────────────────────────────────

/// What a successful borrow hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BorrowReceipt {
  pub loan_id:          Uuid,
  pub book_id:          Uuid,
  /// The book's available copies after this reservation.
  pub remaining_copies: u32,
  pub loan_date:        DateTime<Utc>,
}

/// Outcome of a return request.
///
/// An unknown loan and a loan that was already returned are reported, not
/// raised: repeating a return is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnOutcome {
  Returned,
  NotFound,
  AlreadyReturned,
}

impl ReturnOutcome {
  /// `true` only if this call returned the copy.
  pub fn returned(self) -> bool { matches!(self, Self::Returned) }
}

// ─── Works ───────────────────────────────────────────────────────────────────

struct Borrow {
  user_id: Uuid,
  book_id: Uuid,
  when:    Option<DateTime<Utc>>,
}

impl Work for Borrow {
  type Output = BorrowReceipt;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<BorrowReceipt> {
    let mut book = uow
      .get::<Book>(self.book_id)?
      .ok_or_else(|| Error::not_found(AggregateKind::Book, self.book_id))?;

    if !book.has_availability(1) {
      return Err(Error::OutOfStock(book.id()));
    }

    if uow.active_loan(self.user_id, self.book_id)?.is_some() {
      return Err(Error::DuplicateActiveLoan { user_id: self.user_id, book_id: self.book_id });
    }

    book.reserve_one()?;
    let remaining_copies = book.available_copies();
    uow.update(book)?;

    let loan = Loan::create(self.user_id, self.book_id, self.when)?;
    let receipt = BorrowReceipt {
      loan_id: loan.id(),
      book_id: self.book_id,
      remaining_copies,
      loan_date: loan.loan_date(),
    };
    uow.insert(loan)?;

    uow.commit()?;
    Ok(receipt)
  }
}

struct Return {
  loan_id: Uuid,
  when:    Option<DateTime<Utc>>,
}

impl Work for Return {
  type Output = ReturnOutcome;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<ReturnOutcome> {
    let Some(mut loan) = uow.get::<Loan>(self.loan_id)? else {
      return Ok(ReturnOutcome::NotFound);
    };
    if !loan.is_active() {
      return Ok(ReturnOutcome::AlreadyReturned);
    }

    // A loan whose book has vanished is an integrity fault, not a no-op.
    let mut book = uow
      .get::<Book>(loan.book_id())?
      .ok_or_else(|| Error::not_found(AggregateKind::Book, loan.book_id()))?;

    loan.mark_returned(self.when)?;
    book.return_one();
    uow.update(loan)?;
    uow.update(book)?;

    uow.commit()?;
    Ok(ReturnOutcome::Returned)
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Borrow and return, over any [`LibraryStore`].
pub struct LendingService<S> {
  store: Arc<S>,
}

impl<S> Clone for LendingService<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: LibraryStore> LendingService<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Check out one copy of `book_id` to `user_id`.
  ///
  /// Fails with `NotFound` (book), `OutOfStock` or `DuplicateActiveLoan`;
  /// on any failure neither the book nor the loans are changed.
  pub async fn borrow(
    &self,
    ctx: RequestContext,
    user_id: Uuid,
    book_id: Uuid,
  ) -> Result<BorrowReceipt> {
    self.borrow_at(ctx, user_id, book_id, None).await
  }

  /// [`borrow`](Self::borrow) with a caller-fixed loan date.
  pub async fn borrow_at(
    &self,
    ctx: RequestContext,
    user_id: Uuid,
    book_id: Uuid,
    when: Option<DateTime<Utc>>,
  ) -> Result<BorrowReceipt> {
    let result = self.store.transact(ctx, Borrow { user_id, book_id, when }).await;
    match &result {
      Ok(receipt) => info!(
        %user_id,
        %book_id,
        loan_id = %receipt.loan_id,
        remaining = receipt.remaining_copies,
        "book borrowed"
      ),
      Err(e @ (Error::OutOfStock(_) | Error::DuplicateActiveLoan { .. })) => {
        warn!(%user_id, %book_id, "borrow rejected: {e}");
      }
      Err(_) => {}
    }
    result
  }

  /// Check a loan back in, returning its copy to the shelf.
  pub async fn return_loan(&self, ctx: RequestContext, loan_id: Uuid) -> Result<ReturnOutcome> {
    self.return_loan_at(ctx, loan_id, None).await
  }

  /// [`return_loan`](Self::return_loan) with a caller-fixed return date.
  pub async fn return_loan_at(
    &self,
    ctx: RequestContext,
    loan_id: Uuid,
    when: Option<DateTime<Utc>>,
  ) -> Result<ReturnOutcome> {
    let outcome = self.store.transact(ctx, Return { loan_id, when }).await?;
    match outcome {
      ReturnOutcome::Returned => info!(%loan_id, "loan returned"),
      other => warn!(%loan_id, ?other, "return had no effect"),
    }
    Ok(outcome)
  }
}
