//! The repository / unit-of-work port and the request context it runs under.
//!
//! A [`LibraryStore`] backend runs one [`Work`] per transaction. The work
//! receives a [`UnitOfWork`]: writes are staged until [`UnitOfWork::commit`],
//! and a work that returns without committing (or with an error) leaves
//! storage untouched.

use std::{
  future::Future,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use uuid::Uuid;

use crate::{
  Result,
  aggregate::Aggregate,
  audit::{CurrentActor, resolve_actor},
  book::Book,
  loan::Loan,
  query::{BookQuery, HistoryQuery, LoanHistoryRow},
  user::User,
};

// ─── Request context ─────────────────────────────────────────────────────────

/// Cooperative cancellation shared between a caller and its in-flight work.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
  pub fn new() -> Self { Self::default() }

  pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }

  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

/// Who is calling, and whether they still want the answer.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
  /// Resolved actor string recorded in audit fields; `None` for anonymous
  /// callers.
  pub actor:  Option<String>,
  pub cancel: CancelSignal,
}

impl RequestContext {
  pub fn anonymous() -> Self { Self::default() }

  pub fn for_actor(actor: &impl CurrentActor) -> Self {
    Self { actor: resolve_actor(actor), cancel: CancelSignal::new() }
  }

  pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
    self.cancel = cancel;
    self
  }
}

// ─── Unit of work ────────────────────────────────────────────────────────────

/// Transactional access to the library's aggregates.
///
/// `get`, `get_all` and `count` reflect changes staged earlier in the same
/// unit of work. The aggregate-specific queries read committed state only.
pub trait UnitOfWork {
  // ── Generic repository ────────────────────────────────────────────────

  fn get<A: Aggregate>(&mut self, id: Uuid) -> Result<Option<A>>;

  fn get_all<A: Aggregate>(&mut self) -> Result<Vec<A>>;

  fn count<A: Aggregate>(&mut self) -> Result<u64>;

  fn insert<A: Aggregate>(&mut self, aggregate: A) -> Result<()>;

  fn update<A: Aggregate>(&mut self, aggregate: A) -> Result<()>;

  /// Stage deletion of `id`. Returns `false` if no such aggregate exists.
  fn delete<A: Aggregate>(&mut self, id: Uuid) -> Result<bool>;

  // ── Queries ───────────────────────────────────────────────────────────

  /// One page of books matching `query`, ordered by title, plus the total
  /// number of matches.
  fn search_books(&mut self, query: &BookQuery) -> Result<(Vec<Book>, u64)>;

  /// The user's unreturned loan of `book_id`, if any.
  fn active_loan(&mut self, user_id: Uuid, book_id: Uuid) -> Result<Option<Loan>>;

  /// One page of the user's loans joined with their books, newest first,
  /// plus the total number of matches.
  fn loan_history(
    &mut self,
    user_id: Uuid,
    query: &HistoryQuery,
  ) -> Result<(Vec<LoanHistoryRow>, u64)>;

  /// Exact, case-sensitive email lookup.
  fn user_by_email(&mut self, email: &str) -> Result<Option<User>>;

  fn email_exists(&mut self, email: &str) -> Result<bool> {
    Ok(self.user_by_email(email)?.is_some())
  }

  // ── Commit ────────────────────────────────────────────────────────────

  /// Stamp audit metadata, flush every staged change and commit atomically.
  ///
  /// Fails with [`Error::Cancelled`](crate::Error::Cancelled) if the
  /// request was cancelled, in which case nothing is written. Returns the
  /// number of rows written.
  fn commit(&mut self) -> Result<usize>;
}

/// A unit of business logic run inside one transaction.
pub trait Work: Send + 'static {
  type Output: Send + 'static;

  /// Works that never stage changes may run without a write lock.
  const READ_ONLY: bool = false;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<Self::Output>;
}

/// A storage backend that can run [`Work`].
///
/// `transact` must serialise conflicting writers: two works that both read a
/// book and write it back cannot both commit from the same snapshot.
pub trait LibraryStore: Send + Sync + 'static {
  fn transact<W: Work>(
    &self,
    ctx: RequestContext,
    work: W,
  ) -> impl Future<Output = Result<W::Output>> + Send + '_;
}
