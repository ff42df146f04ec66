//! Integration tests for `SqliteStore` against an in-memory database.

use std::marker::PhantomData;

use chrono::{DateTime, TimeZone, Utc};
use shelf_core::{
  Aggregate, Book, Error, LibraryStore, Loan, LoanStatus, RequestContext, Role,
  UnitOfWork, User, Work,
  audit::ActorContext,
  query::{BookQuery, HistoryQuery, LoanHistoryRow, PageRequest},
  store::CancelSignal,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn run<W: Work>(s: &SqliteStore, work: W) -> shelf_core::Result<W::Output> {
  s.transact(RequestContext::anonymous(), work).await
}

fn at(hour: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 9, 11, hour, 0, 0).unwrap() }

fn book(title: &str, author: &str, copies: i64) -> Book {
  Book::create(title, author, "Tech", copies).unwrap()
}

// ─── Test works ──────────────────────────────────────────────────────────────

struct Save<A>(Vec<A>);

impl<A: Aggregate> Work for Save<A> {
  type Output = usize;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<usize> {
    for a in self.0 {
      uow.insert(a)?;
    }
    uow.commit()
  }
}

struct Modify<A>(A);

impl<A: Aggregate> Work for Modify<A> {
  type Output = usize;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<usize> {
    uow.update(self.0)?;
    uow.commit()
  }
}

struct Remove<A>(Uuid, PhantomData<A>);

impl<A: Aggregate> Work for Remove<A> {
  type Output = bool;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<bool> {
    let removed = uow.delete::<A>(self.0)?;
    uow.commit()?;
    Ok(removed)
  }
}

struct Fetch<A>(Uuid, PhantomData<A>);

impl<A: Aggregate> Work for Fetch<A> {
  type Output = Option<A>;

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<Option<A>> { uow.get(self.0) }
}

fn fetch<A>(id: Uuid) -> Fetch<A> { Fetch(id, PhantomData) }

struct Count<A>(PhantomData<A>);

impl<A: Aggregate> Work for Count<A> {
  type Output = u64;

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<u64> { uow.count::<A>() }
}

struct Search(BookQuery);

impl Work for Search {
  type Output = (Vec<Book>, u64);

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<Self::Output> {
    uow.search_books(&self.0)
  }
}

struct History(Uuid, HistoryQuery);

impl Work for History {
  type Output = (Vec<LoanHistoryRow>, u64);

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<Self::Output> {
    uow.loan_history(self.0, &self.1)
  }
}

struct ActiveLoan(Uuid, Uuid);

impl Work for ActiveLoan {
  type Output = Option<Loan>;

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<Option<Loan>> {
    uow.active_loan(self.0, self.1)
  }
}

struct ByEmail(&'static str);

impl Work for ByEmail {
  type Output = (Option<User>, bool);

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<Self::Output> {
    Ok((uow.user_by_email(self.0)?, uow.email_exists(self.0)?))
  }
}

// ─── Generic repository ──────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_book() {
  let s = store().await;
  let b = book("Domain-Driven Design", "Eric Evans", 3);

  let rows = run(&s, Save(vec![b.clone()])).await.unwrap();
  assert_eq!(rows, 1);

  let fetched = run(&s, fetch::<Book>(b.id())).await.unwrap().unwrap();
  assert_eq!(fetched.title(), "Domain-Driven Design");
  assert_eq!(fetched.available_copies(), 3);
  assert!(fetched.audit().created_at.is_some());
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(run(&s, fetch::<Book>(Uuid::new_v4())).await.unwrap().is_none());
  assert!(run(&s, fetch::<Loan>(Uuid::new_v4())).await.unwrap().is_none());
}

#[tokio::test]
async fn count_and_delete() {
  let s = store().await;
  let a = book("A", "X", 1);
  let b = book("B", "Y", 1);
  run(&s, Save(vec![a.clone(), b])).await.unwrap();
  assert_eq!(run(&s, Count::<Book>(PhantomData)).await.unwrap(), 2);

  assert!(run(&s, Remove::<Book>(a.id(), PhantomData)).await.unwrap());
  assert!(!run(&s, Remove::<Book>(a.id(), PhantomData)).await.unwrap());
  assert_eq!(run(&s, Count::<Book>(PhantomData)).await.unwrap(), 1);
}

#[tokio::test]
async fn update_missing_row_is_not_found() {
  let s = store().await;
  let err = run(&s, Modify(book("Ghost", "Nobody", 1))).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }), "{err:?}");
}

#[tokio::test]
async fn loans_and_users_round_trip() {
  let s = store().await;
  let user = User::create("Ada", "ada@example.com", "$argon2id$hash", Role::Admin).unwrap();
  let loan = Loan::create(user.id(), Uuid::new_v4(), Some(at(9))).unwrap();
  run(&s, Save(vec![user.clone()])).await.unwrap();
  run(&s, Save(vec![loan.clone()])).await.unwrap();

  let fetched = run(&s, fetch::<User>(user.id())).await.unwrap().unwrap();
  assert_eq!(fetched.role(), Role::Admin);
  assert_eq!(fetched.password_hash(), "$argon2id$hash");

  let fetched = run(&s, fetch::<Loan>(loan.id())).await.unwrap().unwrap();
  assert_eq!(fetched.loan_date(), at(9));
  assert_eq!(fetched.status(), LoanStatus::Borrowed);
}

// ─── Unit of work ────────────────────────────────────────────────────────────

/// Stage an insert, read it back, then either commit or bail out.
struct ReadYourWrites {
  book:   Book,
  commit: bool,
}

impl Work for ReadYourWrites {
  type Output = (Option<Book>, u64);

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<Self::Output> {
    let id = self.book.id();
    uow.insert(self.book)?;
    let seen = (uow.get::<Book>(id)?, uow.count::<Book>()?);
    if self.commit {
      uow.commit()?;
    }
    Ok(seen)
  }
}

#[tokio::test]
async fn staged_changes_are_visible_before_commit() {
  let s = store().await;
  let b = book("Refactoring", "Martin Fowler", 1);
  let (seen, count) = run(&s, ReadYourWrites { book: b.clone(), commit: true })
    .await
    .unwrap();
  assert_eq!(seen.map(|b| b.id()), Some(b.id()));
  assert_eq!(count, 1);
}

#[tokio::test]
async fn uncommitted_work_is_discarded() {
  let s = store().await;
  let b = book("Refactoring", "Martin Fowler", 1);
  run(&s, ReadYourWrites { book: b.clone(), commit: false }).await.unwrap();
  assert!(run(&s, fetch::<Book>(b.id())).await.unwrap().is_none());
}

/// Commit one book, then fail the whole unit of work on a later step.
struct FailAfterFirstWrite(Book, Book);

impl Work for FailAfterFirstWrite {
  type Output = ();

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<()> {
    uow.insert(self.0)?;
    uow.update(self.1)?;
    uow.commit()?;
    Ok(())
  }
}

#[tokio::test]
async fn flush_failure_rolls_back_every_change() {
  let s = store().await;
  let first = book("First", "A", 1);
  let missing = book("Missing", "B", 1);
  let err = run(&s, FailAfterFirstWrite(first.clone(), missing)).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
  assert!(run(&s, fetch::<Book>(first.id())).await.unwrap().is_none());
}

/// Cancel the request from inside the work, then try to commit.
struct CancelThenCommit(Book, CancelSignal);

impl Work for CancelThenCommit {
  type Output = usize;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> shelf_core::Result<usize> {
    uow.insert(self.0)?;
    self.1.cancel();
    uow.commit()
  }
}

#[tokio::test]
async fn cancelled_commit_writes_nothing() {
  let s = store().await;
  let b = book("Cancelled", "Nobody", 1);
  let signal = CancelSignal::new();
  let ctx = RequestContext::anonymous().with_cancel(signal.clone());

  let err = s.transact(ctx, CancelThenCommit(b.clone(), signal)).await.unwrap_err();
  assert!(matches!(err, Error::Cancelled));
  assert!(run(&s, fetch::<Book>(b.id())).await.unwrap().is_none());
}

#[tokio::test]
async fn already_cancelled_request_never_runs() {
  let s = store().await;
  let signal = CancelSignal::new();
  signal.cancel();
  let ctx = RequestContext::anonymous().with_cancel(signal);
  let err = s.transact(ctx, Save(vec![book("X", "Y", 1)])).await.unwrap_err();
  assert!(matches!(err, Error::Cancelled));
  assert_eq!(run(&s, Count::<Book>(PhantomData)).await.unwrap(), 0);
}

// ─── Audit stamping ──────────────────────────────────────────────────────────

#[tokio::test]
async fn commit_stamps_creator_then_modifier() {
  let s = store().await;
  let mut b = book("Clean Code", "Robert C. Martin", 2);

  let admin = RequestContext::for_actor(&ActorContext::user("admin-1"));
  s.transact(admin, Save(vec![b.clone()])).await.unwrap();

  b.reserve_one().unwrap();
  let clerk = RequestContext::for_actor(&ActorContext {
    user_id:      None,
    email:        Some("clerk@library.test".into()),
    display_name: Some("Clerk".into()),
  });
  s.transact(clerk, Modify(b.clone())).await.unwrap();

  let stored = run(&s, fetch::<Book>(b.id())).await.unwrap().unwrap();
  let audit = stored.audit();
  assert_eq!(audit.created_by.as_deref(), Some("admin-1"));
  assert_eq!(audit.modified_by.as_deref(), Some("clerk@library.test"));
  assert!(audit.created_at.is_some());
  assert!(audit.modified_at >= audit.created_at);
  assert_eq!(stored.available_copies(), 1);
}

#[tokio::test]
async fn anonymous_commit_leaves_actor_empty() {
  let s = store().await;
  let b = book("Anonymous", "Nobody", 1);
  run(&s, Save(vec![b.clone()])).await.unwrap();
  let stored = run(&s, fetch::<Book>(b.id())).await.unwrap().unwrap();
  assert!(stored.audit().created_by.is_none());
  assert!(stored.audit().modified_at.is_none());
}

// ─── Constraints ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_active_loan_for_same_pair_is_rejected() {
  let s = store().await;
  let (user, book_id) = (Uuid::new_v4(), Uuid::new_v4());
  run(&s, Save(vec![Loan::create(user, book_id, None).unwrap()])).await.unwrap();

  let err = run(&s, Save(vec![Loan::create(user, book_id, None).unwrap()]))
    .await
    .unwrap_err();
  assert!(
    matches!(err, Error::DuplicateActiveLoan { user_id, book_id: b } if user_id == user && b == book_id)
  );
}

#[tokio::test]
async fn returned_loan_frees_the_pair() {
  let s = store().await;
  let (user, book_id) = (Uuid::new_v4(), Uuid::new_v4());
  let mut first = Loan::create(user, book_id, Some(at(9))).unwrap();
  run(&s, Save(vec![first.clone()])).await.unwrap();

  first.mark_returned(Some(at(10))).unwrap();
  run(&s, Modify(first)).await.unwrap();
  run(&s, Save(vec![Loan::create(user, book_id, Some(at(11))).unwrap()]))
    .await
    .unwrap();

  let active = run(&s, ActiveLoan(user, book_id)).await.unwrap().unwrap();
  assert_eq!(active.loan_date(), at(11));
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
  let s = store().await;
  let a = User::create("A", "same@example.com", "h", Role::Reader).unwrap();
  let b = User::create("B", "same@example.com", "h", Role::Reader).unwrap();
  run(&s, Save(vec![a])).await.unwrap();
  let err = run(&s, Save(vec![b])).await.unwrap_err();
  assert!(matches!(err, Error::EmailTaken(ref e) if e == "same@example.com"));
}

#[tokio::test]
async fn user_by_email_is_exact() {
  let s = store().await;
  let u = User::create("Ada", "ada@example.com", "h", Role::Reader).unwrap();
  run(&s, Save(vec![u.clone()])).await.unwrap();

  let (found, exists) = run(&s, ByEmail("ada@example.com")).await.unwrap();
  assert_eq!(found.map(|u| u.id()), Some(u.id()));
  assert!(exists);

  let (found, exists) = run(&s, ByEmail("nobody@example.com")).await.unwrap();
  assert!(found.is_none());
  assert!(!exists);
}

// ─── Search ──────────────────────────────────────────────────────────────────

async fn seed_catalog(s: &SqliteStore) {
  run(s, Save(vec![
    book("Refactoring", "Martin Fowler", 1),
    book("Clean Code", "Robert C. Martin", 1),
    book("Clean Architecture", "Robert C. Martin", 1),
  ]))
  .await
  .unwrap();
}

fn search(text: Option<&str>, page: i64, page_size: i64) -> Search {
  Search(BookQuery {
    text: text.map(str::to_owned),
    page: PageRequest::normalize(page, page_size),
  })
}

#[tokio::test]
async fn search_pages_alphabetically() {
  let s = store().await;
  seed_catalog(&s).await;

  let (items, total) = run(&s, search(Some("clean"), 1, 1)).await.unwrap();
  assert_eq!(total, 2);
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].title(), "Clean Architecture");

  let (items, total) = run(&s, search(Some("clean"), 2, 1)).await.unwrap();
  assert_eq!(total, 2);
  assert_eq!(items[0].title(), "Clean Code");

  let (items, _) = run(&s, search(Some("clean"), 3, 1)).await.unwrap();
  assert!(items.is_empty());
}

#[tokio::test]
async fn search_matches_author_and_genre_case_insensitively() {
  let s = store().await;
  seed_catalog(&s).await;

  let (_, total) = run(&s, search(Some("FOWLER"), 1, 10)).await.unwrap();
  assert_eq!(total, 1);
  let (_, total) = run(&s, search(Some("tech"), 1, 10)).await.unwrap();
  assert_eq!(total, 3);
  let (_, total) = run(&s, search(Some("martin"), 1, 10)).await.unwrap();
  assert_eq!(total, 3);
}

#[tokio::test]
async fn blank_search_returns_everything() {
  let s = store().await;
  seed_catalog(&s).await;

  let (items, total) = run(&s, search(Some("   "), 1, 10)).await.unwrap();
  assert_eq!(total, 3);
  let titles: Vec<_> = items.iter().map(Book::title).collect();
  assert_eq!(titles, ["Clean Architecture", "Clean Code", "Refactoring"]);
}

#[tokio::test]
async fn search_treats_wildcards_literally() {
  let s = store().await;
  seed_catalog(&s).await;
  let (_, total) = run(&s, search(Some("%"), 1, 10)).await.unwrap();
  assert_eq!(total, 0);
}

// ─── History ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn history_filters_by_status_and_orders_newest_first() {
  let s = store().await;
  let user = Uuid::new_v4();
  let ddd = book("Domain-Driven Design", "Eric Evans", 1);
  let refactoring = book("Refactoring", "Martin Fowler", 1);
  run(&s, Save(vec![ddd.clone(), refactoring.clone()])).await.unwrap();

  let mut returned = Loan::create(user, ddd.id(), Some(at(8))).unwrap();
  returned.mark_returned(Some(at(9))).unwrap();
  let borrowed = Loan::create(user, refactoring.id(), Some(at(10))).unwrap();
  let other_user = Loan::create(Uuid::new_v4(), ddd.id(), Some(at(11))).unwrap();
  run(&s, Save(vec![returned.clone(), borrowed.clone(), other_user])).await.unwrap();

  let all = HistoryQuery::default();
  let (items, total) = run(&s, History(user, all)).await.unwrap();
  assert_eq!(total, 2);
  assert_eq!(items[0].loan_id, borrowed.id());
  assert_eq!(items[0].book_title, "Refactoring");
  assert_eq!(items[1].loan_id, returned.id());
  assert_eq!(items[1].status(), LoanStatus::Returned);

  let only_borrowed = HistoryQuery { status: Some(LoanStatus::Borrowed), ..Default::default() };
  let (items, total) = run(&s, History(user, only_borrowed)).await.unwrap();
  assert_eq!(total, 1);
  assert_eq!(items[0].loan_id, borrowed.id());

  let only_returned = HistoryQuery { status: Some(LoanStatus::Returned), ..Default::default() };
  let (items, _) = run(&s, History(user, only_returned)).await.unwrap();
  assert_eq!(items[0].return_date, Some(at(9)));
}

#[tokio::test]
async fn history_text_filter_uses_book_fields() {
  let s = store().await;
  let user = Uuid::new_v4();
  let ddd = book("Domain-Driven Design", "Eric Evans", 1);
  let refactoring = book("Refactoring", "Martin Fowler", 1);
  run(&s, Save(vec![ddd.clone(), refactoring.clone()])).await.unwrap();
  run(&s, Save(vec![
    Loan::create(user, ddd.id(), Some(at(8))).unwrap(),
    Loan::create(user, refactoring.id(), Some(at(9))).unwrap(),
  ]))
  .await
  .unwrap();

  let query = HistoryQuery {
    text: Some("evans".into()),
    page: PageRequest::normalize(1, 5),
    ..Default::default()
  };
  let (items, total) = run(&s, History(user, query)).await.unwrap();
  assert_eq!(total, 1);
  assert_eq!(items[0].book_id, ddd.id());
  assert_eq!(items[0].author, "Eric Evans");
}
