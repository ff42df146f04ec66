//! [`SqliteSession`]: the unit of work for one SQLite transaction.
//!
//! Writes are staged in a [`ChangeSet`] and reach the database only in
//! [`UnitOfWork::commit`], which stamps audit metadata, flushes every change
//! and commits. Dropping a session that was never committed rolls the
//! transaction back.

use chrono::Utc;
use rusqlite::{Connection, Row, Transaction, params};
use tracing::debug;
use uuid::Uuid;

use shelf_core::{
  Aggregate, AggregateKind, Book, Loan, User,
  aggregate::Record,
  changes::{Change, ChangeSet},
  query::{BookQuery, HistoryQuery, LoanHistoryRow, search_text},
  store::{CancelSignal, RequestContext, UnitOfWork},
};

use crate::{
  Error, Result,
  encode::{
    BOOK_COLUMNS, LOAN_COLUMNS, RawAudit, RawBook, RawHistoryRow, RawLoan, RawUser,
    USER_COLUMNS, encode_dt, encode_role, encode_status, encode_uuid, like_pattern,
  },
};

// ─── Tables ──────────────────────────────────────────────────────────────────

struct Table {
  name:      &'static str,
  id_column: &'static str,
  columns:   &'static str,
  order_by:  &'static str,
}

impl Table {
  fn of(kind: AggregateKind) -> Self {
    match kind {
      AggregateKind::Book => Self {
        name:      "books",
        id_column: "book_id",
        columns:   BOOK_COLUMNS,
        order_by:  "title, book_id",
      },
      AggregateKind::Loan => Self {
        name:      "loans",
        id_column: "loan_id",
        columns:   LOAN_COLUMNS,
        order_by:  "loan_date, loan_id",
      },
      AggregateKind::User => Self {
        name:      "users",
        id_column: "user_id",
        columns:   USER_COLUMNS,
        order_by:  "email",
      },
    }
  }
}

fn decode_record(kind: AggregateKind, row: &Row<'_>) -> Result<Record> {
  Ok(match kind {
    AggregateKind::Book => Record::Book(RawBook::from_row(row)?.into_book()?),
    AggregateKind::Loan => Record::Loan(RawLoan::from_row(row)?.into_loan()?),
    AggregateKind::User => Record::User(RawUser::from_row(row)?.into_user()?),
  })
}

fn load_one(conn: &Connection, kind: AggregateKind, id: Uuid) -> Result<Option<Record>> {
  let table = Table::of(kind);
  let sql = format!(
    "SELECT {} FROM {} WHERE {} = ?1",
    table.columns, table.name, table.id_column
  );
  let mut stmt = conn.prepare_cached(&sql)?;
  let mut rows = stmt.query(params![encode_uuid(id)])?;
  match rows.next()? {
    Some(row) => Ok(Some(decode_record(kind, row)?)),
    None => Ok(None),
  }
}

fn load_all(conn: &Connection, kind: AggregateKind) -> Result<Vec<Record>> {
  let table = Table::of(kind);
  let sql = format!(
    "SELECT {} FROM {} ORDER BY {}",
    table.columns, table.name, table.order_by
  );
  let mut stmt = conn.prepare_cached(&sql)?;
  let mut rows = stmt.query([])?;
  let mut out = Vec::new();
  while let Some(row) = rows.next()? {
    out.push(decode_record(kind, row)?);
  }
  Ok(out)
}

fn count_rows(conn: &Connection, kind: AggregateKind) -> Result<u64> {
  let table = Table::of(kind);
  let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name), [], |r| {
    r.get(0)
  })?;
  Ok(to_u64(n))
}

fn to_u64(n: i64) -> u64 { u64::try_from(n).unwrap_or(0) }

fn to_i64(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

// ─── Flushing ────────────────────────────────────────────────────────────────

fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

/// Map a unique-index violation to the domain error it stands for.
fn unique_violation_as(err: rusqlite::Error, domain: shelf_core::Error) -> Error {
  if is_unique_violation(&err) { Error::Core(domain) } else { Error::Sqlite(err) }
}

fn insert_record(conn: &Connection, record: &Record) -> Result<usize> {
  let audit = RawAudit::from_meta(record.audit());
  match record {
    Record::Book(b) => Ok(conn.execute(
      &format!("INSERT INTO books ({BOOK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
      params![
        encode_uuid(b.id()),
        b.title(),
        b.author(),
        b.genre(),
        i64::from(b.available_copies()),
        audit.created_at,
        audit.created_by,
        audit.modified_at,
        audit.modified_by,
      ],
    )?),
    Record::Loan(l) => conn
      .execute(
        &format!("INSERT INTO loans ({LOAN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
          encode_uuid(l.id()),
          encode_uuid(l.user_id()),
          encode_uuid(l.book_id()),
          encode_dt(l.loan_date()),
          l.return_date().map(encode_dt),
          audit.created_at,
          audit.created_by,
          audit.modified_at,
          audit.modified_by,
        ],
      )
      .map_err(|e| {
        unique_violation_as(e, shelf_core::Error::DuplicateActiveLoan {
          user_id: l.user_id(),
          book_id: l.book_id(),
        })
      }),
    Record::User(u) => conn
      .execute(
        &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
          encode_uuid(u.id()),
          u.name(),
          u.email(),
          u.password_hash(),
          encode_role(u.role()),
          audit.created_at,
          audit.created_by,
          audit.modified_at,
          audit.modified_by,
        ],
      )
      .map_err(|e| unique_violation_as(e, shelf_core::Error::EmailTaken(u.email().to_owned()))),
  }
}

/// Update the mutable columns of an existing row. `created_*` is never
/// rewritten.
fn update_record(conn: &Connection, record: &Record) -> Result<usize> {
  let audit = RawAudit::from_meta(record.audit());
  let rows = match record {
    Record::Book(b) => conn.execute(
      "UPDATE books
          SET title = ?2, author = ?3, genre = ?4, available_copies = ?5,
              modified_at = ?6, modified_by = ?7
        WHERE book_id = ?1",
      params![
        encode_uuid(b.id()),
        b.title(),
        b.author(),
        b.genre(),
        i64::from(b.available_copies()),
        audit.modified_at,
        audit.modified_by,
      ],
    )?,
    Record::Loan(l) => conn.execute(
      "UPDATE loans
          SET return_date = ?2, modified_at = ?3, modified_by = ?4
        WHERE loan_id = ?1",
      params![
        encode_uuid(l.id()),
        l.return_date().map(encode_dt),
        audit.modified_at,
        audit.modified_by,
      ],
    )?,
    Record::User(u) => conn
      .execute(
        "UPDATE users
            SET name = ?2, email = ?3, password_hash = ?4, role = ?5,
                modified_at = ?6, modified_by = ?7
          WHERE user_id = ?1",
        params![
          encode_uuid(u.id()),
          u.name(),
          u.email(),
          u.password_hash(),
          encode_role(u.role()),
          audit.modified_at,
          audit.modified_by,
        ],
      )
      .map_err(|e| unique_violation_as(e, shelf_core::Error::EmailTaken(u.email().to_owned())))?,
  };
  if rows == 0 {
    return Err(shelf_core::Error::not_found(record.kind(), record.id()).into());
  }
  Ok(rows)
}

fn write_change(conn: &Connection, change: Change) -> Result<usize> {
  match change {
    Change::Insert(record) => insert_record(conn, &record),
    Change::Update(record) => update_record(conn, &record),
    Change::Delete { kind, id } => {
      let table = Table::of(kind);
      Ok(conn.execute(
        &format!("DELETE FROM {} WHERE {} = ?1", table.name, table.id_column),
        params![encode_uuid(id)],
      )?)
    }
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

pub(crate) struct SqliteSession<'c> {
  tx:      Option<Transaction<'c>>,
  changes: ChangeSet,
  actor:   Option<String>,
  cancel:  CancelSignal,
}

impl<'c> SqliteSession<'c> {
  pub(crate) fn new(tx: Transaction<'c>, ctx: RequestContext) -> Self {
    Self { tx: Some(tx), changes: ChangeSet::new(), actor: ctx.actor, cancel: ctx.cancel }
  }

  fn conn(&self) -> Result<&Connection> { self.tx.as_deref().ok_or(Error::Finished) }

  fn search_books_sql(&self, query: &BookQuery) -> Result<(Vec<Book>, u64)> {
    let conn = self.conn()?;
    let pattern = search_text(query.text.as_deref()).map(like_pattern);
    let filter = "?1 IS NULL
                  OR lower(title)  LIKE ?1 ESCAPE '\\'
                  OR lower(author) LIKE ?1 ESCAPE '\\'
                  OR lower(genre)  LIKE ?1 ESCAPE '\\'";

    let total: i64 = conn.query_row(
      &format!("SELECT COUNT(*) FROM books WHERE {filter}"),
      params![pattern],
      |r| r.get(0),
    )?;

    let mut stmt = conn.prepare_cached(&format!(
      "SELECT {BOOK_COLUMNS} FROM books WHERE {filter}
        ORDER BY title, book_id
        LIMIT ?2 OFFSET ?3"
    ))?;
    let raws = stmt
      .query_map(
        params![pattern, to_i64(query.page.limit()), to_i64(query.page.offset())],
        RawBook::from_row,
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    let books = raws.into_iter().map(RawBook::into_book).collect::<Result<Vec<_>>>()?;
    Ok((books, to_u64(total)))
  }

  fn active_loan_sql(&self, user_id: Uuid, book_id: Uuid) -> Result<Option<Loan>> {
    let mut stmt = self.conn()?.prepare_cached(&format!(
      "SELECT {LOAN_COLUMNS} FROM loans
        WHERE user_id = ?1 AND book_id = ?2 AND return_date IS NULL"
    ))?;
    let mut rows = stmt.query(params![encode_uuid(user_id), encode_uuid(book_id)])?;
    match rows.next()? {
      Some(row) => Ok(Some(RawLoan::from_row(row)?.into_loan()?)),
      None => Ok(None),
    }
  }

  fn loan_history_sql(
    &self,
    user_id: Uuid,
    query: &HistoryQuery,
  ) -> Result<(Vec<LoanHistoryRow>, u64)> {
    let conn = self.conn()?;
    let user = encode_uuid(user_id);
    let pattern = search_text(query.text.as_deref()).map(like_pattern);
    let status = query.status.map(encode_status);
    let from = "FROM loans l JOIN books b ON b.book_id = l.book_id
               WHERE l.user_id = ?1
                 AND (?2 IS NULL
                      OR lower(b.title)  LIKE ?2 ESCAPE '\\'
                      OR lower(b.author) LIKE ?2 ESCAPE '\\'
                      OR lower(b.genre)  LIKE ?2 ESCAPE '\\')
                 AND (?3 IS NULL
                      OR (?3 = 'borrowed' AND l.return_date IS NULL)
                      OR (?3 = 'returned' AND l.return_date IS NOT NULL))";

    let total: i64 = conn.query_row(
      &format!("SELECT COUNT(*) {from}"),
      params![user, pattern, status],
      |r| r.get(0),
    )?;

    let mut stmt = conn.prepare_cached(&format!(
      "SELECT l.loan_id, l.book_id, b.title, b.author, b.genre, l.loan_date, l.return_date
       {from}
       ORDER BY l.loan_date DESC, l.loan_id
       LIMIT ?4 OFFSET ?5"
    ))?;
    let raws = stmt
      .query_map(
        params![user, pattern, status, to_i64(query.page.limit()), to_i64(query.page.offset())],
        RawHistoryRow::from_row,
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    let items = raws
      .into_iter()
      .map(RawHistoryRow::into_row)
      .collect::<Result<Vec<_>>>()?;
    Ok((items, to_u64(total)))
  }

  fn user_by_email_sql(&self, email: &str) -> Result<Option<User>> {
    let mut stmt = self
      .conn()?
      .prepare_cached(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;
    let mut rows = stmt.query(params![email])?;
    match rows.next()? {
      Some(row) => Ok(Some(RawUser::from_row(row)?.into_user()?)),
      None => Ok(None),
    }
  }

  fn flush_and_commit(&mut self) -> Result<usize> {
    let tx = self.tx.take().ok_or(Error::Finished)?;
    self.changes.stamp(self.actor.as_deref(), Utc::now());
    let mut rows = 0;
    for change in self.changes.drain() {
      rows += write_change(&tx, change)?;
    }
    tx.commit()?;
    Ok(rows)
  }
}

impl UnitOfWork for SqliteSession<'_> {
  fn get<A: Aggregate>(&mut self, id: Uuid) -> shelf_core::Result<Option<A>> {
    if let Some(staged) = self.changes.staged::<A>(id) {
      return Ok(staged);
    }
    let record = load_one(self.conn()?, A::KIND, id)?;
    Ok(record.and_then(A::from_record))
  }

  fn get_all<A: Aggregate>(&mut self) -> shelf_core::Result<Vec<A>> {
    let committed = load_all(self.conn()?, A::KIND)?
      .into_iter()
      .filter_map(A::from_record)
      .collect();
    Ok(self.changes.overlay(committed))
  }

  fn count<A: Aggregate>(&mut self) -> shelf_core::Result<u64> {
    if self.changes.touches(A::KIND) {
      return Ok(self.get_all::<A>()?.len() as u64);
    }
    Ok(count_rows(self.conn()?, A::KIND)?)
  }

  fn insert<A: Aggregate>(&mut self, aggregate: A) -> shelf_core::Result<()> {
    self.conn()?;
    self.changes.insert(aggregate);
    Ok(())
  }

  fn update<A: Aggregate>(&mut self, aggregate: A) -> shelf_core::Result<()> {
    self.conn()?;
    self.changes.update(aggregate);
    Ok(())
  }

  fn delete<A: Aggregate>(&mut self, id: Uuid) -> shelf_core::Result<bool> {
    if self.get::<A>(id)?.is_none() {
      return Ok(false);
    }
    self.changes.delete(A::KIND, id);
    Ok(true)
  }

  fn search_books(&mut self, query: &BookQuery) -> shelf_core::Result<(Vec<Book>, u64)> {
    Ok(self.search_books_sql(query)?)
  }

  fn active_loan(&mut self, user_id: Uuid, book_id: Uuid) -> shelf_core::Result<Option<Loan>> {
    Ok(self.active_loan_sql(user_id, book_id)?)
  }

  fn loan_history(
    &mut self,
    user_id: Uuid,
    query: &HistoryQuery,
  ) -> shelf_core::Result<(Vec<LoanHistoryRow>, u64)> {
    Ok(self.loan_history_sql(user_id, query)?)
  }

  fn user_by_email(&mut self, email: &str) -> shelf_core::Result<Option<User>> {
    Ok(self.user_by_email_sql(email)?)
  }

  fn commit(&mut self) -> shelf_core::Result<usize> {
    if self.cancel.is_cancelled() {
      self.tx = None;
      self.changes = ChangeSet::new();
      debug!("unit of work cancelled before commit; rolled back");
      return Err(shelf_core::Error::Cancelled);
    }
    let rows = self.flush_and_commit()?;
    debug!(rows, actor = self.actor.as_deref(), "committed unit of work");
    Ok(rows)
  }
}
