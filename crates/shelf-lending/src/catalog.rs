//! Catalog administration and search.

use std::sync::Arc;

use serde::Deserialize;
use shelf_core::{
  AggregateKind, Book, Error, LibraryStore, RequestContext, Result, UnitOfWork, Work,
  query::{BookQuery, Page, PageRequest},
};
use tracing::info;
use uuid::Uuid;

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// A partial edit of a book's descriptive fields. `None` fields are left
/// unchanged; every present field goes through the book's validating setter.
///
/// The copy count is not editable here: it only moves through borrow and
/// return.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookUpdate {
  pub title:  Option<String>,
  pub author: Option<String>,
  pub genre:  Option<String>,
}

impl BookUpdate {
  pub fn is_empty(&self) -> bool {
    self.title.is_none() && self.author.is_none() && self.genre.is_none()
  }

  pub fn apply(&self, book: &mut Book) -> Result<()> {
    if let Some(title) = &self.title {
      book.set_title(title)?;
    }
    if let Some(author) = &self.author {
      book.set_author(author)?;
    }
    if let Some(genre) = &self.genre {
      book.set_genre(genre)?;
    }
    Ok(())
  }
}

// ─── Works ───────────────────────────────────────────────────────────────────

struct AddBook(Book);

impl Work for AddBook {
  type Output = Uuid;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<Uuid> {
    let id = self.0.id();
    uow.insert(self.0)?;
    uow.commit()?;
    Ok(id)
  }
}

struct GetBook(Uuid);

impl Work for GetBook {
  type Output = Book;

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<Book> {
    uow
      .get::<Book>(self.0)?
      .ok_or_else(|| Error::not_found(AggregateKind::Book, self.0))
  }
}

struct ListBooks;

impl Work for ListBooks {
  type Output = Vec<Book>;

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<Vec<Book>> {
    let mut books = uow.get_all::<Book>()?;
    books.sort_by(|a, b| a.title().cmp(b.title()).then(a.id().cmp(&b.id())));
    Ok(books)
  }
}

struct SearchBooks(BookQuery);

impl Work for SearchBooks {
  type Output = (Vec<Book>, u64);

  const READ_ONLY: bool = true;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<Self::Output> {
    uow.search_books(&self.0)
  }
}

struct UpdateBook {
  id:      Uuid,
  changes: BookUpdate,
}

impl Work for UpdateBook {
  type Output = Book;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<Book> {
    let mut book = uow
      .get::<Book>(self.id)?
      .ok_or_else(|| Error::not_found(AggregateKind::Book, self.id))?;
    self.changes.apply(&mut book)?;
    uow.update(book.clone())?;
    uow.commit()?;
    Ok(book)
  }
}

struct DeleteBook(Uuid);

impl Work for DeleteBook {
  type Output = bool;

  fn run<U: UnitOfWork>(self, uow: &mut U) -> Result<bool> {
    let removed = uow.delete::<Book>(self.0)?;
    if removed {
      uow.commit()?;
    }
    Ok(removed)
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Book administration and catalog search over any [`LibraryStore`].
pub struct CatalogService<S> {
  store: Arc<S>,
}

impl<S> Clone for CatalogService<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: LibraryStore> CatalogService<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Add a title to the catalog and return its id.
  pub async fn add_book(
    &self,
    ctx: RequestContext,
    title: &str,
    author: &str,
    genre: &str,
    copies: i64,
  ) -> Result<Uuid> {
    let book = Book::create(title, author, genre, copies)?;
    let id = self.store.transact(ctx, AddBook(book)).await?;
    info!(book_id = %id, title, copies, "book added");
    Ok(id)
  }

  pub async fn get_book(&self, ctx: RequestContext, id: Uuid) -> Result<Book> {
    self.store.transact(ctx, GetBook(id)).await
  }

  /// Every book, ordered by title.
  pub async fn list_books(&self, ctx: RequestContext) -> Result<Vec<Book>> {
    self.store.transact(ctx, ListBooks).await
  }

  /// Case-insensitive search over title, author and genre.
  ///
  /// `page <= 0` and `page_size <= 0` fall back to the first page and the
  /// default page size.
  pub async fn search(
    &self,
    ctx: RequestContext,
    text: Option<&str>,
    page: i64,
    page_size: i64,
  ) -> Result<Page<Book>> {
    let request = PageRequest::normalize(page, page_size);
    let query = BookQuery { text: text.map(str::to_owned), page: request };
    let (items, total) = self.store.transact(ctx, SearchBooks(query)).await?;
    Ok(Page::new(items, request, total))
  }

  pub async fn update_book(
    &self,
    ctx: RequestContext,
    id: Uuid,
    changes: BookUpdate,
  ) -> Result<Book> {
    if changes.is_empty() {
      return self.get_book(ctx, id).await;
    }
    let book = self.store.transact(ctx, UpdateBook { id, changes }).await?;
    info!(book_id = %id, "book updated");
    Ok(book)
  }

  /// Remove a book. Returns `false` if it did not exist.
  ///
  /// Loans that reference the book are kept.
  pub async fn delete_book(&self, ctx: RequestContext, id: Uuid) -> Result<bool> {
    let removed = self.store.transact(ctx, DeleteBook(id)).await?;
    if removed {
      info!(book_id = %id, "book deleted");
    }
    Ok(removed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{ctx, memory_store};

  async fn seeded() -> CatalogService<shelf_store_sqlite::SqliteStore> {
    let catalog = CatalogService::new(memory_store().await);
    for (title, author) in [
      ("Clean Architecture", "Robert C. Martin"),
      ("Clean Code", "Robert C. Martin"),
      ("Refactoring", "Martin Fowler"),
    ] {
      catalog.add_book(ctx(), title, author, "Tech", 1).await.unwrap();
    }
    catalog
  }

  #[tokio::test]
  async fn add_book_validates_eagerly() {
    let catalog = CatalogService::new(memory_store().await);
    let err = catalog.add_book(ctx(), " ", "Author", "Genre", 1).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let err = catalog.add_book(ctx(), "Title", "Author", "Genre", -1).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(catalog.list_books(ctx()).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn get_unknown_book_is_not_found() {
    let catalog = CatalogService::new(memory_store().await);
    let err = catalog.get_book(ctx(), Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { kind: AggregateKind::Book, .. }));
  }

  #[tokio::test]
  async fn list_books_is_title_ordered() {
    let catalog = seeded().await;
    let titles: Vec<_> = catalog
      .list_books(ctx())
      .await
      .unwrap()
      .iter()
      .map(|b| b.title().to_owned())
      .collect();
    assert_eq!(titles, ["Clean Architecture", "Clean Code", "Refactoring"]);
  }

  #[tokio::test]
  async fn search_pages_one_at_a_time() {
    let catalog = seeded().await;

    let first = catalog.search(ctx(), Some("clean"), 1, 1).await.unwrap();
    assert_eq!(first.total, 2);
    assert_eq!(first.total_pages(), 2);
    assert_eq!(first.items[0].title(), "Clean Architecture");

    let second = catalog.search(ctx(), Some("clean"), 2, 1).await.unwrap();
    assert_eq!(second.items[0].title(), "Clean Code");
  }

  #[tokio::test]
  async fn search_normalises_paging() {
    let catalog = seeded().await;
    let page = catalog.search(ctx(), None, 0, -5).await.unwrap();
    assert_eq!((page.page, page.page_size), (1, 10));
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total, 3);
  }

  #[tokio::test]
  async fn search_far_past_the_end_is_empty() {
    let catalog = seeded().await;
    let page = catalog.search(ctx(), None, 5_000_000_000, 10).await.unwrap();
    assert_eq!(page.page, u32::MAX);
    assert!(page.items.is_empty());
    assert_eq!(page.total, 3);
  }

  #[tokio::test]
  async fn update_book_applies_setters() {
    let catalog = seeded().await;
    let id = catalog.add_book(ctx(), "DDD", "Evans", "Tech", 1).await.unwrap();

    let changes = BookUpdate {
      title: Some("Domain-Driven Design".into()),
      author: Some("Eric Evans".into()),
      ..Default::default()
    };
    let book = catalog.update_book(ctx(), id, changes).await.unwrap();
    assert_eq!(book.title(), "Domain-Driven Design");
    assert_eq!(book.author(), "Eric Evans");
    assert_eq!(book.available_copies(), 1);
    assert!(book.audit().modified_at.is_none(), "returned copy is pre-commit");

    let stored = catalog.get_book(ctx(), id).await.unwrap();
    assert_eq!(stored.title(), "Domain-Driven Design");
    assert!(stored.audit().modified_at.is_some());
  }

  #[tokio::test]
  async fn update_book_rejects_invalid_values() {
    let catalog = seeded().await;
    let id = catalog.add_book(ctx(), "DDD", "Evans", "Tech", 1).await.unwrap();
    let changes = BookUpdate {
      title: Some("Domain-Driven Design".into()),
      genre: Some("  ".into()),
      ..Default::default()
    };
    let err = catalog.update_book(ctx(), id, changes).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let stored = catalog.get_book(ctx(), id).await.unwrap();
    assert_eq!((stored.title(), stored.genre()), ("DDD", "Tech"));
  }

  #[tokio::test]
  async fn update_unknown_book_is_not_found() {
    let catalog = seeded().await;
    let changes = BookUpdate { genre: Some("Fiction".into()), ..Default::default() };
    let err = catalog.update_book(ctx(), Uuid::new_v4(), changes).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
  }

  #[tokio::test]
  async fn delete_book_reports_absence() {
    let catalog = seeded().await;
    let id = catalog.add_book(ctx(), "Temp", "Nobody", "Misc", 1).await.unwrap();
    assert!(catalog.delete_book(ctx(), id).await.unwrap());
    assert!(!catalog.delete_book(ctx(), id).await.unwrap());
  }
}
