//! Book: a catalog title and the number of copies currently on the shelf.

use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result, audit::AuditMetadata};

/// Largest copy count a book can be created or edited with.
///
/// Every increment past this comes from returning a copy that was reserved
/// first, so the stored count stays within `u32`.
pub const MAX_COPIES: u32 = i32::MAX as u32;

/// A catalog entry. Fields are private; every mutation goes through a
/// validating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
  id:               Uuid,
  title:            String,
  author:           String,
  genre:            String,
  available_copies: u32,
  audit:            AuditMetadata,
}

impl Book {
  /// Create a new book with a fresh id.
  ///
  /// Fails with [`Error::Validation`] if any text field is blank or `copies`
  /// is negative or above [`MAX_COPIES`].
  pub fn create(title: &str, author: &str, genre: &str, copies: i64) -> Result<Self> {
    Ok(Self {
      id:               Uuid::new_v4(),
      title:            required("title", title)?,
      author:           required("author", author)?,
      genre:            required("genre", genre)?,
      available_copies: copy_count(copies)?,
      audit:            AuditMetadata::default(),
    })
  }

  /// Rebuild a book loaded from storage, re-checking every invariant.
  pub fn restore(
    id: Uuid,
    title: &str,
    author: &str,
    genre: &str,
    copies: i64,
    audit: AuditMetadata,
  ) -> Result<Self> {
    if id.is_nil() {
      return Err(Error::InvalidReference("book id"));
    }
    let available_copies = u32::try_from(copies)
      .map_err(|_| Error::validation(format!("stored copy count out of range: {copies}")))?;
    Ok(Self {
      id,
      title: required("title", title)?,
      author: required("author", author)?,
      genre: required("genre", genre)?,
      available_copies,
      audit,
    })
  }

  pub fn id(&self) -> Uuid { self.id }

  pub fn title(&self) -> &str { &self.title }

  pub fn author(&self) -> &str { &self.author }

  pub fn genre(&self) -> &str { &self.genre }

  pub fn available_copies(&self) -> u32 { self.available_copies }

  pub fn audit(&self) -> &AuditMetadata { &self.audit }

  pub(crate) fn audit_mut(&mut self) -> &mut AuditMetadata { &mut self.audit }

  // ── Setters ───────────────────────────────────────────────────────────────

  pub fn set_title(&mut self, title: &str) -> Result<()> {
    self.title = required("title", title)?;
    Ok(())
  }

  pub fn set_author(&mut self, author: &str) -> Result<()> {
    self.author = required("author", author)?;
    Ok(())
  }

  pub fn set_genre(&mut self, genre: &str) -> Result<()> {
    self.genre = required("genre", genre)?;
    Ok(())
  }

  pub fn set_available_copies(&mut self, copies: i64) -> Result<()> {
    self.available_copies = copy_count(copies)?;
    Ok(())
  }

  // ── Inventory ─────────────────────────────────────────────────────────────

  /// `true` if at least `quantity` copies are on the shelf.
  pub fn has_availability(&self, quantity: u32) -> bool {
    self.available_copies >= quantity
  }

  /// Take one copy off the shelf.
  pub fn reserve_one(&mut self) -> Result<()> {
    if !self.has_availability(1) {
      return Err(Error::OutOfStock(self.id));
    }
    self.available_copies -= 1;
    Ok(())
  }

  /// Put one copy back. A returned copy always re-enters inventory, so there
  /// is no check against the original count. The count saturates at
  /// `u32::MAX`, which only a book created with [`MAX_COPIES`] and then
  /// returned more often than borrowed could reach.
  pub fn return_one(&mut self) {
    self.available_copies = self.available_copies.saturating_add(1);
  }
}

fn required(field: &str, value: &str) -> Result<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(Error::validation(format!("{field} is required")));
  }
  Ok(trimmed.to_owned())
}

fn copy_count(copies: i64) -> Result<u32> {
  u32::try_from(copies)
    .ok()
    .filter(|c| *c <= MAX_COPIES)
    .ok_or_else(|| {
      Error::validation(format!("available copies must be between 0 and {MAX_COPIES}, got {copies}"))
    })
}
