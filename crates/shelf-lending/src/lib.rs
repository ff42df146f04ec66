//! Application services for the Shelf lending library.
//!
//! Every service is generic over a [`shelf_core::LibraryStore`] and holds it
//! behind an `Arc`, so services are cheap to clone and share across tasks.
//! Each public operation runs as exactly one unit of work.

pub mod auth;
pub mod catalog;
pub mod history;
pub mod lending;
pub mod password;

pub use auth::{AuthService, SeedAccount};
pub use catalog::{BookUpdate, CatalogService};
pub use history::{HistoryService, LoanHistoryItem};
pub use lending::{BorrowReceipt, LendingService, ReturnOutcome};
pub use password::Argon2Hasher;

#[cfg(test)]
mod testing;
