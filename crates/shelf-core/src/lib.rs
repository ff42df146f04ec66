//! Domain types and ports for the Shelf lending library.
//!
//! This crate has no database or transport dependencies. Storage backends
//! implement [`store::LibraryStore`]; services in `shelf-lending` are written
//! against that trait.

pub mod aggregate;
pub mod audit;
pub mod book;
pub mod changes;
pub mod error;
pub mod loan;
pub mod password;
pub mod query;
pub mod store;
pub mod user;

pub use aggregate::{Aggregate, AggregateKind};
pub use book::Book;
pub use error::{Error, Result};
pub use loan::{Loan, LoanStatus};
pub use store::{LibraryStore, RequestContext, UnitOfWork, Work};
pub use user::{Identity, Role, User};
