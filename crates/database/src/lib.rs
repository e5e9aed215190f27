//! # Order Database Crate
//!
//! The persistent store for mirrored spreadsheet orders.
//!
//! - `connect` / `run_migrations`: build the Postgres pool and bring the
//!   `orders` table up to date.
//! - `OrderStore`: the storage seam every job and endpoint is written against.
//! - `DbRepository`: the Postgres implementation.
//! - `MemoryOrderStore`: an in-process implementation with the same
//!   transactional guarantees, used by the test suites.

pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;

pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::MemoryOrderStore;
pub use repository::{DbRepository, OrderStore};
