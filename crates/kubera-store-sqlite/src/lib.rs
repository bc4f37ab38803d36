//! SQLite backend for the Kubera contract ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Amendment commits run inside a single
//! `IMMEDIATE` transaction; the term ledger's current values are updated with
//! compare-and-swap statements so a commit racing another one fails instead
//! of overwriting it.

mod encode;
mod ledger;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
