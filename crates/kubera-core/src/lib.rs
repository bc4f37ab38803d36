//! Core types and trait definitions for the Kubera contract ledger.
//!
//! This crate holds the domain model (contracts, terms, revisions,
//! amendments), the amendment validation state machine and the pure temporal
//! reconstruction logic. It is deliberately free of HTTP and database
//! dependencies; storage backends implement [`store::ContractStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod amendment;
pub mod contract;
pub mod entity;
pub mod error;
pub mod ids;
pub mod policy;
pub mod store;
pub mod temporal;
pub mod term;
pub mod time;

pub use error::{DomainError, Error, Result};
