//! JSON REST API for Kubera.
//!
//! Exposes an axum [`Router`] backed by any
//! [`kubera_core::store::ContractStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", kubera_api::api_router(store.clone()))
//! ```

pub mod amendments;
pub mod contracts;
pub mod entities;
pub mod error;
pub mod temporal;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use kubera_core::store::ContractStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ContractStore + 'static,
{
  Router::new()
    // Entities
    .route("/providers", post(entities::create_provider::<S>))
    .route("/providers/{id}", get(entities::get_provider::<S>))
    .route("/payors", post(entities::create_payor::<S>))
    .route("/payors/{id}", get(entities::get_payor::<S>))
    .route("/documents", post(entities::store_document::<S>))
    .route("/documents/{id}", get(entities::get_document::<S>))
    // Contracts and terms
    .route("/contracts", get(contracts::list::<S>).post(contracts::create::<S>))
    .route("/contracts/{id}", get(contracts::get_one::<S>))
    .route("/contracts/{id}/terms", get(contracts::terms::<S>))
    .route("/contracts/{id}/terms/{name}", get(contracts::term::<S>))
    .route("/contracts/{id}/terms/{name}/history", get(contracts::history::<S>))
    // Amendments
    .route(
      "/contracts/{id}/amendments",
      get(amendments::list::<S>).post(amendments::commit::<S>),
    )
    // Temporal queries
    .route("/contracts/{id}/as-of", get(temporal::as_of::<S>))
    .route("/contracts/{id}/diff", get(temporal::diff::<S>))
    .route("/contracts/{id}/verify", get(temporal::verify::<S>))
    .with_state(store)
}
