//! Point-in-time queries.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/contracts/{id}/as-of` | `?at=` RFC 3339 or `YYYY-MM-DD`; defaults to now |
//! | `GET`  | `/contracts/{id}/diff` | `?from=&to=`, both required |
//! | `GET`  | `/contracts/{id}/verify` | 500 if a revision chain is corrupt |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::Utc;
use kubera_core::{
  ids::ContractId,
  store::{ContractStore, VerificationReport},
  temporal::{TermChange, TermSnapshot},
  time::parse_instant,
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AsOfParams {
  pub at: Option<String>,
}

/// `GET /contracts/{id}/as-of[?at=<instant>]`
pub async fn as_of<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<ContractId>,
  Query(params): Query<AsOfParams>,
) -> Result<Json<TermSnapshot>, ApiError> {
  let at = match params.at.as_deref() {
    Some(s) => parse_instant(s)?,
    None => Utc::now(),
  };
  let snapshot = store.as_of(id, at).await.map_err(ApiError::from_store)?;
  Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct DiffParams {
  pub from: String,
  pub to:   String,
}

/// `GET /contracts/{id}/diff?from=<instant>&to=<instant>`
pub async fn diff<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<ContractId>,
  Query(params): Query<DiffParams>,
) -> Result<Json<Vec<TermChange>>, ApiError> {
  let from = parse_instant(&params.from)?;
  let to = parse_instant(&params.to)?;
  let changes = store.diff(id, from, to).await.map_err(ApiError::from_store)?;
  Ok(Json(changes))
}

/// `GET /contracts/{id}/verify`
pub async fn verify<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<ContractId>,
) -> Result<Json<VerificationReport>, ApiError> {
  let report = store.verify_contract(id).await.map_err(ApiError::from_store)?;
  Ok(Json(report))
}
