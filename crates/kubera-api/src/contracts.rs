//! Handlers for `/contracts` and the term ledger.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/contracts` | Optional `?provider_id=` and `?payor_id=` |
//! | `POST` | `/contracts` | Body: [`ContractBody`]; returns 201 + contract |
//! | `GET`  | `/contracts/{id}` | 404 if not found |
//! | `GET`  | `/contracts/{id}/terms` | Current term rows |
//! | `GET`  | `/contracts/{id}/terms/{name}` | `{"term_name":..,"term_value":..}` |
//! | `GET`  | `/contracts/{id}/terms/{name}/history` | Revisions, oldest first |

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use kubera_core::{
  contract::{Contract, ContractQuery, NewContract},
  ids::{ContractId, DocumentId, PayorId, ProviderId},
  store::ContractStore,
  term::{ContractTerm, TermRevision},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /contracts[?provider_id=<id>][&payor_id=<id>]`
pub async fn list<S: ContractStore>(
  State(store): State<Arc<S>>,
  Query(query): Query<ContractQuery>,
) -> Result<Json<Vec<Contract>>, ApiError> {
  let contracts = store
    .list_contracts(query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(contracts))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// Request body for `POST /contracts`.
#[derive(Debug, Deserialize)]
pub struct ContractBody {
  pub provider_id:             ProviderId,
  pub payor_id:                PayorId,
  pub document_id:             DocumentId,
  pub effective_date:          NaiveDate,
  pub termination_date:        NaiveDate,
  pub termination_notice_days: Option<u32>,
  pub stop_loss_threshold:     Decimal,
  /// Initial terms, keyed by name.
  #[serde(default)]
  pub terms:                   BTreeMap<String, String>,
}

impl From<ContractBody> for NewContract {
  fn from(b: ContractBody) -> Self {
    NewContract {
      provider_id:             b.provider_id,
      payor_id:                b.payor_id,
      document_id:             b.document_id,
      effective_date:          b.effective_date,
      termination_date:        b.termination_date,
      termination_notice_days: b.termination_notice_days,
      stop_loss_threshold:     b.stop_loss_threshold,
      initial_terms:           b.terms,
    }
  }
}

/// `POST /contracts`
pub async fn create<S: ContractStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<ContractBody>,
) -> Result<impl IntoResponse, ApiError> {
  let contract = store
    .create_contract(body.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(contract)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /contracts/{id}`
pub async fn get_one<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<ContractId>,
) -> Result<Json<Contract>, ApiError> {
  let contract = store.get_contract(id).await.map_err(ApiError::from_store)?;
  Ok(Json(contract))
}

// ─── Terms ───────────────────────────────────────────────────────────────────

/// `GET /contracts/{id}/terms`
pub async fn terms<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<ContractId>,
) -> Result<Json<Vec<ContractTerm>>, ApiError> {
  let terms = store.current_terms(id).await.map_err(ApiError::from_store)?;
  Ok(Json(terms))
}

#[derive(Debug, Serialize)]
pub struct TermValue {
  pub term_name:  String,
  pub term_value: String,
}

/// `GET /contracts/{id}/terms/{name}`
pub async fn term<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path((id, name)): Path<(ContractId, String)>,
) -> Result<Json<TermValue>, ApiError> {
  let term_value = store
    .current_value(id, name.clone())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(TermValue { term_name: name, term_value }))
}

/// `GET /contracts/{id}/terms/{name}/history`
pub async fn history<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path((id, name)): Path<(ContractId, String)>,
) -> Result<Json<Vec<TermRevision>>, ApiError> {
  let revisions = store.history(id, name).await.map_err(ApiError::from_store)?;
  Ok(Json(revisions))
}
