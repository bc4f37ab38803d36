//! Handlers for `/contracts/{id}/amendments`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/contracts/{id}/amendments` | Ordered by date |
//! | `POST` | `/contracts/{id}/amendments` | Body: [`AmendmentBody`]; 201 + amendment and revisions, 409 on a lost race |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use kubera_core::{
  amendment::{Amendment, AmendmentDraft, ProposedChange},
  ids::{ContractId, DocumentId},
  store::ContractStore,
};
use serde::Deserialize;

use crate::error::ApiError;

/// Request body for `POST /contracts/{id}/amendments`.
///
/// ```json
/// {
///   "document_id": 7,
///   "amendment_date": "2024-03-01",
///   "changes": [
///     { "term_name": "stop_loss_copay", "new_value": "75",
///       "expected": { "kind": "value", "value": "50" } }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct AmendmentBody {
  pub document_id:    DocumentId,
  pub amendment_date: NaiveDate,
  pub changes:        Vec<ProposedChange>,
}

impl AmendmentBody {
  fn into_draft(self, contract_id: ContractId) -> AmendmentDraft {
    AmendmentDraft {
      contract_id,
      document_id: self.document_id,
      amendment_date: self.amendment_date,
      changes: self.changes,
    }
  }
}

/// `POST /contracts/{id}/amendments`
pub async fn commit<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<ContractId>,
  Json(body): Json<AmendmentBody>,
) -> Result<impl IntoResponse, ApiError> {
  let committed = store
    .commit_amendment(body.into_draft(id))
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(committed)))
}

/// `GET /contracts/{id}/amendments`
pub async fn list<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<ContractId>,
) -> Result<Json<Vec<Amendment>>, ApiError> {
  let amendments = store.list_amendments(id).await.map_err(ApiError::from_store)?;
  Ok(Json(amendments))
}
