//! Handlers for the entity and document stores.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/providers` | Body: `{"name":"..."}`; returns the existing provider if the name is taken |
//! | `GET`  | `/providers/{id}` | 404 if not found |
//! | `POST` | `/payors` | Body: `{"name":"..."}`; same semantics as providers |
//! | `GET`  | `/payors/{id}` | 404 if not found |
//! | `POST` | `/documents` | Body: [`DocumentBody`] |
//! | `GET`  | `/documents/{id}` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use kubera_core::{
  entity::{Document, NewDocument, Payor, Provider},
  ids::{DocumentId, PayorId, ProviderId},
  store::ContractStore,
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct NameBody {
  pub name: String,
}

impl NameBody {
  fn into_name(self) -> Result<String, ApiError> {
    let name = self.name.trim();
    if name.is_empty() {
      return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    Ok(name.to_owned())
  }
}

// ─── Providers ───────────────────────────────────────────────────────────────

/// `POST /providers`
pub async fn create_provider<S: ContractStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError> {
  let provider = store
    .create_provider(body.into_name()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(provider)))
}

/// `GET /providers/{id}`
pub async fn get_provider<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<ProviderId>,
) -> Result<Json<Provider>, ApiError> {
  let provider = store
    .get_provider(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("provider {id} not found")))?;
  Ok(Json(provider))
}

// ─── Payors ──────────────────────────────────────────────────────────────────

/// `POST /payors`
pub async fn create_payor<S: ContractStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError> {
  let payor = store
    .create_payor(body.into_name()?)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(payor)))
}

/// `GET /payors/{id}`
pub async fn get_payor<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<PayorId>,
) -> Result<Json<Payor>, ApiError> {
  let payor = store
    .get_payor(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("payor {id} not found")))?;
  Ok(Json(payor))
}

// ─── Documents ───────────────────────────────────────────────────────────────

/// Request body for `POST /documents`. `filename` defaults to the last path
/// segment of `file_path`.
#[derive(Debug, Deserialize)]
pub struct DocumentBody {
  pub file_path: String,
  pub filename:  Option<String>,
}

impl From<DocumentBody> for NewDocument {
  fn from(body: DocumentBody) -> Self {
    let mut doc = NewDocument::from_path(body.file_path);
    if let Some(name) = body.filename {
      doc.filename = name;
    }
    doc
  }
}

/// `POST /documents`
pub async fn store_document<S: ContractStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<DocumentBody>,
) -> Result<impl IntoResponse, ApiError> {
  if body.file_path.trim().is_empty() {
    return Err(ApiError::BadRequest("file_path must not be empty".into()));
  }
  let document = store
    .store_document(body.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(document)))
}

/// `GET /documents/{id}`
pub async fn get_document<S: ContractStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<DocumentId>,
) -> Result<Json<Document>, ApiError> {
  let document = store
    .get_document(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("document {id} not found")))?;
  Ok(Json(document))
}
