//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use kubera_core::{DomainError, ids::TermId};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// A revision chain failed verification; the ledger needs repair.
  #[error("revision chain corrupted for term {term_id}")]
  Corrupt { term_id: TermId, detail: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by the domain error it carries.
  pub fn from_store<E: DomainError>(e: E) -> Self {
    match e.domain() {
      Some(kubera_core::Error::ChainCorruption { term_id, detail }) => {
        Self::Corrupt { term_id: *term_id, detail: detail.clone() }
      }
      Some(d) if d.is_not_found() => Self::NotFound(d.to_string()),
      Some(d) if d.is_invalid_input() => Self::Unprocessable(d.to_string()),
      Some(d) if d.is_conflict() => Self::Conflict(d.to_string()),
      _ => Self::Store(Box::new(e)),
    }
  }
}

impl From<kubera_core::Error> for ApiError {
  fn from(e: kubera_core::Error) -> Self { Self::from_store(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Corrupt { term_id, detail } => {
        error!(%term_id, %detail, "revision chain corrupted; ledger needs operator repair");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
      }
      ApiError::Store(e) => {
        error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn chain_corruption_is_a_500_naming_the_term() {
    let err = ApiError::from_store(kubera_core::Error::ChainCorruption {
      term_id: TermId(7),
      detail:  "replay gives 75, stored 99".into(),
    });
    assert!(matches!(err, ApiError::Corrupt { term_id: TermId(7), .. }));

    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "revision chain corrupted for term 7");
  }

  #[test]
  fn domain_errors_are_classified() {
    let not_found = ApiError::from_store(kubera_core::Error::ContractNotFound(
      kubera_core::ids::ContractId(1),
    ));
    assert!(matches!(not_found, ApiError::NotFound(_)));
    let future = ApiError::from_store(kubera_core::Error::FutureAmendment {
      amendment_date: chrono::NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
      today:          chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    });
    assert!(matches!(future, ApiError::Unprocessable(_)));
  }
}
