//! Records owned by the external collaborators: providers and payors live in
//! the entity store, documents in the document store.
//!
//! The ledger only ever references these by id; it never reads file bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DocumentId, PayorId, ProviderId};

/// A healthcare provider party to one or more contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
  pub provider_id: ProviderId,
  pub name:        String,
  pub created_at:  DateTime<Utc>,
}

/// A payor party to one or more contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payor {
  pub payor_id:   PayorId,
  pub name:       String,
  pub created_at: DateTime<Utc>,
}

/// A stored document evidencing a contract or an amendment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub document_id: DocumentId,
  pub filename:    String,
  /// Opaque location inside the document store (e.g. an object-store key).
  pub file_path:   String,
  pub uploaded_at: DateTime<Utc>,
}

/// Input to [`crate::store::ContractStore::store_document`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
  pub filename:  String,
  pub file_path: String,
}

impl NewDocument {
  /// Derive the filename from the last path segment of `file_path`.
  pub fn from_path(file_path: impl Into<String>) -> Self {
    let file_path = file_path.into();
    let filename = file_path
      .rsplit(['/', '\\'])
      .next()
      .unwrap_or(file_path.as_str())
      .to_owned();
    Self { filename, file_path }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filename_is_last_path_segment() {
    let doc = NewDocument::from_path("s3://contracts/2024/abc.pdf");
    assert_eq!(doc.filename, "abc.pdf");
    assert_eq!(doc.file_path, "s3://contracts/2024/abc.pdf");
  }

  #[test]
  fn bare_filename_is_kept() {
    assert_eq!(NewDocument::from_path("abc.pdf").filename, "abc.pdf");
  }
}
