//! Contract terms and their append-only revision log.
//!
//! A [`ContractTerm`] row holds the materialised current value; the chain of
//! [`TermRevision`]s is the log it is derived from. The two are only ever
//! written together, inside one amendment commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AmendmentId, ContractId, RevisionId, TermId};

/// A named, valued attribute of a contract. At most one row exists per
/// `(contract_id, term_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerm {
  pub term_id:         TermId,
  pub contract_id:     ContractId,
  pub term_name:       String,
  /// The current value: the `new_value` of the latest revision, or the
  /// inception value when the term has never been revised.
  pub term_value:      String,
  /// The value the term was created with, before any revision. `None` for
  /// terms introduced by an amendment.
  pub inception_value: Option<String>,
  /// The instant from which the term exists.
  pub introduced_at:   DateTime<Utc>,
  pub created_at:      DateTime<Utc>,
}

/// An immutable record of one term changing value, caused by one amendment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRevision {
  pub revision_id:  RevisionId,
  pub term_id:      TermId,
  pub amendment_id: AmendmentId,
  /// `None` when the revision introduced the term.
  pub prev_value:   Option<String>,
  pub new_value:    String,
  /// The effective instant of the causing amendment.
  pub changed_at:   DateTime<Utc>,
}
