//! Configurable ledger policy.

use serde::{Deserialize, Serialize};

/// Rules the amendment processor applies that the data model leaves open.
///
/// Uniqueness of `(contract_id, term_name)` is not a policy: it always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermPolicy {
  /// Whether an amendment may introduce a term name the contract does not yet
  /// have. When `false`, such a proposal is rejected with
  /// [`crate::Error::TermNotFound`].
  pub allow_new_terms: bool,
}

impl Default for TermPolicy {
  fn default() -> Self { Self { allow_new_terms: true } }
}
