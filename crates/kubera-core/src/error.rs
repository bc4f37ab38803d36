//! Error types for `kubera-core`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
  amendment::Expected,
  ids::{ContractId, DocumentId, PayorId, ProviderId, TermId},
};

#[derive(Debug, Error)]
pub enum Error {
  // ── Missing records ───────────────────────────────────────────────────

  #[error("provider not found: {0}")]
  ProviderNotFound(ProviderId),

  #[error("payor not found: {0}")]
  PayorNotFound(PayorId),

  #[error("document not found: {0}")]
  DocumentNotFound(DocumentId),

  #[error("contract not found: {0}")]
  ContractNotFound(ContractId),

  #[error("term {term_name:?} not found on contract {contract_id}")]
  TermNotFound {
    contract_id: ContractId,
    term_name:   String,
  },

  #[error("term not found: {0}")]
  UnknownTerm(TermId),

  // ── Malformed input ───────────────────────────────────────────────────

  #[error(
    "effective date {effective_date} must precede termination date \
     {termination_date}"
  )]
  InvalidRange {
    effective_date:   NaiveDate,
    termination_date: NaiveDate,
  },

  #[error("stop-loss threshold must not be negative, got {0}")]
  InvalidThreshold(Decimal),

  #[error("invalid term name: {0:?}")]
  InvalidTermName(String),

  #[error("term {0:?} is named more than once in a single amendment")]
  DuplicateTerm(String),

  #[error("amendment proposes no changes")]
  EmptyAmendment,

  #[error("invalid instant {0:?}: expected RFC 3339 or YYYY-MM-DD")]
  InvalidInstant(String),

  #[error("amendment dated {amendment_date} may not precede {not_before}")]
  OutOfOrderAmendment {
    amendment_date: NaiveDate,
    not_before:     NaiveDate,
  },

  #[error("amendment dated {amendment_date} is in the future (today is {today})")]
  FutureAmendment {
    amendment_date: NaiveDate,
    today:          NaiveDate,
  },

  // ── Optimistic concurrency ────────────────────────────────────────────

  #[error(
    "conflicting edit on term {term_name:?}: expected {expected}, found {}",
    .actual.as_deref().unwrap_or("<absent>")
  )]
  ConflictingEdit {
    term_name: String,
    expected:  Expected,
    actual:    Option<String>,
  },

  #[error(
    "stale value for term {term_name:?}: expected {:?}, found {:?}",
    .expected, .actual
  )]
  StaleValue {
    term_name: String,
    expected:  Option<String>,
    actual:    Option<String>,
  },

  // ── Integrity ─────────────────────────────────────────────────────────

  #[error("revision chain corrupted for term {term_id}: {detail}")]
  ChainCorruption { term_id: TermId, detail: String },
}

impl Error {
  /// A referenced record does not exist.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::ProviderNotFound(_)
        | Self::PayorNotFound(_)
        | Self::DocumentNotFound(_)
        | Self::ContractNotFound(_)
        | Self::TermNotFound { .. }
        | Self::UnknownTerm(_)
    )
  }

  /// An optimistic-concurrency check failed; the caller should re-read the
  /// current state and retry the whole amendment.
  pub fn is_conflict(&self) -> bool {
    matches!(self, Self::ConflictingEdit { .. } | Self::StaleValue { .. })
  }

  /// The caller supplied input that can never succeed as-is.
  pub fn is_invalid_input(&self) -> bool {
    matches!(
      self,
      Self::InvalidRange { .. }
        | Self::InvalidThreshold(_)
        | Self::InvalidTermName(_)
        | Self::DuplicateTerm(_)
        | Self::EmptyAmendment
        | Self::InvalidInstant(_)
        | Self::OutOfOrderAmendment { .. }
        | Self::FutureAmendment { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Implemented by backend error types so that generic layers (the HTTP API,
/// the CLI) can recover the domain error and classify it.
pub trait DomainError: std::error::Error + Send + Sync + 'static {
  /// The underlying domain error, if this error carries one.
  fn domain(&self) -> Option<&Error>;
}

impl DomainError for Error {
  fn domain(&self) -> Option<&Error> { Some(self) }
}
