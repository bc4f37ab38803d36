//! The `ContractStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `kubera-store-sqlite`).
//! Higher layers (`kubera-api`, `kubera-cli`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  DomainError,
  amendment::{Amendment, AmendmentDraft, CommittedAmendment},
  contract::{Contract, ContractQuery, NewContract},
  entity::{Document, NewDocument, Payor, Provider},
  ids::{ContractId, DocumentId, PayorId, ProviderId},
  temporal::{TermChange, TermSnapshot},
  term::{ContractTerm, TermRevision},
};

/// Summary returned by [`ContractStore::verify_contract`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VerificationReport {
  pub contract_id:       ContractId,
  pub terms_checked:     usize,
  pub revisions_checked: usize,
}

/// Abstraction over a Kubera contract ledger backend.
///
/// Contracts are immutable once created. Terms change only through
/// [`commit_amendment`](Self::commit_amendment), which writes the amendment,
/// its revisions and the new current values as one atomic unit. Revisions are
/// append-only.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ContractStore: Send + Sync {
  type Error: DomainError;

  // ── Entity store ──────────────────────────────────────────────────────

  /// Create a provider. Names are unique.
  fn create_provider(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Provider, Self::Error>> + Send + '_;

  fn get_provider(
    &self,
    id: ProviderId,
  ) -> impl Future<Output = Result<Option<Provider>, Self::Error>> + Send + '_;

  fn find_provider(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<Provider>, Self::Error>> + Send + '_;

  /// Create a payor. Names are unique.
  fn create_payor(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Payor, Self::Error>> + Send + '_;

  fn get_payor(
    &self,
    id: PayorId,
  ) -> impl Future<Output = Result<Option<Payor>, Self::Error>> + Send + '_;

  fn find_payor(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<Payor>, Self::Error>> + Send + '_;

  // ── Document store ────────────────────────────────────────────────────

  /// Record a document reference. The file itself is never read.
  fn store_document(
    &self,
    input: NewDocument,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  fn get_document(
    &self,
    id: DocumentId,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + '_;

  // ── Contract repository ───────────────────────────────────────────────

  /// Validate and persist a contract together with its initial terms.
  ///
  /// Fails with `InvalidRange`, `InvalidThreshold` or `InvalidTermName` for
  /// malformed input, and with a not-found error if the provider, payor or
  /// document does not exist.
  fn create_contract(
    &self,
    input: NewContract,
  ) -> impl Future<Output = Result<Contract, Self::Error>> + Send + '_;

  /// Fails with `ContractNotFound` if absent.
  fn get_contract(
    &self,
    id: ContractId,
  ) -> impl Future<Output = Result<Contract, Self::Error>> + Send + '_;

  fn list_contracts(
    &self,
    query: ContractQuery,
  ) -> impl Future<Output = Result<Vec<Contract>, Self::Error>> + Send + '_;

  // ── Term ledger ───────────────────────────────────────────────────────

  /// The current value of one term. Fails with `TermNotFound`.
  fn current_value(
    &self,
    contract_id: ContractId,
    term_name: String,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Every current term row of a contract, ordered by name.
  fn current_terms(
    &self,
    contract_id: ContractId,
  ) -> impl Future<Output = Result<Vec<ContractTerm>, Self::Error>> + Send + '_;

  /// The revisions of one term, oldest first. The chain is verified before
  /// it is returned.
  fn history(
    &self,
    contract_id: ContractId,
    term_name: String,
  ) -> impl Future<Output = Result<Vec<TermRevision>, Self::Error>> + Send + '_;

  // ── Amendment processor ───────────────────────────────────────────────

  /// Validate `draft` and commit it as a single all-or-nothing unit.
  ///
  /// Any error leaves the ledger untouched. A lost race against a concurrent
  /// commit is reported as `ConflictingEdit`.
  fn commit_amendment(
    &self,
    draft: AmendmentDraft,
  ) -> impl Future<Output = Result<CommittedAmendment, Self::Error>> + Send + '_;

  /// Amendments ordered by `(amendment_date, amendment_id)`.
  fn list_amendments(
    &self,
    contract_id: ContractId,
  ) -> impl Future<Output = Result<Vec<Amendment>, Self::Error>> + Send + '_;

  // ── Temporal queries ──────────────────────────────────────────────────

  /// Reconstruct every term value in force at `at`.
  fn as_of(
    &self,
    contract_id: ContractId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<TermSnapshot, Self::Error>> + Send + '_;

  /// Terms whose as-of value differs between `from` and `to`.
  fn diff(
    &self,
    contract_id: ContractId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<TermChange>, Self::Error>> + Send + '_;

  /// Check every term's revision chain against its current value.
  fn verify_contract(
    &self,
    contract_id: ContractId,
  ) -> impl Future<Output = Result<VerificationReport, Self::Error>> + Send + '_;
}
