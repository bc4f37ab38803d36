//! Amendments and the commit state machine.
//!
//! An amendment moves through `Drafted → Validating → Committed | Rejected`.
//! The states are carried by types:
//!
//! - [`AmendmentDraft`] is `Drafted`. It is a plain value; dropping it is the
//!   discard transition and leaves no trace anywhere.
//! - [`AmendmentDraft::validate`] is `Validating`. It reads a snapshot of the
//!   ledger ([`LedgerEntry`]) and either yields a [`ValidatedAmendment`] — the
//!   exact list of revisions to apply — or an error, which is `Rejected`.
//! - A backend turns a [`ValidatedAmendment`] into a [`CommittedAmendment`]
//!   inside one transaction, re-checking every previous value with a
//!   compare-and-swap. Any mismatch aborts the whole batch (`Rejected`).

use std::{collections::HashSet, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  contract::Contract,
  ids::{AmendmentId, ContractId, DocumentId, TermId},
  policy::TermPolicy,
  term::{ContractTerm, TermRevision},
  time::start_of_day,
};

// ─── State ───────────────────────────────────────────────────────────────────

/// The lifecycle state of one amendment commit. Used for logging; the states
/// themselves are enforced by the types in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentState {
  Drafted,
  Validating,
  Committed,
  Rejected,
}

impl fmt::Display for AmendmentState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Drafted => "drafted",
      Self::Validating => "validating",
      Self::Committed => "committed",
      Self::Rejected => "rejected",
    })
  }
}

// ─── Proposals ───────────────────────────────────────────────────────────────

/// What the caller believes a term's current value to be.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Expected {
  /// No expectation; only the commit-time staleness check applies.
  #[default]
  Any,
  /// The term must not exist yet.
  Absent,
  /// The term must currently hold exactly this value.
  Value(String),
}

impl Expected {
  pub fn matches(&self, current: Option<&str>) -> bool {
    match self {
      Self::Any => true,
      Self::Absent => current.is_none(),
      Self::Value(v) => current == Some(v.as_str()),
    }
  }
}

impl fmt::Display for Expected {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Any => f.write_str("any value"),
      Self::Absent => f.write_str("<absent>"),
      Self::Value(v) => write!(f, "{v:?}"),
    }
  }
}

/// One proposed `(term_name, new_value)` change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedChange {
  pub term_name: String,
  pub new_value: String,
  #[serde(default)]
  pub expected:  Expected,
}

impl ProposedChange {
  pub fn new(term_name: impl Into<String>, new_value: impl Into<String>) -> Self {
    Self {
      term_name: term_name.into(),
      new_value: new_value.into(),
      expected:  Expected::Any,
    }
  }

  /// Require the term to currently hold `value`.
  pub fn expecting(mut self, value: impl Into<String>) -> Self {
    self.expected = Expected::Value(value.into());
    self
  }

  /// Require the term not to exist yet.
  pub fn expecting_absent(mut self) -> Self {
    self.expected = Expected::Absent;
    self
  }
}

// ─── Drafted ─────────────────────────────────────────────────────────────────

/// An amendment that has not been committed. Holds no store resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentDraft {
  pub contract_id:    ContractId,
  /// The document evidencing the amendment.
  pub document_id:    DocumentId,
  pub amendment_date: NaiveDate,
  pub changes:        Vec<ProposedChange>,
}

/// A term as seen by validation: its current row, the instant of its latest
/// revision, if any, and the number of amendments that have touched it.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
  pub term:            ContractTerm,
  pub last_changed_at: Option<DateTime<Utc>>,
  pub version:         i64,
}

impl AmendmentDraft {
  pub fn new(
    contract_id: ContractId,
    document_id: DocumentId,
    amendment_date: NaiveDate,
  ) -> Self {
    Self { contract_id, document_id, amendment_date, changes: Vec::new() }
  }

  /// Append a proposed change.
  pub fn propose(mut self, change: ProposedChange) -> Self {
    self.changes.push(change);
    self
  }

  /// The instant at which the amendment's revisions take effect.
  pub fn effective_at(&self) -> DateTime<Utc> { start_of_day(self.amendment_date) }

  /// Validate the draft against `contract` and a snapshot of its terms, with
  /// today's UTC date as the latest allowed amendment date.
  pub fn validate(
    self,
    contract: &Contract,
    ledger: &[LedgerEntry],
    policy: &TermPolicy,
  ) -> Result<ValidatedAmendment> {
    self.validate_on(contract, ledger, policy, Utc::now().date_naive())
  }

  /// Validate the draft as of `today`.
  ///
  /// Checks, in order: the draft targets `contract`; it proposes something;
  /// it is dated no earlier than the contract's effective date and no later
  /// than `today`; every term name is non-blank and named once; every caller
  /// expectation holds; no touched term has a revision later than this
  /// amendment; new terms are allowed by `policy`. Proposals that would not
  /// change the value become [`HeldTerm`]s, which the commit still checks.
  pub fn validate_on(
    self,
    contract: &Contract,
    ledger: &[LedgerEntry],
    policy: &TermPolicy,
    today: NaiveDate,
  ) -> Result<ValidatedAmendment> {
    if self.contract_id != contract.contract_id {
      return Err(Error::ContractNotFound(self.contract_id));
    }
    if self.changes.is_empty() {
      return Err(Error::EmptyAmendment);
    }
    if self.amendment_date > today {
      return Err(Error::FutureAmendment { amendment_date: self.amendment_date, today });
    }
    if self.amendment_date < contract.effective_date {
      return Err(Error::OutOfOrderAmendment {
        amendment_date: self.amendment_date,
        not_before:     contract.effective_date,
      });
    }

    let changed_at = self.effective_at();
    let mut seen = HashSet::new();
    let mut revisions = Vec::with_capacity(self.changes.len());
    let mut held = Vec::new();

    for change in self.changes {
      if change.term_name.trim().is_empty() {
        return Err(Error::InvalidTermName(change.term_name));
      }
      if !seen.insert(change.term_name.clone()) {
        return Err(Error::DuplicateTerm(change.term_name));
      }

      let entry = ledger
        .iter()
        .find(|e| e.term.term_name == change.term_name);
      let current = entry.map(|e| e.term.term_value.as_str());

      if !change.expected.matches(current) {
        return Err(Error::ConflictingEdit {
          term_name: change.term_name,
          expected:  change.expected,
          actual:    current.map(str::to_owned),
        });
      }

      match entry {
        Some(entry) => {
          if let Some(last) = entry.last_changed_at
            && changed_at < last
          {
            return Err(Error::OutOfOrderAmendment {
              amendment_date: self.amendment_date,
              not_before:     last.date_naive(),
            });
          }
          if entry.term.term_value == change.new_value {
            held.push(HeldTerm {
              term_name: change.term_name,
              term_id:   entry.term.term_id,
              version:   entry.version,
              value:     change.new_value,
            });
            continue;
          }
          revisions.push(PlannedRevision {
            term_name:  change.term_name,
            target:     TermTarget::Existing {
              term_id: entry.term.term_id,
              version: entry.version,
            },
            prev_value: Some(entry.term.term_value.clone()),
            new_value:  change.new_value,
          });
        }
        None => {
          if !policy.allow_new_terms {
            return Err(Error::TermNotFound {
              contract_id: self.contract_id,
              term_name:   change.term_name,
            });
          }
          revisions.push(PlannedRevision {
            term_name:  change.term_name,
            target:     TermTarget::New,
            prev_value: None,
            new_value:  change.new_value,
          });
        }
      }
    }

    Ok(ValidatedAmendment {
      contract_id: self.contract_id,
      document_id: self.document_id,
      amendment_date: self.amendment_date,
      changed_at,
      revisions,
      held,
    })
  }
}

// ─── Validated ───────────────────────────────────────────────────────────────

/// Which term row a planned revision applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermTarget {
  /// An existing term, with the version validation saw.
  Existing { term_id: TermId, version: i64 },
  /// The term is introduced by this amendment.
  New,
}

/// One revision the commit will apply, with the previous value it must find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRevision {
  pub term_name:  String,
  pub target:     TermTarget,
  pub prev_value: Option<String>,
  pub new_value:  String,
}

impl PlannedRevision {
  /// The expectation a failed compare-and-swap is reported against.
  pub fn expected(&self) -> Expected {
    match &self.prev_value {
      Some(v) => Expected::Value(v.clone()),
      None => Expected::Absent,
    }
  }
}

/// A proposal that leaves its term's value unchanged. The commit confirms the
/// term still holds `value` at `version` and writes no revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldTerm {
  pub term_name: String,
  pub term_id:   TermId,
  pub version:   i64,
  pub value:     String,
}

/// A draft that passed validation. Only [`AmendmentDraft::validate`] builds
/// one.
#[derive(Debug, Clone)]
pub struct ValidatedAmendment {
  contract_id:    ContractId,
  document_id:    DocumentId,
  amendment_date: NaiveDate,
  changed_at:     DateTime<Utc>,
  revisions:      Vec<PlannedRevision>,
  held:           Vec<HeldTerm>,
}

impl ValidatedAmendment {
  pub fn contract_id(&self) -> ContractId { self.contract_id }

  pub fn document_id(&self) -> DocumentId { self.document_id }

  pub fn amendment_date(&self) -> NaiveDate { self.amendment_date }

  pub fn changed_at(&self) -> DateTime<Utc> { self.changed_at }

  /// Revisions in proposal order, no-ops removed.
  pub fn revisions(&self) -> &[PlannedRevision] { &self.revisions }

  /// The no-op proposals, in proposal order.
  pub fn held(&self) -> &[HeldTerm] { &self.held }
}

// ─── Committed ───────────────────────────────────────────────────────────────

/// A persisted amendment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amendment {
  pub amendment_id:   AmendmentId,
  pub contract_id:    ContractId,
  pub document_id:    DocumentId,
  pub amendment_date: NaiveDate,
  /// Wall-clock commit time; ties between equal dates break on insertion
  /// order (`amendment_id`).
  pub created_at:     DateTime<Utc>,
}

/// The outcome of a successful commit: the amendment and every revision it
/// produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedAmendment {
  pub amendment: Amendment,
  pub revisions: Vec<TermRevision>,
}

#[cfg(test)]
mod tests {
  use rust_decimal::Decimal;

  use super::*;
  use crate::ids::{PayorId, ProviderId};

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn contract() -> Contract {
    Contract {
      contract_id:             ContractId(1),
      provider_id:             ProviderId(1),
      payor_id:                PayorId(1),
      document_id:             DocumentId(1),
      effective_date:          date(2024, 1, 1),
      termination_date:        date(2025, 1, 1),
      termination_notice_days: None,
      stop_loss_threshold:     Decimal::ZERO,
      created_at:              start_of_day(date(2023, 12, 15)),
    }
  }

  fn entry(id: i64, name: &str, value: &str, last: Option<NaiveDate>) -> LedgerEntry {
    LedgerEntry {
      term:            ContractTerm {
        term_id:         TermId(id),
        contract_id:     ContractId(1),
        term_name:       name.to_owned(),
        term_value:      value.to_owned(),
        inception_value: Some(value.to_owned()),
        introduced_at:   start_of_day(date(2024, 1, 1)),
        created_at:      start_of_day(date(2023, 12, 15)),
      },
      last_changed_at: last.map(start_of_day),
      version:         0,
    }
  }

  fn draft(on: NaiveDate) -> AmendmentDraft {
    AmendmentDraft::new(ContractId(1), DocumentId(2), on)
  }

  #[test]
  fn plans_revision_for_existing_term() {
    let ledger = [entry(10, "stop_loss_copay", "50", None)];
    let v = draft(date(2024, 3, 1))
      .propose(ProposedChange::new("stop_loss_copay", "75").expecting("50"))
      .validate(&contract(), &ledger, &TermPolicy::default())
      .unwrap();

    assert_eq!(v.changed_at(), start_of_day(date(2024, 3, 1)));
    assert_eq!(v.revisions(), &[PlannedRevision {
      term_name:  "stop_loss_copay".into(),
      target:     TermTarget::Existing { term_id: TermId(10), version: 0 },
      prev_value: Some("50".into()),
      new_value:  "75".into(),
    }]);
  }

  #[test]
  fn plans_new_term_with_absent_previous_value() {
    let v = draft(date(2024, 3, 1))
      .propose(ProposedChange::new("carve_out", "transplants").expecting_absent())
      .validate(&contract(), &[], &TermPolicy::default())
      .unwrap();

    assert_eq!(v.revisions()[0].target, TermTarget::New);
    assert_eq!(v.revisions()[0].prev_value, None);
    assert_eq!(v.revisions()[0].expected(), Expected::Absent);
  }

  #[test]
  fn new_term_rejected_when_policy_forbids() {
    let policy = TermPolicy { allow_new_terms: false };
    let err = draft(date(2024, 3, 1))
      .propose(ProposedChange::new("carve_out", "transplants"))
      .validate(&contract(), &[], &policy)
      .unwrap_err();
    assert!(matches!(err, Error::TermNotFound { ref term_name, .. } if term_name == "carve_out"));
  }

  #[test]
  fn amendment_before_effective_date_is_out_of_order() {
    let err = draft(date(2023, 12, 1))
      .propose(ProposedChange::new("stop_loss_copay", "75"))
      .validate(&contract(), &[entry(10, "stop_loss_copay", "50", None)], &TermPolicy::default())
      .unwrap_err();
    assert!(matches!(
      err,
      Error::OutOfOrderAmendment { not_before, .. } if not_before == date(2024, 1, 1)
    ));
  }

  #[test]
  fn backdating_past_latest_revision_is_out_of_order() {
    let ledger = [entry(10, "stop_loss_copay", "75", Some(date(2024, 3, 1)))];
    let err = draft(date(2024, 2, 1))
      .propose(ProposedChange::new("stop_loss_copay", "60"))
      .validate(&contract(), &ledger, &TermPolicy::default())
      .unwrap_err();
    assert!(matches!(err, Error::OutOfOrderAmendment { .. }));
  }

  #[test]
  fn same_day_as_latest_revision_is_allowed() {
    let ledger = [entry(10, "stop_loss_copay", "75", Some(date(2024, 3, 1)))];
    let v = draft(date(2024, 3, 1))
      .propose(ProposedChange::new("stop_loss_copay", "80"))
      .validate(&contract(), &ledger, &TermPolicy::default())
      .unwrap();
    assert_eq!(v.revisions().len(), 1);
  }

  #[test]
  fn mismatched_expectation_is_a_conflicting_edit() {
    let ledger = [entry(10, "stop_loss_copay", "75", None)];
    let err = draft(date(2024, 3, 1))
      .propose(ProposedChange::new("stop_loss_copay", "90").expecting("50"))
      .validate(&contract(), &ledger, &TermPolicy::default())
      .unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(
      err,
      Error::ConflictingEdit { ref actual, .. } if actual.as_deref() == Some("75")
    ));
  }

  #[test]
  fn expecting_absent_on_existing_term_conflicts() {
    let ledger = [entry(10, "stop_loss_copay", "50", None)];
    let err = draft(date(2024, 3, 1))
      .propose(ProposedChange::new("stop_loss_copay", "90").expecting_absent())
      .validate(&contract(), &ledger, &TermPolicy::default())
      .unwrap_err();
    assert!(matches!(err, Error::ConflictingEdit { .. }));
  }

  #[test]
  fn empty_and_duplicate_and_blank_proposals_are_rejected() {
    let c = contract();
    let p = TermPolicy::default();

    let err = draft(date(2024, 3, 1)).validate(&c, &[], &p).unwrap_err();
    assert!(matches!(err, Error::EmptyAmendment));

    let err = draft(date(2024, 3, 1))
      .propose(ProposedChange::new("a", "1"))
      .propose(ProposedChange::new("a", "2"))
      .validate(&c, &[], &p)
      .unwrap_err();
    assert!(matches!(err, Error::DuplicateTerm(ref n) if n == "a"));

    let err = draft(date(2024, 3, 1))
      .propose(ProposedChange::new(" ", "1"))
      .validate(&c, &[], &p)
      .unwrap_err();
    assert!(matches!(err, Error::InvalidTermName(_)));
  }

  #[test]
  fn unchanged_values_are_held_not_revised() {
    let ledger = [entry(10, "a", "1", None), entry(11, "b", "2", None)];
    let v = draft(date(2024, 3, 1))
      .propose(ProposedChange::new("a", "1").expecting("1"))
      .propose(ProposedChange::new("b", "3"))
      .validate(&contract(), &ledger, &TermPolicy::default())
      .unwrap();
    assert_eq!(v.revisions().len(), 1);
    assert_eq!(v.revisions()[0].term_name, "b");
    assert_eq!(v.held(), &[HeldTerm {
      term_name: "a".into(),
      term_id:   TermId(10),
      version:   0,
      value:     "1".into(),
    }]);
  }

  #[test]
  fn amendment_dated_after_today_is_rejected() {
    let ledger = [entry(10, "stop_loss_copay", "50", None)];
    let err = draft(date(2024, 3, 2))
      .propose(ProposedChange::new("stop_loss_copay", "99"))
      .validate_on(&contract(), &ledger, &TermPolicy::default(), date(2024, 3, 1))
      .unwrap_err();
    assert!(err.is_invalid_input());
    assert!(matches!(
      err,
      Error::FutureAmendment { today, .. } if today == date(2024, 3, 1)
    ));

    draft(date(2024, 3, 1))
      .propose(ProposedChange::new("stop_loss_copay", "99"))
      .validate_on(&contract(), &ledger, &TermPolicy::default(), date(2024, 3, 1))
      .unwrap();
  }

  #[test]
  fn draft_for_another_contract_is_rejected() {
    let err = AmendmentDraft::new(ContractId(99), DocumentId(2), date(2024, 3, 1))
      .propose(ProposedChange::new("a", "1"))
      .validate(&contract(), &[], &TermPolicy::default())
      .unwrap_err();
    assert!(matches!(err, Error::ContractNotFound(ContractId(99))));
  }

  #[test]
  fn expected_serialises_with_kind_tag() {
    let json = serde_json::to_value(Expected::Value("50".into())).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "value", "value": "50" }));

    let change: ProposedChange =
      serde_json::from_str(r#"{"term_name":"a","new_value":"1"}"#).unwrap();
    assert_eq!(change.expected, Expected::Any);
  }
}
