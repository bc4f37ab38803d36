//! Point-in-time reconstruction over the revision log.
//!
//! Everything here is pure: a backend loads a contract's [`TermHistory`]s and
//! these functions answer as-of, diff and consistency questions over them.
//! Cost is `O(terms × revisions)` per query.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  ids::ContractId,
  term::{ContractTerm, TermRevision},
};

/// A term together with its revisions, ordered by `(changed_at,
/// revision_id)` ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermHistory {
  pub term:      ContractTerm,
  pub revisions: Vec<TermRevision>,
}

impl TermHistory {
  /// The value in force at `at`, or `None` if the term did not exist yet.
  pub fn value_at(&self, at: DateTime<Utc>) -> Option<&str> {
    if at < self.term.introduced_at {
      return None;
    }
    match self.revisions.iter().take_while(|r| r.changed_at <= at).last() {
      Some(rev) => Some(rev.new_value.as_str()),
      None => self.term.inception_value.as_deref(),
    }
  }

  /// Replay the chain from the inception value; the result must equal the
  /// materialised current value.
  pub fn replay(&self) -> Option<&str> {
    self
      .revisions
      .last()
      .map(|r| r.new_value.as_str())
      .or(self.term.inception_value.as_deref())
  }

  /// Check the chain invariants:
  ///
  /// - every revision belongs to this term;
  /// - revisions are ordered by `changed_at` and none predates the term;
  /// - each `prev_value` equals the previous `new_value` (or the inception
  ///   value for the first revision);
  /// - replaying the chain yields the stored current value.
  pub fn verify(&self) -> Result<()> {
    let term_id = self.term.term_id;
    let corrupt = |detail: String| Error::ChainCorruption { term_id, detail };

    let mut expected_prev = self.term.inception_value.as_deref();
    let mut last_at = self.term.introduced_at;

    for rev in &self.revisions {
      if rev.term_id != term_id {
        return Err(corrupt(format!(
          "revision {} belongs to term {}",
          rev.revision_id, rev.term_id
        )));
      }
      if rev.changed_at < last_at {
        return Err(corrupt(format!(
          "revision {} at {} precedes {}",
          rev.revision_id, rev.changed_at, last_at
        )));
      }
      if rev.prev_value.as_deref() != expected_prev {
        return Err(corrupt(format!(
          "revision {} expects previous value {:?} but chain holds {:?}",
          rev.revision_id, rev.prev_value, expected_prev
        )));
      }
      expected_prev = Some(rev.new_value.as_str());
      last_at = rev.changed_at;
    }

    if expected_prev != Some(self.term.term_value.as_str()) {
      return Err(corrupt(format!(
        "replayed value {:?} does not match current value {:?}",
        expected_prev, self.term.term_value
      )));
    }
    Ok(())
  }
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

/// Every term value of a contract in force at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSnapshot {
  pub contract_id: ContractId,
  pub as_of:       DateTime<Utc>,
  pub terms:       BTreeMap<String, String>,
}

/// Reconstruct the snapshot at `at`. Terms that did not exist yet are
/// omitted.
pub fn snapshot(
  contract_id: ContractId,
  histories: &[TermHistory],
  at: DateTime<Utc>,
) -> TermSnapshot {
  let terms = histories
    .iter()
    .filter_map(|h| {
      h.value_at(at)
        .map(|v| (h.term.term_name.clone(), v.to_owned()))
    })
    .collect();
  TermSnapshot { contract_id, as_of: at, terms }
}

/// The current value mapping straight from the materialised term rows.
pub fn current_values(histories: &[TermHistory]) -> BTreeMap<String, String> {
  histories
    .iter()
    .map(|h| (h.term.term_name.clone(), h.term.term_value.clone()))
    .collect()
}

/// Verify every history, stopping at the first corrupt chain.
pub fn verify_all(histories: &[TermHistory]) -> Result<()> {
  histories.iter().try_for_each(TermHistory::verify)
}

// ─── Diff ────────────────────────────────────────────────────────────────────

/// A term whose value differs between two snapshots. `None` means the term
/// did not exist at that side's instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermChange {
  pub term_name: String,
  pub old_value: Option<String>,
  pub new_value: Option<String>,
}

/// Terms whose value differs between `from` and `to`, ordered by name.
pub fn diff(from: &TermSnapshot, to: &TermSnapshot) -> Vec<TermChange> {
  let mut names: Vec<&String> = from.terms.keys().chain(to.terms.keys()).collect();
  names.sort();
  names.dedup();

  names
    .into_iter()
    .filter_map(|name| {
      let old = from.terms.get(name);
      let new = to.terms.get(name);
      (old != new).then(|| TermChange {
        term_name: name.clone(),
        old_value: old.cloned(),
        new_value: new.cloned(),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::{
    ids::{AmendmentId, RevisionId, TermId},
    time::start_of_day,
  };

  fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    start_of_day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
  }

  fn term(id: i64, name: &str, current: &str, inception: Option<&str>, introduced: DateTime<Utc>) -> ContractTerm {
    ContractTerm {
      term_id:         TermId(id),
      contract_id:     ContractId(1),
      term_name:       name.to_owned(),
      term_value:      current.to_owned(),
      inception_value: inception.map(str::to_owned),
      introduced_at:   introduced,
      created_at:      at(2023, 12, 15),
    }
  }

  fn rev(id: i64, term: i64, prev: Option<&str>, new: &str, when: DateTime<Utc>) -> TermRevision {
    TermRevision {
      revision_id:  RevisionId(id),
      term_id:      TermId(term),
      amendment_id: AmendmentId(id),
      prev_value:   prev.map(str::to_owned),
      new_value:    new.to_owned(),
      changed_at:   when,
    }
  }

  /// "stop_loss_copay" = 50 from 2024-01-01, 75 from 2024-03-01.
  fn copay() -> TermHistory {
    TermHistory {
      term:      term(1, "stop_loss_copay", "75", Some("50"), at(2024, 1, 1)),
      revisions: vec![rev(1, 1, Some("50"), "75", at(2024, 3, 1))],
    }
  }

  /// "carve_out" introduced by an amendment on 2024-06-01.
  fn carve_out() -> TermHistory {
    TermHistory {
      term:      term(2, "carve_out", "transplants", None, at(2024, 6, 1)),
      revisions: vec![rev(2, 2, None, "transplants", at(2024, 6, 1))],
    }
  }

  #[test]
  fn value_at_walks_the_chain() {
    let h = copay();
    assert_eq!(h.value_at(at(2023, 12, 31)), None);
    assert_eq!(h.value_at(at(2024, 1, 1)), Some("50"));
    assert_eq!(h.value_at(at(2024, 2, 1)), Some("50"));
    assert_eq!(h.value_at(at(2024, 3, 1)), Some("75"));
    assert_eq!(h.value_at(at(2024, 4, 1)), Some("75"));
  }

  #[test]
  fn amendment_introduced_term_is_absent_before_introduction() {
    let h = carve_out();
    assert_eq!(h.value_at(at(2024, 5, 31)), None);
    assert_eq!(h.value_at(at(2024, 6, 1)), Some("transplants"));
  }

  #[test]
  fn same_instant_revisions_resolve_to_the_later_one() {
    let h = TermHistory {
      term:      term(1, "rate", "c", Some("a"), at(2024, 1, 1)),
      revisions: vec![
        rev(1, 1, Some("a"), "b", at(2024, 3, 1)),
        rev(2, 1, Some("b"), "c", at(2024, 3, 1)),
      ],
    };
    h.verify().unwrap();
    assert_eq!(h.value_at(at(2024, 3, 1)), Some("c"));
  }

  #[test]
  fn snapshot_omits_terms_not_yet_introduced() {
    let hs = [copay(), carve_out()];
    let early = snapshot(ContractId(1), &hs, at(2024, 2, 1));
    assert_eq!(early.terms.len(), 1);
    assert_eq!(early.terms["stop_loss_copay"], "50");

    let late = snapshot(ContractId(1), &hs, at(2024, 7, 1));
    assert_eq!(late.terms.len(), 2);
    assert_eq!(late.terms, current_values(&hs));
  }

  #[test]
  fn diff_reports_changed_added_and_removed() {
    let hs = [copay(), carve_out()];
    let changes = diff(
      &snapshot(ContractId(1), &hs, at(2024, 2, 1)),
      &snapshot(ContractId(1), &hs, at(2024, 7, 1)),
    );
    assert_eq!(changes, vec![
      TermChange {
        term_name: "carve_out".into(),
        old_value: None,
        new_value: Some("transplants".into()),
      },
      TermChange {
        term_name: "stop_loss_copay".into(),
        old_value: Some("50".into()),
        new_value: Some("75".into()),
      },
    ]);

    let none = diff(
      &snapshot(ContractId(1), &hs, at(2024, 3, 2)),
      &snapshot(ContractId(1), &hs, at(2024, 5, 1)),
    );
    assert!(none.is_empty());
  }

  #[test]
  fn verify_accepts_intact_chains() {
    verify_all(&[copay(), carve_out()]).unwrap();
    assert_eq!(copay().replay(), Some("75"));
  }

  #[test]
  fn verify_rejects_broken_link() {
    let mut h = copay();
    h.revisions[0].prev_value = Some("40".into());
    assert!(matches!(h.verify(), Err(Error::ChainCorruption { .. })));
  }

  #[test]
  fn verify_rejects_current_value_drift() {
    let mut h = copay();
    h.term.term_value = "99".into();
    assert!(matches!(h.verify(), Err(Error::ChainCorruption { .. })));
  }

  #[test]
  fn verify_rejects_revision_before_introduction() {
    let mut h = carve_out();
    h.revisions[0].changed_at = at(2024, 5, 1);
    assert!(matches!(h.verify(), Err(Error::ChainCorruption { .. })));
  }

  #[test]
  fn verify_rejects_foreign_revision() {
    let mut h = copay();
    h.revisions[0].term_id = TermId(42);
    assert!(matches!(h.verify(), Err(Error::ChainCorruption { .. })));
  }
}
