//! The term ledger: current values plus the append-only revision log.
//!
//! These are synchronous functions over a borrowed connection; [`SqliteStore`]
//! runs them on the `tokio_rusqlite` worker thread. Anything that writes takes
//! a [`Transaction`] so a current value can never be updated without its
//! revision (or vice versa).
//!
//! [`SqliteStore`]: crate::SqliteStore

use chrono::{DateTime, Utc};
use kubera_core::{
  Error as CoreError,
  amendment::{
    Amendment, CommittedAmendment, Expected, LedgerEntry, TermTarget, ValidatedAmendment,
  },
  ids::{AmendmentId, ContractId, RevisionId, TermId},
  temporal::TermHistory,
  term::{ContractTerm, TermRevision},
};
use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{
    REVISION_COLUMNS, RawRevision, RawTerm, TERM_COLUMNS, decode_dt, encode_date,
    encode_dt,
  },
};

// ─── Reads ───────────────────────────────────────────────────────────────────

/// All term rows of a contract, ordered by name.
pub fn terms(conn: &Connection, contract_id: ContractId) -> Result<Vec<ContractTerm>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {TERM_COLUMNS} FROM contract_terms
     WHERE contract_id = ?1
     ORDER BY term_name"
  ))?;
  let raws = stmt
    .query_map([contract_id.0], RawTerm::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawTerm::into_term).collect()
}

/// One term row by name.
pub fn term(
  conn: &Connection,
  contract_id: ContractId,
  term_name: &str,
) -> Result<Option<ContractTerm>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {TERM_COLUMNS} FROM contract_terms
         WHERE contract_id = ?1 AND term_name = ?2"
      ),
      rusqlite::params![contract_id.0, term_name],
      RawTerm::from_row,
    )
    .optional()?;
  raw.map(RawTerm::into_term).transpose()
}

/// The revisions of one term, ordered by `(changed_at, revision_id)`.
pub fn revisions(conn: &Connection, term_id: TermId) -> Result<Vec<TermRevision>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {REVISION_COLUMNS} FROM contract_term_revisions
     WHERE term_id = ?1
     ORDER BY changed_at, revision_id"
  ))?;
  let raws = stmt
    .query_map([term_id.0], RawRevision::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawRevision::into_revision).collect()
}

/// Every term of a contract with its full revision chain.
pub fn histories(conn: &Connection, contract_id: ContractId) -> Result<Vec<TermHistory>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {REVISION_COLUMNS} FROM contract_term_revisions
     WHERE term_id IN (SELECT term_id FROM contract_terms WHERE contract_id = ?1)
     ORDER BY term_id, changed_at, revision_id"
  ))?;
  let raws = stmt
    .query_map([contract_id.0], RawRevision::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut all: Vec<TermRevision> = raws
    .into_iter()
    .map(RawRevision::into_revision)
    .collect::<Result<_>>()?;

  terms(conn, contract_id)?
    .into_iter()
    .map(|term| {
      let (mine, rest): (Vec<_>, Vec<_>) =
        std::mem::take(&mut all).into_iter().partition(|r| r.term_id == term.term_id);
      all = rest;
      Ok(TermHistory { term, revisions: mine })
    })
    .collect()
}

/// Each term of a contract with the instant of its latest revision and its
/// version.
pub fn ledger_entries(conn: &Connection, contract_id: ContractId) -> Result<Vec<LedgerEntry>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {TERM_COLUMNS},
            (SELECT MAX(r.changed_at) FROM contract_term_revisions r
              WHERE r.term_id = contract_terms.term_id),
            version
     FROM contract_terms
     WHERE contract_id = ?1
     ORDER BY term_name"
  ))?;
  let rows = stmt
    .query_map([contract_id.0], |row| {
      Ok((
        RawTerm::from_row(row)?,
        row.get::<_, Option<String>>(7)?,
        row.get::<_, i64>(8)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  rows
    .into_iter()
    .map(|(raw, last, version)| {
      Ok(LedgerEntry {
        term: raw.into_term()?,
        last_changed_at: last.as_deref().map(decode_dt).transpose()?,
        version,
      })
    })
    .collect()
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Insert a term created together with its contract; its value is also its
/// inception value.
pub fn insert_initial_term(
  tx: &Transaction<'_>,
  contract_id: ContractId,
  term_name: &str,
  value: &str,
  introduced_at: DateTime<Utc>,
  created_at: DateTime<Utc>,
) -> Result<TermId> {
  tx.execute(
    "INSERT INTO contract_terms
       (contract_id, term_name, term_value, inception_value, introduced_at, created_at)
     VALUES (?1, ?2, ?3, ?3, ?4, ?5)",
    rusqlite::params![
      contract_id.0,
      term_name,
      value,
      encode_dt(introduced_at),
      encode_dt(created_at),
    ],
  )?;
  Ok(TermId(tx.last_insert_rowid()))
}

/// Insert the row for a term introduced by an amendment. The row has no value
/// until [`apply_revision`] gives it one within the same transaction.
///
/// Fails with `StaleValue` if the term already exists, i.e. a concurrent
/// commit introduced it first.
fn introduce_term(
  tx: &Transaction<'_>,
  contract_id: ContractId,
  term_name: &str,
  introduced_at: DateTime<Utc>,
) -> Result<TermId> {
  let existing: Option<Option<String>> = tx
    .query_row(
      "SELECT term_value FROM contract_terms WHERE contract_id = ?1 AND term_name = ?2",
      rusqlite::params![contract_id.0, term_name],
      |r| r.get(0),
    )
    .optional()?;
  if let Some(actual) = existing {
    return Err(CoreError::StaleValue {
      term_name: term_name.to_owned(),
      expected:  None,
      actual,
    }
    .into());
  }

  let now = encode_dt(Utc::now());
  tx.execute(
    "INSERT INTO contract_terms
       (contract_id, term_name, term_value, inception_value, introduced_at, created_at)
     VALUES (?1, ?2, NULL, NULL, ?3, ?4)",
    rusqlite::params![contract_id.0, term_name, encode_dt(introduced_at), now],
  )?;
  Ok(TermId(tx.last_insert_rowid()))
}

/// Claim a term for the amendment being committed: bump its version if it is
/// still at `version` and still holds `value`.
///
/// Every existing term an amendment names is claimed, including those whose
/// value it leaves alone, so two amendments planned against the same term
/// version cannot both commit. Fails with `StaleValue` otherwise.
pub fn claim_term(
  tx: &Transaction<'_>,
  term_id: TermId,
  version: i64,
  value: &str,
) -> Result<()> {
  let updated = tx.execute(
    "UPDATE contract_terms SET version = version + 1
     WHERE term_id = ?1 AND version = ?2 AND term_value IS ?3",
    rusqlite::params![term_id.0, version, value],
  )?;
  if updated == 0 {
    return Err(stale(tx, term_id, Some(value))?);
  }
  Ok(())
}

/// The error for a failed compare-and-swap on `term_id`.
fn stale(tx: &Transaction<'_>, term_id: TermId, expected: Option<&str>) -> Result<Error> {
  let row: Option<(String, Option<String>)> = tx
    .query_row(
      "SELECT term_name, term_value FROM contract_terms WHERE term_id = ?1",
      [term_id.0],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;
  Ok(
    match row {
      None => CoreError::UnknownTerm(term_id),
      Some((term_name, actual)) => CoreError::StaleValue {
        term_name,
        expected: expected.map(str::to_owned),
        actual,
      },
    }
    .into(),
  )
}

/// Compare-and-swap a term's current value from `prev_value` to `new_value`
/// and append the matching revision.
///
/// Fails with `StaleValue` if the term no longer holds `prev_value`, or if it
/// already has a revision later than `changed_at` (someone committed in
/// between, even if the value came back around). Nothing is written on
/// failure; the caller's transaction is expected to roll back.
pub fn apply_revision(
  tx: &Transaction<'_>,
  term_id: TermId,
  amendment_id: AmendmentId,
  prev_value: Option<&str>,
  new_value: &str,
  changed_at: DateTime<Utc>,
) -> Result<TermRevision> {
  let changed_at_str = encode_dt(changed_at);

  let updated = tx.execute(
    "UPDATE contract_terms SET term_value = ?1
     WHERE term_id = ?2
       AND term_value IS ?3
       AND NOT EXISTS (
         SELECT 1 FROM contract_term_revisions r
         WHERE r.term_id = ?2 AND r.changed_at > ?4
       )",
    rusqlite::params![new_value, term_id.0, prev_value, changed_at_str],
  )?;

  if updated == 0 {
    return Err(stale(tx, term_id, prev_value)?);
  }

  tx.execute(
    "INSERT INTO contract_term_revisions
       (term_id, amendment_id, prev_value, new_value, changed_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![term_id.0, amendment_id.0, prev_value, new_value, changed_at_str],
  )?;
  let revision_id = RevisionId(tx.last_insert_rowid());
  debug!(%term_id, %revision_id, %amendment_id, "revision applied");

  Ok(TermRevision {
    revision_id,
    term_id,
    amendment_id,
    prev_value: prev_value.map(str::to_owned),
    new_value: new_value.to_owned(),
    changed_at,
  })
}

/// Persist a validated amendment and apply every planned revision in one
/// `IMMEDIATE` transaction.
///
/// The amendment row is written first to obtain its id. Held terms are claimed
/// next, then each revision claims its term and is applied. A `StaleValue`
/// from any step aborts the whole batch and is reported as `ConflictingEdit`
/// against the value validation planned for.
pub fn commit(
  conn: &mut Connection,
  amendment: &ValidatedAmendment,
) -> Result<CommittedAmendment> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let created_at = Utc::now();

  tx.execute(
    "INSERT INTO amendments (contract_id, document_id, amendment_date, created_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      amendment.contract_id().0,
      amendment.document_id().0,
      encode_date(amendment.amendment_date()),
      encode_dt(created_at),
    ],
  )?;
  let amendment_id = AmendmentId(tx.last_insert_rowid());

  for held in amendment.held() {
    match claim_term(&tx, held.term_id, held.version, &held.value) {
      Ok(()) => {}
      Err(Error::Core(CoreError::StaleValue { term_name, actual, .. })) => {
        return Err(
          CoreError::ConflictingEdit {
            term_name,
            expected: Expected::Value(held.value.clone()),
            actual,
          }
          .into(),
        );
      }
      Err(e) => return Err(e),
    }
  }

  let mut revisions = Vec::with_capacity(amendment.revisions().len());
  for planned in amendment.revisions() {
    let applied = match planned.target {
      TermTarget::Existing { term_id, version } => {
        let prev = planned.prev_value.as_deref().unwrap_or_default();
        claim_term(&tx, term_id, version, prev).map(|()| term_id)
      }
      TermTarget::New => introduce_term(
        &tx,
        amendment.contract_id(),
        &planned.term_name,
        amendment.changed_at(),
      ),
    }
    .and_then(|term_id| {
      apply_revision(
        &tx,
        term_id,
        amendment_id,
        planned.prev_value.as_deref(),
        &planned.new_value,
        amendment.changed_at(),
      )
    });

    match applied {
      Ok(revision) => revisions.push(revision),
      Err(Error::Core(CoreError::StaleValue { term_name, actual, .. })) => {
        return Err(
          CoreError::ConflictingEdit { term_name, expected: planned.expected(), actual }
            .into(),
        );
      }
      Err(e) => return Err(e),
    }
  }

  tx.commit()?;

  Ok(CommittedAmendment {
    amendment: Amendment {
      amendment_id,
      contract_id: amendment.contract_id(),
      document_id: amendment.document_id(),
      amendment_date: amendment.amendment_date(),
      created_at,
    },
    revisions,
  })
}
