//! [`SqliteStore`] — the SQLite implementation of [`ContractStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use tracing::{debug, error, info, warn};

use kubera_core::{
  Error as CoreError,
  amendment::{Amendment, AmendmentDraft, AmendmentState, CommittedAmendment},
  contract::{Contract, ContractQuery, NewContract},
  entity::{Document, NewDocument, Payor, Provider},
  ids::{ContractId, DocumentId, PayorId, ProviderId},
  policy::TermPolicy,
  store::{ContractStore, VerificationReport},
  temporal::{self, TermChange, TermHistory, TermSnapshot},
  term::{ContractTerm, TermRevision},
  time::start_of_day,
};

use crate::{
  Error, Result,
  encode::{
    AMENDMENT_COLUMNS, CONTRACT_COLUMNS, DOCUMENT_COLUMNS, RawAmendment, RawContract,
    RawDocument, RawParty, encode_date, encode_decimal, encode_dt,
  },
  ledger,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Kubera contract ledger backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  policy: TermPolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, policy: TermPolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, policy: TermPolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the amendment policy.
  pub fn with_policy(mut self, policy: TermPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn policy(&self) -> TermPolicy { self.policy }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the database thread, propagating this crate's error type.
  pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Load and verify every term history of an existing contract.
  async fn verified_histories(&self, contract_id: ContractId) -> Result<Vec<TermHistory>> {
    let histories = self
      .with_conn(move |conn| {
        require_contract(conn, contract_id)?;
        ledger::histories(conn, contract_id)
      })
      .await?;

    if let Err(e) = temporal::verify_all(&histories) {
      error!(%contract_id, error = %e, "revision chain verification failed");
      return Err(e.into());
    }
    Ok(histories)
  }
}

// ─── Sync helpers ────────────────────────────────────────────────────────────

fn exists(conn: &Connection, sql: &str, id: i64) -> Result<bool> {
  Ok(
    conn
      .query_row(sql, [id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn load_contract(conn: &Connection, id: ContractId) -> Result<Option<Contract>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE contract_id = ?1"),
      [id.0],
      RawContract::from_row,
    )
    .optional()?;
  raw.map(RawContract::into_contract).transpose()
}

fn require_contract(conn: &Connection, id: ContractId) -> Result<Contract> {
  load_contract(conn, id)?.ok_or_else(|| CoreError::ContractNotFound(id).into())
}

fn require_document(conn: &Connection, id: DocumentId) -> Result<()> {
  if exists(conn, "SELECT 1 FROM documents WHERE document_id = ?1", id.0)? {
    Ok(())
  } else {
    Err(CoreError::DocumentNotFound(id).into())
  }
}

/// Insert a provider or payor unless the name is taken, then read it back.
fn upsert_party(
  conn: &Connection,
  table: &str,
  id_column: &str,
  name: &str,
) -> Result<RawParty> {
  conn.execute(
    &format!(
      "INSERT INTO {table} (name, created_at) VALUES (?1, ?2)
       ON CONFLICT(name) DO NOTHING"
    ),
    rusqlite::params![name, encode_dt(Utc::now())],
  )?;
  Ok(conn.query_row(
    &format!("SELECT {id_column}, name, created_at FROM {table} WHERE name = ?1"),
    [name],
    RawParty::from_row,
  )?)
}

fn party_by(
  conn: &Connection,
  table: &str,
  id_column: &str,
  key_column: &str,
  key: impl rusqlite::ToSql,
) -> Result<Option<RawParty>> {
  Ok(
    conn
      .query_row(
        &format!(
          "SELECT {id_column}, name, created_at FROM {table} WHERE {key_column} = ?1"
        ),
        [key],
        RawParty::from_row,
      )
      .optional()?,
  )
}

// ─── ContractStore impl ──────────────────────────────────────────────────────

impl ContractStore for SqliteStore {
  type Error = Error;

  // ── Entity store ──────────────────────────────────────────────────────────

  async fn create_provider(&self, name: String) -> Result<Provider> {
    let raw = self
      .with_conn(move |conn| upsert_party(conn, "healthcare_providers", "provider_id", &name))
      .await?;
    raw.into_provider()
  }

  async fn get_provider(&self, id: ProviderId) -> Result<Option<Provider>> {
    self
      .with_conn(move |conn| {
        party_by(conn, "healthcare_providers", "provider_id", "provider_id", id.0)
      })
      .await?
      .map(RawParty::into_provider)
      .transpose()
  }

  async fn find_provider(&self, name: String) -> Result<Option<Provider>> {
    self
      .with_conn(move |conn| {
        party_by(conn, "healthcare_providers", "provider_id", "name", name)
      })
      .await?
      .map(RawParty::into_provider)
      .transpose()
  }

  async fn create_payor(&self, name: String) -> Result<Payor> {
    let raw = self
      .with_conn(move |conn| upsert_party(conn, "payors", "payor_id", &name))
      .await?;
    raw.into_payor()
  }

  async fn get_payor(&self, id: PayorId) -> Result<Option<Payor>> {
    self
      .with_conn(move |conn| party_by(conn, "payors", "payor_id", "payor_id", id.0))
      .await?
      .map(RawParty::into_payor)
      .transpose()
  }

  async fn find_payor(&self, name: String) -> Result<Option<Payor>> {
    self
      .with_conn(move |conn| party_by(conn, "payors", "payor_id", "name", name))
      .await?
      .map(RawParty::into_payor)
      .transpose()
  }

  // ── Document store ────────────────────────────────────────────────────────

  async fn store_document(&self, input: NewDocument) -> Result<Document> {
    let uploaded_at = Utc::now();
    let at_str = encode_dt(uploaded_at);
    let NewDocument { filename, file_path } = input;
    let (name, path) = (filename.clone(), file_path.clone());

    let document_id = self
      .with_conn(move |conn| {
        conn.execute(
          "INSERT INTO documents (filename, file_path, uploaded_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![name, path, at_str],
        )?;
        Ok(DocumentId(conn.last_insert_rowid()))
      })
      .await?;

    debug!(%document_id, %filename, "document stored");
    Ok(Document { document_id, filename, file_path, uploaded_at })
  }

  async fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
    let raw = self
      .with_conn(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE document_id = ?1"),
              [id.0],
              RawDocument::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawDocument::into_document).transpose()
  }

  // ── Contract repository ───────────────────────────────────────────────────

  async fn create_contract(&self, input: NewContract) -> Result<Contract> {
    input.validate()?;

    let created_at = Utc::now();
    let introduced_at = start_of_day(input.effective_date);

    let contract = self
      .with_conn(move |conn| {
        if !exists(
          conn,
          "SELECT 1 FROM healthcare_providers WHERE provider_id = ?1",
          input.provider_id.0,
        )? {
          return Err(CoreError::ProviderNotFound(input.provider_id).into());
        }
        if !exists(conn, "SELECT 1 FROM payors WHERE payor_id = ?1", input.payor_id.0)? {
          return Err(CoreError::PayorNotFound(input.payor_id).into());
        }
        require_document(conn, input.document_id)?;

        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO contracts (
             provider_id, payor_id, document_id, effective_date, termination_date,
             termination_notice_days, stop_loss_threshold, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            input.provider_id.0,
            input.payor_id.0,
            input.document_id.0,
            encode_date(input.effective_date),
            encode_date(input.termination_date),
            input.termination_notice_days,
            encode_decimal(input.stop_loss_threshold),
            encode_dt(created_at),
          ],
        )?;
        let contract_id = ContractId(tx.last_insert_rowid());

        for (name, value) in &input.initial_terms {
          ledger::insert_initial_term(&tx, contract_id, name, value, introduced_at, created_at)?;
        }
        tx.commit()?;

        Ok(Contract {
          contract_id,
          provider_id: input.provider_id,
          payor_id: input.payor_id,
          document_id: input.document_id,
          effective_date: input.effective_date,
          termination_date: input.termination_date,
          termination_notice_days: input.termination_notice_days,
          stop_loss_threshold: input.stop_loss_threshold,
          created_at,
        })
      })
      .await?;

    info!(
      contract_id = %contract.contract_id,
      provider_id = %contract.provider_id,
      payor_id = %contract.payor_id,
      "contract created"
    );
    Ok(contract)
  }

  async fn get_contract(&self, id: ContractId) -> Result<Contract> {
    self.with_conn(move |conn| require_contract(conn, id)).await
  }

  async fn list_contracts(&self, query: ContractQuery) -> Result<Vec<Contract>> {
    let raws: Vec<RawContract> = self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTRACT_COLUMNS} FROM contracts
           WHERE (?1 IS NULL OR provider_id = ?1)
             AND (?2 IS NULL OR payor_id = ?2)
           ORDER BY contract_id"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![query.provider_id.map(|p| p.0), query.payor_id.map(|p| p.0)],
            RawContract::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContract::into_contract).collect()
  }

  // ── Term ledger ───────────────────────────────────────────────────────────

  async fn current_value(&self, contract_id: ContractId, term_name: String) -> Result<String> {
    self
      .with_conn(move |conn| {
        require_contract(conn, contract_id)?;
        match ledger::term(conn, contract_id, &term_name)? {
          Some(term) => Ok(term.term_value),
          None => Err(CoreError::TermNotFound { contract_id, term_name }.into()),
        }
      })
      .await
  }

  async fn current_terms(&self, contract_id: ContractId) -> Result<Vec<ContractTerm>> {
    self
      .with_conn(move |conn| {
        require_contract(conn, contract_id)?;
        ledger::terms(conn, contract_id)
      })
      .await
  }

  async fn history(
    &self,
    contract_id: ContractId,
    term_name: String,
  ) -> Result<Vec<TermRevision>> {
    let history = self
      .with_conn(move |conn| {
        require_contract(conn, contract_id)?;
        let term = ledger::term(conn, contract_id, &term_name)?
          .ok_or(CoreError::TermNotFound { contract_id, term_name })?;
        let revisions = ledger::revisions(conn, term.term_id)?;
        Ok(TermHistory { term, revisions })
      })
      .await?;

    if let Err(e) = history.verify() {
      error!(%contract_id, term_id = %history.term.term_id, error = %e, "revision chain verification failed");
      return Err(e.into());
    }
    Ok(history.revisions)
  }

  // ── Amendment processor ───────────────────────────────────────────────────

  async fn commit_amendment(&self, draft: AmendmentDraft) -> Result<CommittedAmendment> {
    let contract_id = draft.contract_id;
    let amendment_date = draft.amendment_date;
    debug!(
      %contract_id,
      %amendment_date,
      changes = draft.changes.len(),
      state = %AmendmentState::Drafted,
      "amendment received"
    );

    let document_id = draft.document_id;
    let (contract, entries) = self
      .with_conn(move |conn| {
        let contract = require_contract(conn, contract_id)?;
        require_document(conn, document_id)?;
        Ok((contract, ledger::ledger_entries(conn, contract_id)?))
      })
      .await?;

    debug!(%contract_id, state = %AmendmentState::Validating, "validating amendment");
    let validated = match draft.validate(&contract, &entries, &self.policy) {
      Ok(v) => v,
      Err(e) => {
        warn!(%contract_id, %amendment_date, state = %AmendmentState::Rejected, error = %e, "amendment rejected");
        return Err(e.into());
      }
    };

    let committed = match self
      .with_conn(move |conn| ledger::commit(conn, &validated))
      .await
    {
      Ok(c) => c,
      Err(e) => {
        warn!(%contract_id, %amendment_date, state = %AmendmentState::Rejected, error = %e, "amendment rejected");
        return Err(e);
      }
    };

    info!(
      %contract_id,
      amendment_id = %committed.amendment.amendment_id,
      %amendment_date,
      revisions = committed.revisions.len(),
      state = %AmendmentState::Committed,
      "amendment committed"
    );
    Ok(committed)
  }

  async fn list_amendments(&self, contract_id: ContractId) -> Result<Vec<Amendment>> {
    let raws: Vec<RawAmendment> = self
      .with_conn(move |conn| {
        require_contract(conn, contract_id)?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {AMENDMENT_COLUMNS} FROM amendments
           WHERE contract_id = ?1
           ORDER BY amendment_date, amendment_id"
        ))?;
        let rows = stmt
          .query_map([contract_id.0], RawAmendment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAmendment::into_amendment).collect()
  }

  // ── Temporal queries ──────────────────────────────────────────────────────

  async fn as_of(&self, contract_id: ContractId, at: DateTime<Utc>) -> Result<TermSnapshot> {
    let histories = self.verified_histories(contract_id).await?;
    Ok(temporal::snapshot(contract_id, &histories, at))
  }

  async fn diff(
    &self,
    contract_id: ContractId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<Vec<TermChange>> {
    let histories = self.verified_histories(contract_id).await?;
    Ok(temporal::diff(
      &temporal::snapshot(contract_id, &histories, from),
      &temporal::snapshot(contract_id, &histories, to),
    ))
  }

  async fn verify_contract(&self, contract_id: ContractId) -> Result<VerificationReport> {
    let histories = self.verified_histories(contract_id).await?;
    let report = VerificationReport {
      contract_id,
      terms_checked: histories.len(),
      revisions_checked: histories.iter().map(|h| h.revisions.len()).sum(),
    };
    info!(
      %contract_id,
      terms = report.terms_checked,
      revisions = report.revisions_checked,
      "contract verified"
    );
    Ok(report)
  }
}
