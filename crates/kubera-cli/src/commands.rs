//! Subcommand implementations. Each opens no resources of its own; the store
//! is passed in by `main`.
//!
//! `ingest` and `amend` record their source document before creating the
//! contract or committing the amendment, since both must reference an existing
//! document. The document store is not rolled back when that later step is
//! rejected; the document row stays, referenced by nothing.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use kubera_core::{
  amendment::{AmendmentDraft, ProposedChange},
  contract::ContractQuery,
  entity::NewDocument,
  ids::{ContractId, PayorId, ProviderId},
  store::ContractStore,
  time::parse_instant,
};
use kubera_ingest::{IngestOptions, parse_sheet};
use tracing::info;

use crate::output::Output;

/// Create a contract from a sheet. The sheet's document is stored first and
/// kept even if contract creation fails.
pub async fn ingest<S: ContractStore>(
  store: &S,
  out: &Output,
  file: &Path,
  provider_name: String,
  create_provider: bool,
  term_months: u32,
) -> Result<()> {
  let raw = std::fs::read_to_string(file)
    .with_context(|| format!("reading contract sheet {}", file.display()))?;
  let sheet = parse_sheet(&raw, &IngestOptions { default_term_months: term_months })
    .with_context(|| format!("parsing contract sheet {}", file.display()))?;

  let provider = match store.find_provider(provider_name.clone()).await? {
    Some(p) => p,
    None if create_provider => store.create_provider(provider_name).await?,
    None => bail!("provider {provider_name:?} does not exist (pass --create-provider to create it)"),
  };
  let payor = store.create_payor(sheet.payor_name.clone()).await?;
  let document = store
    .store_document(NewDocument::from_path(sheet.document_path.clone()))
    .await?;

  let contract = store
    .create_contract(sheet.to_new_contract(
      provider.provider_id,
      payor.payor_id,
      document.document_id,
    ))
    .await
    .context("creating contract")?;
  info!(
    contract_id = %contract.contract_id,
    terms = sheet.terms.len(),
    "contract sheet ingested"
  );

  let terms = store.current_terms(contract.contract_id).await?;
  out.contract(&contract, &terms)
}

pub async fn contracts<S: ContractStore>(
  store: &S,
  out: &Output,
  provider_id: Option<i64>,
  payor_id: Option<i64>,
) -> Result<()> {
  let query = ContractQuery {
    provider_id: provider_id.map(ProviderId),
    payor_id:    payor_id.map(PayorId),
  };
  out.contracts(&store.list_contracts(query).await?)
}

pub async fn contract<S: ContractStore>(store: &S, out: &Output, id: ContractId) -> Result<()> {
  let contract = store.get_contract(id).await?;
  let terms = store.current_terms(id).await?;
  out.contract(&contract, &terms)
}

/// Commit an amendment backed by `document_path`. The document is stored
/// first and kept even if the amendment is rejected.
pub async fn amend<S: ContractStore>(
  store: &S,
  out: &Output,
  id: ContractId,
  document_path: String,
  date: NaiveDate,
  set: Vec<(String, String)>,
  expect: Vec<(String, String)>,
) -> Result<()> {
  // Fail on an unknown contract before recording a document for it.
  store.get_contract(id).await?;

  if let Some((name, _)) = expect.iter().find(|(n, _)| !set.iter().any(|(s, _)| s == n)) {
    bail!("--expect {name}=... names a term that is not being --set");
  }

  let document = store.store_document(NewDocument::from_path(document_path)).await?;

  let draft = set.into_iter().fold(
    AmendmentDraft::new(id, document.document_id, date),
    |draft, (name, value)| {
      let mut change = ProposedChange::new(name.clone(), value);
      if let Some((_, expected)) = expect.iter().find(|(n, _)| *n == name) {
        change = change.expecting(expected.clone());
      }
      draft.propose(change)
    },
  );

  let committed = store.commit_amendment(draft).await?;
  out.committed(&committed)
}

pub async fn amendments<S: ContractStore>(store: &S, out: &Output, id: ContractId) -> Result<()> {
  out.amendments(&store.list_amendments(id).await?)
}

pub async fn history<S: ContractStore>(
  store: &S,
  out: &Output,
  id: ContractId,
  term: String,
) -> Result<()> {
  let revisions = store.history(id, term.clone()).await?;
  out.history(&term, &revisions)
}

pub async fn as_of<S: ContractStore>(store: &S, out: &Output, id: ContractId, at: &str) -> Result<()> {
  let at = parse_instant(at)?;
  out.snapshot(&store.as_of(id, at).await?)
}

pub async fn diff<S: ContractStore>(
  store: &S,
  out: &Output,
  id: ContractId,
  from: &str,
  to: &str,
) -> Result<()> {
  let (from, to) = (parse_instant(from)?, parse_instant(to)?);
  out.changes(&store.diff(id, from, to).await?)
}

pub async fn verify<S: ContractStore>(store: &S, out: &Output, id: ContractId) -> Result<()> {
  out.report(&store.verify_contract(id).await?)
}

#[cfg(test)]
mod tests {
  use kubera_core::ids::DocumentId;
  use kubera_store_sqlite::SqliteStore;

  use super::*;

  const SHEET: &str = "Key,Value\n\
                       Effective Date,01-Jan-24\n\
                       Payor Name,Acme Health\n\
                       Stop Loss Threshold,\"$250,000\"\n\
                       PDF_filename,contracts/acme.pdf\n\
                       stop_loss_copay,50\n";

  fn sheet_file(name: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("kubera-cli-{}-{name}.csv", std::process::id()));
    std::fs::write(&path, SHEET).unwrap();
    path
  }

  #[tokio::test]
  async fn ingest_then_amend() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let out = Output { json: true };
    let file = sheet_file("amend");

    ingest(&store, &out, &file, "ABC Healthcare".into(), true, 12)
      .await
      .unwrap();
    let id = ContractId(1);
    assert_eq!(store.current_value(id, "stop_loss_copay".into()).await.unwrap(), "50");

    amend(
      &store,
      &out,
      id,
      "amendments/a1.pdf".into(),
      NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
      vec![("stop_loss_copay".into(), "75".into())],
      vec![("stop_loss_copay".into(), "50".into())],
    )
    .await
    .unwrap();
    assert_eq!(store.current_value(id, "stop_loss_copay".into()).await.unwrap(), "75");

    std::fs::remove_file(file).ok();
  }

  #[tokio::test]
  async fn rejected_amend_keeps_its_document() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let out = Output { json: true };
    let file = sheet_file("rejected");
    ingest(&store, &out, &file, "ABC Healthcare".into(), true, 12)
      .await
      .unwrap();
    let id = ContractId(1);

    let err = amend(
      &store,
      &out,
      id,
      "amendments/late.pdf".into(),
      NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
      vec![("stop_loss_copay".into(), "75".into())],
      vec![("stop_loss_copay".into(), "40".into())],
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("conflicting edit"));

    assert!(store.list_amendments(id).await.unwrap().is_empty());
    let document = store.get_document(DocumentId(2)).await.unwrap().unwrap();
    assert_eq!(document.file_path, "amendments/late.pdf");
    std::fs::remove_file(file).ok();
  }

  #[tokio::test]
  async fn ingest_requires_known_provider() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let file = sheet_file("provider");
    let err = ingest(&store, &Output { json: true }, &file, "Nobody".into(), false, 12)
      .await
      .unwrap_err();
    assert!(err.to_string().contains("--create-provider"));
    assert!(store.list_contracts(ContractQuery::default()).await.unwrap().is_empty());
    std::fs::remove_file(file).ok();
  }
}
