//! `kubera` — command-line access to a Kubera contract ledger.
//!
//! # Usage
//!
//! ```text
//! kubera --store kubera.db ingest data.csv --provider "ABC Healthcare" --create-provider
//! kubera amend 1 --document amendments/a1.pdf --date 2024-03-01 --set stop_loss_copay=75
//! kubera as-of 1 2024-02-01
//! kubera --json history 1 stop_loss_copay
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use kubera_core::{ids::ContractId, policy::TermPolicy};
use kubera_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "kubera", version, about = "Contract term ledger for payor/provider agreements")]
struct Args {
  /// SQLite database file.
  #[arg(long, env = "KUBERA_STORE", default_value = "kubera.db", value_name = "FILE")]
  store: PathBuf,

  /// Print results as JSON instead of text.
  #[arg(long, global = true)]
  json: bool,

  /// Reject amendments that introduce terms a contract does not have.
  #[arg(long, global = true)]
  no_new_terms: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create a contract from a `Key,Value` contract sheet. The sheet's document
  /// is recorded even if the contract is rejected.
  Ingest {
    /// The CSV sheet to read.
    file: PathBuf,
    /// Name of the healthcare provider the contract belongs to.
    #[arg(long)]
    provider: String,
    /// Create the provider if it does not exist yet.
    #[arg(long)]
    create_provider: bool,
    /// Contract length when the sheet has no termination date.
    #[arg(long, default_value_t = 12)]
    term_months: u32,
  },

  /// List contracts.
  Contracts {
    #[arg(long)]
    provider_id: Option<i64>,
    #[arg(long)]
    payor_id: Option<i64>,
  },

  /// Show a contract and its current terms.
  Contract { id: i64 },

  /// Commit an amendment. The document is recorded even if the amendment is
  /// rejected.
  Amend {
    id: i64,
    /// Path of the amendment document in the document store.
    #[arg(long)]
    document: String,
    /// Amendment date (YYYY-MM-DD).
    #[arg(long)]
    date: NaiveDate,
    /// A change to apply, as `name=value`. Repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_pair, required = true)]
    set: Vec<(String, String)>,
    /// Require a term to currently hold a value, as `name=value`. Repeatable.
    #[arg(long = "expect", value_name = "NAME=VALUE", value_parser = parse_pair)]
    expect: Vec<(String, String)>,
  },

  /// List a contract's amendments.
  Amendments { id: i64 },

  /// Show a term's revision history.
  History { id: i64, term: String },

  /// Reconstruct a contract's terms at an instant (RFC 3339 or YYYY-MM-DD).
  AsOf { id: i64, at: String },

  /// Show terms that differ between two instants.
  Diff { id: i64, from: String, to: String },

  /// Check every revision chain of a contract.
  Verify { id: i64 },
}

/// Parse `name=value`; the value may itself contain `=`.
fn parse_pair(s: &str) -> Result<(String, String), String> {
  let (name, value) = s
    .split_once('=')
    .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))?;
  let name = name.trim();
  if name.is_empty() {
    return Err(format!("empty term name in {s:?}"));
  }
  Ok((name.to_owned(), value.to_owned()))
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let store = SqliteStore::open(&args.store)
    .await
    .with_context(|| format!("opening store {}", args.store.display()))?
    .with_policy(TermPolicy { allow_new_terms: !args.no_new_terms });

  let out = output::Output { json: args.json };

  match args.command {
    Command::Ingest { file, provider, create_provider, term_months } => {
      commands::ingest(&store, &out, &file, provider, create_provider, term_months).await
    }
    Command::Contracts { provider_id, payor_id } => {
      commands::contracts(&store, &out, provider_id, payor_id).await
    }
    Command::Contract { id } => commands::contract(&store, &out, ContractId(id)).await,
    Command::Amend { id, document, date, set, expect } => {
      commands::amend(&store, &out, ContractId(id), document, date, set, expect).await
    }
    Command::Amendments { id } => commands::amendments(&store, &out, ContractId(id)).await,
    Command::History { id, term } => commands::history(&store, &out, ContractId(id), term).await,
    Command::AsOf { id, at } => commands::as_of(&store, &out, ContractId(id), &at).await,
    Command::Diff { id, from, to } => {
      commands::diff(&store, &out, ContractId(id), &from, &to).await
    }
    Command::Verify { id } => commands::verify(&store, &out, ContractId(id)).await,
  }
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory as _;

  use super::*;

  #[test]
  fn cli_is_well_formed() { Args::command().debug_assert(); }

  #[test]
  fn pairs_split_on_first_equals() {
    assert_eq!(parse_pair("rate=a=b").unwrap(), ("rate".into(), "a=b".into()));
    assert_eq!(parse_pair(" copay =").unwrap(), ("copay".into(), String::new()));
    assert!(parse_pair("copay").is_err());
    assert!(parse_pair("=75").is_err());
  }

  #[test]
  fn amend_collects_repeated_changes() {
    let args = Args::try_parse_from([
      "kubera",
      "--store",
      "x.db",
      "amend",
      "3",
      "--document",
      "a.pdf",
      "--date",
      "2024-03-01",
      "--set",
      "copay=75",
      "--set",
      "rate=0.9",
      "--expect",
      "copay=50",
    ])
    .unwrap();
    match args.command {
      Command::Amend { id, set, expect, date, .. } => {
        assert_eq!(id, 3);
        assert_eq!(set.len(), 2);
        assert_eq!(expect, vec![("copay".to_owned(), "50".to_owned())]);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
      }
      other => panic!("unexpected command: {other:?}"),
    }
  }

  #[test]
  fn amend_requires_a_change() {
    assert!(
      Args::try_parse_from(["kubera", "amend", "3", "--document", "a.pdf", "--date", "2024-03-01"])
        .is_err()
    );
  }
}
