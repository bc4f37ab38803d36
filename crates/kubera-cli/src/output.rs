//! Text and JSON rendering for command results.

use anyhow::Result;
use kubera_core::{
  amendment::{Amendment, CommittedAmendment},
  contract::Contract,
  store::VerificationReport,
  temporal::{TermChange, TermSnapshot},
  term::{ContractTerm, TermRevision},
};
use serde::Serialize;

const ABSENT: &str = "<absent>";

pub struct Output {
  pub json: bool,
}

impl Output {
  /// Print `value` as pretty JSON, or hand it to `text` for plain output.
  fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if self.json {
      println!("{}", serde_json::to_string_pretty(value)?);
    } else {
      text(value);
    }
    Ok(())
  }

  pub fn contract(&self, contract: &Contract, terms: &[ContractTerm]) -> Result<()> {
    #[derive(Serialize)]
    struct View<'a> {
      contract: &'a Contract,
      terms:    &'a [ContractTerm],
    }
    self.emit(&View { contract, terms }, |v| {
      print_contract(v.contract);
      for t in v.terms {
        println!("  {:<32} {}", t.term_name, t.term_value);
      }
    })
  }

  pub fn contracts(&self, contracts: &[Contract]) -> Result<()> {
    self.emit(&contracts, |cs| {
      if cs.is_empty() {
        println!("no contracts");
      }
      cs.iter().for_each(|c| print_contract(c));
    })
  }

  pub fn committed(&self, committed: &CommittedAmendment) -> Result<()> {
    self.emit(committed, |c| {
      println!(
        "amendment {} dated {} committed with {} revision(s)",
        c.amendment.amendment_id,
        c.amendment.amendment_date,
        c.revisions.len()
      );
      for r in &c.revisions {
        println!(
          "  term {}: {} -> {}",
          r.term_id,
          r.prev_value.as_deref().unwrap_or(ABSENT),
          r.new_value
        );
      }
    })
  }

  pub fn amendments(&self, amendments: &[Amendment]) -> Result<()> {
    self.emit(&amendments, |list| {
      for a in list.iter() {
        println!(
          "{:>6}  {}  document {}  recorded {}",
          a.amendment_id,
          a.amendment_date,
          a.document_id,
          a.created_at.format("%Y-%m-%d %H:%M:%S")
        );
      }
    })
  }

  pub fn history(&self, term_name: &str, revisions: &[TermRevision]) -> Result<()> {
    self.emit(&revisions, |revs| {
      if revs.is_empty() {
        println!("{term_name}: never amended");
      }
      for r in revs.iter() {
        println!(
          "{}  {} -> {}  (amendment {})",
          r.changed_at.format("%Y-%m-%d"),
          r.prev_value.as_deref().unwrap_or(ABSENT),
          r.new_value,
          r.amendment_id
        );
      }
    })
  }

  pub fn snapshot(&self, snapshot: &TermSnapshot) -> Result<()> {
    self.emit(snapshot, |s| {
      println!("contract {} as of {}", s.contract_id, s.as_of.to_rfc3339());
      for (name, value) in &s.terms {
        println!("  {name:<32} {value}");
      }
    })
  }

  pub fn changes(&self, changes: &[TermChange]) -> Result<()> {
    self.emit(&changes, |cs| {
      if cs.is_empty() {
        println!("no differences");
      }
      for c in cs.iter() {
        println!(
          "  {:<32} {} -> {}",
          c.term_name,
          c.old_value.as_deref().unwrap_or(ABSENT),
          c.new_value.as_deref().unwrap_or(ABSENT)
        );
      }
    })
  }

  pub fn report(&self, report: &VerificationReport) -> Result<()> {
    self.emit(report, |r| {
      println!(
        "contract {} ok: {} term(s), {} revision(s) verified",
        r.contract_id, r.terms_checked, r.revisions_checked
      );
    })
  }
}

fn print_contract(c: &Contract) {
  println!(
    "contract {}  provider {}  payor {}  {} .. {}  stop-loss {}{}",
    c.contract_id,
    c.provider_id,
    c.payor_id,
    c.effective_date,
    c.termination_date,
    c.stop_loss_threshold,
    c.termination_notice_days
      .map(|d| format!("  notice {d}d"))
      .unwrap_or_default()
  );
}
