//! Contract sheet ingestion for Kubera.
//!
//! Reads the two-column `Key,Value` sheet produced by contract extraction and
//! turns it into the attributes of a [`NewContract`]. Pure synchronous; the
//! caller resolves the provider, payor and document against a store.
//!
//! # Quick start
//!
//! ```no_run
//! use kubera_ingest::{IngestOptions, parse_sheet};
//!
//! let csv = "Key,Value\n\
//!            Effective Date,01-Jan-24\n\
//!            Payor Name,Acme Health\n\
//!            Stop Loss Threshold,\"$250,000\"\n\
//!            PDF_filename,contracts/acme.pdf\n";
//! let sheet = parse_sheet(csv, &IngestOptions::default()).unwrap();
//! println!("{} pays from {}", sheet.payor_name, sheet.effective_date);
//! ```

pub mod error;
mod parse;

use std::collections::BTreeMap;

use chrono::{Months, NaiveDate};
use kubera_core::{
  contract::NewContract,
  ids::{DocumentId, PayorId, ProviderId},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use error::{Error, Result};

// ─── Sheet keys ──────────────────────────────────────────────────────────────

pub const EFFECTIVE_DATE: &str = "Effective Date";
pub const TERMINATION_DATE: &str = "Termination Date";
pub const PAYOR_NAME: &str = "Payor Name";
pub const TERMINATION_NOTICE: &str = "Termination Notice Period";
pub const STOP_LOSS_THRESHOLD: &str = "Stop Loss Threshold";
pub const DOCUMENT_PATH: &str = "PDF_filename";

// ─── Public types ────────────────────────────────────────────────────────────

/// Knobs for [`parse_sheet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
  /// Contract length used when the sheet carries no termination date.
  pub default_term_months: u32,
}

impl Default for IngestOptions {
  fn default() -> Self { Self { default_term_months: 12 } }
}

/// A parsed contract sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSheet {
  pub effective_date:          NaiveDate,
  pub termination_date:        NaiveDate,
  pub termination_notice_days: Option<u32>,
  pub stop_loss_threshold:     Decimal,
  pub payor_name:              String,
  /// Location of the source document in the document store.
  pub document_path:           String,
  /// Every non-reserved key with a value; these become initial terms.
  pub terms:                   BTreeMap<String, String>,
}

impl ContractSheet {
  /// Build the contract input once the parties and document are resolved.
  pub fn to_new_contract(
    &self,
    provider_id: ProviderId,
    payor_id: PayorId,
    document_id: DocumentId,
  ) -> NewContract {
    NewContract {
      provider_id,
      payor_id,
      document_id,
      effective_date: self.effective_date,
      termination_date: self.termination_date,
      termination_notice_days: self.termination_notice_days,
      stop_loss_threshold: self.stop_loss_threshold,
      initial_terms: self.terms.clone(),
    }
  }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse a contract sheet. The reserved keys above populate the contract's
/// fixed attributes; everything else is returned as terms.
pub fn parse_sheet(input: &str, options: &IngestOptions) -> Result<ContractSheet> {
  let mut fields = parse::into_fields(parse::records(input)?)?;

  let mut take = |key: &'static str| fields.remove(key);
  let required = |key: &'static str, v: Option<String>| v.ok_or(Error::MissingField(key));

  let effective_date =
    parse::clean_date(EFFECTIVE_DATE, &required(EFFECTIVE_DATE, take(EFFECTIVE_DATE))?)?;
  let payor_name = required(PAYOR_NAME, take(PAYOR_NAME))?;
  let stop_loss_threshold = parse::clean_money(
    STOP_LOSS_THRESHOLD,
    &required(STOP_LOSS_THRESHOLD, take(STOP_LOSS_THRESHOLD))?,
  )?;
  let document_path = required(DOCUMENT_PATH, take(DOCUMENT_PATH))?;
  let termination_notice_days =
    take(TERMINATION_NOTICE).as_deref().and_then(parse::clean_notice_days);

  let termination_date = match take(TERMINATION_DATE) {
    Some(v) => parse::clean_date(TERMINATION_DATE, &v)?,
    None => effective_date
      .checked_add_months(Months::new(options.default_term_months))
      .ok_or_else(|| Error::InvalidDate {
        field: TERMINATION_DATE,
        value: format!("{effective_date} + {} months", options.default_term_months),
      })?,
  };

  Ok(ContractSheet {
    effective_date,
    termination_date,
    termination_notice_days,
    stop_loss_threshold,
    payor_name,
    document_path,
    terms: fields,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const SHEET: &str = "\
Key,Value
Effective Date,01-Jan-24
Payor Name,Acme Health
Termination Notice Period,90 days written notice
Stop Loss Threshold,\"$250,000.00\"
PDF_filename,s3://contracts/acme-2024.pdf
stop_loss_copay,50
Reimbursement Methodology,\"DRG, with outlier carve-outs\"
Timely Filing Limit,
";

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn parses_essential_fields() {
    let sheet = parse_sheet(SHEET, &IngestOptions::default()).unwrap();
    assert_eq!(sheet.effective_date, date(2024, 1, 1));
    assert_eq!(sheet.termination_date, date(2025, 1, 1));
    assert_eq!(sheet.termination_notice_days, Some(90));
    assert_eq!(sheet.stop_loss_threshold, Decimal::new(250_000, 0));
    assert_eq!(sheet.payor_name, "Acme Health");
    assert_eq!(sheet.document_path, "s3://contracts/acme-2024.pdf");
  }

  #[test]
  fn remaining_keys_become_terms() {
    let sheet = parse_sheet(SHEET, &IngestOptions::default()).unwrap();
    assert_eq!(sheet.terms.len(), 2);
    assert_eq!(sheet.terms["stop_loss_copay"], "50");
    assert_eq!(sheet.terms["Reimbursement Methodology"], "DRG, with outlier carve-outs");
  }

  #[test]
  fn explicit_termination_date_wins() {
    let input = format!("{SHEET}Termination Date,2024-06-30\n");
    let sheet = parse_sheet(&input, &IngestOptions { default_term_months: 36 }).unwrap();
    assert_eq!(sheet.termination_date, date(2024, 6, 30));
    assert!(!sheet.terms.contains_key(TERMINATION_DATE));
  }

  #[test]
  fn default_term_length_is_configurable() {
    let sheet = parse_sheet(SHEET, &IngestOptions { default_term_months: 24 }).unwrap();
    assert_eq!(sheet.termination_date, date(2026, 1, 1));
  }

  #[test]
  fn missing_payor_is_reported() {
    let input = SHEET.replace("Payor Name,Acme Health\n", "");
    let err = parse_sheet(&input, &IngestOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MissingField(PAYOR_NAME)));
  }

  #[test]
  fn bad_threshold_is_reported() {
    let input = SHEET.replace("\"$250,000.00\"", "TBD");
    let err = parse_sheet(&input, &IngestOptions::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidMoney { field: STOP_LOSS_THRESHOLD, .. }));
  }

  #[test]
  fn to_new_contract_carries_terms() {
    let sheet = parse_sheet(SHEET, &IngestOptions::default()).unwrap();
    let input = sheet.to_new_contract(ProviderId(1), PayorId(2), DocumentId(3));
    assert_eq!(input.payor_id, PayorId(2));
    assert_eq!(input.initial_terms, sheet.terms);
    input.validate().unwrap();
  }
}
