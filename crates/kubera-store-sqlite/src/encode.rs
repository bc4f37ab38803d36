//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Instants are stored as fixed-width RFC 3339 UTC strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! Calendar dates are `YYYY-MM-DD`; money is a decimal string. Ids are
//! native `INTEGER` row ids.

use std::str::FromStr as _;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use kubera_core::{
  amendment::Amendment,
  contract::Contract,
  entity::{Document, Payor, Provider},
  ids::{AmendmentId, ContractId, DocumentId, PayorId, ProviderId, RevisionId, TermId},
  term::{ContractTerm, TermRevision},
};
use rust_decimal::Decimal;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String { d.to_string() }

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `healthcare_providers` or `payors` row, selected as
/// `(id, name, created_at)`.
pub struct RawParty {
  pub id:         i64,
  pub name:       String,
  pub created_at: String,
}

impl RawParty {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      name:       row.get(1)?,
      created_at: row.get(2)?,
    })
  }

  pub fn into_provider(self) -> Result<Provider> {
    Ok(Provider {
      provider_id: ProviderId(self.id),
      name:        self.name,
      created_at:  decode_dt(&self.created_at)?,
    })
  }

  pub fn into_payor(self) -> Result<Payor> {
    Ok(Payor {
      payor_id:   PayorId(self.id),
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const DOCUMENT_COLUMNS: &str = "document_id, filename, file_path, uploaded_at";

/// Raw values read from a `documents` row.
pub struct RawDocument {
  pub document_id: i64,
  pub filename:    String,
  pub file_path:   String,
  pub uploaded_at: String,
}

impl RawDocument {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      document_id: row.get(0)?,
      filename:    row.get(1)?,
      file_path:   row.get(2)?,
      uploaded_at: row.get(3)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      document_id: DocumentId(self.document_id),
      filename:    self.filename,
      file_path:   self.file_path,
      uploaded_at: decode_dt(&self.uploaded_at)?,
    })
  }
}

pub const CONTRACT_COLUMNS: &str = "contract_id, provider_id, payor_id, document_id, \
   effective_date, termination_date, termination_notice_days, \
   stop_loss_threshold, created_at";

/// Raw values read from a `contracts` row.
pub struct RawContract {
  pub contract_id:             i64,
  pub provider_id:             i64,
  pub payor_id:                i64,
  pub document_id:             i64,
  pub effective_date:          String,
  pub termination_date:        String,
  pub termination_notice_days: Option<u32>,
  pub stop_loss_threshold:     String,
  pub created_at:              String,
}

impl RawContract {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contract_id:             row.get(0)?,
      provider_id:             row.get(1)?,
      payor_id:                row.get(2)?,
      document_id:             row.get(3)?,
      effective_date:          row.get(4)?,
      termination_date:        row.get(5)?,
      termination_notice_days: row.get(6)?,
      stop_loss_threshold:     row.get(7)?,
      created_at:              row.get(8)?,
    })
  }

  pub fn into_contract(self) -> Result<Contract> {
    Ok(Contract {
      contract_id:             ContractId(self.contract_id),
      provider_id:             ProviderId(self.provider_id),
      payor_id:                PayorId(self.payor_id),
      document_id:             DocumentId(self.document_id),
      effective_date:          decode_date(&self.effective_date)?,
      termination_date:        decode_date(&self.termination_date)?,
      termination_notice_days: self.termination_notice_days,
      stop_loss_threshold:     decode_decimal(&self.stop_loss_threshold)?,
      created_at:              decode_dt(&self.created_at)?,
    })
  }
}

pub const TERM_COLUMNS: &str = "term_id, contract_id, term_name, term_value, \
   inception_value, introduced_at, created_at";

/// Raw values read from a `contract_terms` row.
pub struct RawTerm {
  pub term_id:         i64,
  pub contract_id:     i64,
  pub term_name:       String,
  pub term_value:      Option<String>,
  pub inception_value: Option<String>,
  pub introduced_at:   String,
  pub created_at:      String,
}

impl RawTerm {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      term_id:         row.get(0)?,
      contract_id:     row.get(1)?,
      term_name:       row.get(2)?,
      term_value:      row.get(3)?,
      inception_value: row.get(4)?,
      introduced_at:   row.get(5)?,
      created_at:      row.get(6)?,
    })
  }

  pub fn into_term(self) -> Result<ContractTerm> {
    let term_id = TermId(self.term_id);
    // A committed term always has a value; NULL means a half-written row.
    let term_value = self.term_value.ok_or_else(|| {
      kubera_core::Error::ChainCorruption {
        term_id,
        detail: "term has no current value".to_owned(),
      }
    })?;
    Ok(ContractTerm {
      term_id,
      contract_id: ContractId(self.contract_id),
      term_name: self.term_name,
      term_value,
      inception_value: self.inception_value,
      introduced_at: decode_dt(&self.introduced_at)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const REVISION_COLUMNS: &str =
  "revision_id, term_id, amendment_id, prev_value, new_value, changed_at";

/// Raw values read from a `contract_term_revisions` row.
pub struct RawRevision {
  pub revision_id:  i64,
  pub term_id:      i64,
  pub amendment_id: i64,
  pub prev_value:   Option<String>,
  pub new_value:    String,
  pub changed_at:   String,
}

impl RawRevision {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      revision_id:  row.get(0)?,
      term_id:      row.get(1)?,
      amendment_id: row.get(2)?,
      prev_value:   row.get(3)?,
      new_value:    row.get(4)?,
      changed_at:   row.get(5)?,
    })
  }

  pub fn into_revision(self) -> Result<TermRevision> {
    Ok(TermRevision {
      revision_id:  RevisionId(self.revision_id),
      term_id:      TermId(self.term_id),
      amendment_id: AmendmentId(self.amendment_id),
      prev_value:   self.prev_value,
      new_value:    self.new_value,
      changed_at:   decode_dt(&self.changed_at)?,
    })
  }
}

pub const AMENDMENT_COLUMNS: &str =
  "amendment_id, contract_id, document_id, amendment_date, created_at";

/// Raw values read from an `amendments` row.
pub struct RawAmendment {
  pub amendment_id:   i64,
  pub contract_id:    i64,
  pub document_id:    i64,
  pub amendment_date: String,
  pub created_at:     String,
}

impl RawAmendment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      amendment_id:   row.get(0)?,
      contract_id:    row.get(1)?,
      document_id:    row.get(2)?,
      amendment_date: row.get(3)?,
      created_at:     row.get(4)?,
    })
  }

  pub fn into_amendment(self) -> Result<Amendment> {
    Ok(Amendment {
      amendment_id:   AmendmentId(self.amendment_id),
      contract_id:    ContractId(self.contract_id),
      document_id:    DocumentId(self.document_id),
      amendment_date: decode_date(&self.amendment_date)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn instants_sort_lexically() {
    let a = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(1500);
    let c = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap();
    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert_eq!(ea, "2024-03-01T00:00:00.000000Z");
    assert!(ea < eb && eb < ec);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn decimals_keep_scale() {
    let d = decode_decimal("250000.50").unwrap();
    assert_eq!(encode_decimal(d), "250000.50");
  }

  #[test]
  fn bad_date_is_a_parse_error() {
    assert!(matches!(decode_date("01/02/2024"), Err(Error::DateParse(_))));
  }
}
