//! Contracts — the immutable envelope that owns amendments and terms.
//!
//! The core attributes of a contract (parties, originating document, dates,
//! stop-loss threshold) are fixed at creation. Everything that changes over
//! time is a term, and terms only change through amendments.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  ids::{ContractId, DocumentId, PayorId, ProviderId},
  time::start_of_day,
};

/// An agreement between a healthcare provider and a payor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
  pub contract_id:             ContractId,
  pub provider_id:             ProviderId,
  pub payor_id:                PayorId,
  /// The document the contract originates from.
  pub document_id:             DocumentId,
  pub effective_date:          NaiveDate,
  pub termination_date:        NaiveDate,
  /// Notice required to terminate, in days, when the contract states one.
  pub termination_notice_days: Option<u32>,
  pub stop_loss_threshold:     Decimal,
  /// Server-assigned; never changes after creation.
  pub created_at:              DateTime<Utc>,
}

impl Contract {
  /// The instant from which the contract's initial terms are in force.
  pub fn effective_from(&self) -> DateTime<Utc> {
    start_of_day(self.effective_date)
  }
}

/// Input to [`crate::store::ContractStore::create_contract`].
///
/// `initial_terms` become the contract's terms with their inception values.
#[derive(Debug, Clone)]
pub struct NewContract {
  pub provider_id:             ProviderId,
  pub payor_id:                PayorId,
  pub document_id:             DocumentId,
  pub effective_date:          NaiveDate,
  pub termination_date:        NaiveDate,
  pub termination_notice_days: Option<u32>,
  pub stop_loss_threshold:     Decimal,
  pub initial_terms:           BTreeMap<String, String>,
}

impl NewContract {
  /// Convenience constructor with no notice period and no initial terms.
  pub fn new(
    provider_id: ProviderId,
    payor_id: PayorId,
    document_id: DocumentId,
    effective_date: NaiveDate,
    termination_date: NaiveDate,
    stop_loss_threshold: Decimal,
  ) -> Self {
    Self {
      provider_id,
      payor_id,
      document_id,
      effective_date,
      termination_date,
      termination_notice_days: None,
      stop_loss_threshold,
      initial_terms: BTreeMap::new(),
    }
  }

  /// Add an initial term.
  pub fn with_term(
    mut self,
    name: impl Into<String>,
    value: impl Into<String>,
  ) -> Self {
    self.initial_terms.insert(name.into(), value.into());
    self
  }

  /// Check the invariants that do not need the store.
  ///
  /// - `effective_date < termination_date`, else [`Error::InvalidRange`];
  /// - `stop_loss_threshold >= 0`, else [`Error::InvalidThreshold`];
  /// - every term name is non-blank, else [`Error::InvalidTermName`].
  pub fn validate(&self) -> Result<()> {
    if self.effective_date >= self.termination_date {
      return Err(Error::InvalidRange {
        effective_date:   self.effective_date,
        termination_date: self.termination_date,
      });
    }
    if self.stop_loss_threshold < Decimal::ZERO {
      return Err(Error::InvalidThreshold(self.stop_loss_threshold));
    }
    if let Some(name) = self.initial_terms.keys().find(|n| n.trim().is_empty())
    {
      return Err(Error::InvalidTermName(name.clone()));
    }
    Ok(())
  }
}

/// Filter for [`crate::store::ContractStore::list_contracts`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractQuery {
  pub provider_id: Option<ProviderId>,
  pub payor_id:    Option<PayorId>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn input() -> NewContract {
    NewContract::new(
      ProviderId(1),
      PayorId(1),
      DocumentId(1),
      date(2024, 1, 1),
      date(2025, 1, 1),
      Decimal::new(250_000, 0),
    )
  }

  #[test]
  fn valid_contract_passes() {
    input().with_term("copay", "50").validate().unwrap();
  }

  #[test]
  fn zero_threshold_is_allowed() {
    let mut c = input();
    c.stop_loss_threshold = Decimal::ZERO;
    c.validate().unwrap();
  }

  #[test]
  fn equal_dates_are_an_invalid_range() {
    let mut c = input();
    c.termination_date = c.effective_date;
    assert!(matches!(c.validate(), Err(Error::InvalidRange { .. })));
  }

  #[test]
  fn reversed_dates_are_an_invalid_range() {
    let mut c = input();
    c.termination_date = date(2023, 6, 1);
    assert!(matches!(c.validate(), Err(Error::InvalidRange { .. })));
  }

  #[test]
  fn negative_threshold_is_rejected() {
    let mut c = input();
    c.stop_loss_threshold = Decimal::new(-1, 2);
    assert!(matches!(c.validate(), Err(Error::InvalidThreshold(_))));
  }

  #[test]
  fn blank_term_name_is_rejected() {
    let err = input().with_term("  ", "x").validate().unwrap_err();
    assert!(matches!(err, Error::InvalidTermName(_)));
  }

  #[test]
  fn effective_from_is_start_of_effective_date() {
    let c = Contract {
      contract_id:             ContractId(7),
      provider_id:             ProviderId(1),
      payor_id:                PayorId(1),
      document_id:             DocumentId(1),
      effective_date:          date(2024, 1, 1),
      termination_date:        date(2025, 1, 1),
      termination_notice_days: Some(90),
      stop_loss_threshold:     Decimal::ZERO,
      created_at:              Utc::now(),
    };
    assert_eq!(c.effective_from().to_rfc3339(), "2024-01-01T00:00:00+00:00");
  }
}
