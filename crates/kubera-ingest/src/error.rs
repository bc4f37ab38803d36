//! Error types for the contract sheet parser.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("missing required field {0:?}")]
  MissingField(&'static str),

  #[error("invalid date in {field}: {value:?}")]
  InvalidDate { field: &'static str, value: String },

  #[error("invalid money value in {field}: {value:?}")]
  InvalidMoney { field: &'static str, value: String },

  #[error("malformed record at line {line}: {reason}")]
  MalformedLine { line: usize, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
