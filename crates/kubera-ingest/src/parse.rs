//! Two-column `Key,Value` sheet reader and value cleaners.
//!
//! Pipeline:
//!   raw &str
//!     └─ records()          → Vec<Record>   (quote-aware, header skipped)
//!          └─ into_fields() → BTreeMap<key, value>
//!               └─ clean_*()  → typed contract attributes

use std::{collections::BTreeMap, str::FromStr as _};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{Error, Result};

// ─── Records ─────────────────────────────────────────────────────────────────

/// One data row. `line` is the 1-based line the record starts on.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Record {
  pub line:   usize,
  pub fields: Vec<String>,
}

/// Split `input` into records, honouring double-quoted fields (which may
/// contain commas, newlines and `""` escapes). The first record is a header
/// and is dropped; blank lines are ignored.
pub(crate) fn records(input: &str) -> Result<Vec<Record>> {
  let input = input.strip_prefix('\u{feff}').unwrap_or(input);

  let mut out = Vec::new();
  let mut fields: Vec<String> = Vec::new();
  let mut field = String::new();
  let mut in_quotes = false;
  let mut line = 1usize;
  let mut start_line = 1usize;
  let mut chars = input.chars().peekable();

  while let Some(c) = chars.next() {
    if in_quotes {
      match c {
        '"' if chars.peek() == Some(&'"') => {
          chars.next();
          field.push('"');
        }
        '"' => in_quotes = false,
        '\n' => {
          line += 1;
          field.push('\n');
        }
        _ => field.push(c),
      }
      continue;
    }

    match c {
      '"' if field.trim().is_empty() => {
        field.clear();
        in_quotes = true;
      }
      ',' => fields.push(std::mem::take(&mut field)),
      '\r' => {}
      '\n' => {
        fields.push(std::mem::take(&mut field));
        push_record(&mut out, start_line, std::mem::take(&mut fields));
        line += 1;
        start_line = line;
      }
      _ => field.push(c),
    }
  }

  if in_quotes {
    return Err(Error::MalformedLine {
      line:   start_line,
      reason: "unterminated quoted field".to_owned(),
    });
  }
  if !field.is_empty() || !fields.is_empty() {
    fields.push(field);
    push_record(&mut out, start_line, fields);
  }

  // Header row.
  if !out.is_empty() {
    out.remove(0);
  }
  Ok(out)
}

fn push_record(out: &mut Vec<Record>, line: usize, fields: Vec<String>) {
  if fields.iter().all(|f| f.trim().is_empty()) {
    return;
  }
  out.push(Record { line, fields });
}

/// Collapse records into a key → value map. Empty values are absent; a key
/// that appears twice keeps its last value.
pub(crate) fn into_fields(records: Vec<Record>) -> Result<BTreeMap<String, String>> {
  let mut map = BTreeMap::new();
  for Record { line, fields } in records {
    let mut it = fields.into_iter();
    let key = it.next().unwrap_or_default();
    let value = it.next().unwrap_or_default();
    if it.any(|extra| !extra.trim().is_empty()) {
      return Err(Error::MalformedLine {
        line,
        reason: "expected two columns".to_owned(),
      });
    }

    let key = key.trim();
    if key.is_empty() {
      return Err(Error::MalformedLine { line, reason: "empty key".to_owned() });
    }
    let value = value.trim();
    if value.is_empty() {
      map.remove(key);
    } else {
      map.insert(key.to_owned(), value.to_owned());
    }
  }
  Ok(map)
}

// ─── Cleaners ────────────────────────────────────────────────────────────────

/// `01-Jan-24` (day, abbreviated month, two-digit year) or ISO `2024-01-01`.
pub(crate) fn clean_date(field: &'static str, value: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(value, "%d-%b-%y")
    .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
    .map_err(|_| Error::InvalidDate { field, value: value.to_owned() })
}

/// The first run of digits in free text such as `"90 days written notice"`.
pub(crate) fn clean_notice_days(value: &str) -> Option<u32> {
  let digits: String = value
    .chars()
    .skip_while(|c| !c.is_ascii_digit())
    .take_while(char::is_ascii_digit)
    .collect();
  digits.parse().ok()
}

/// A money amount such as `"$1,250,000.00"`.
pub(crate) fn clean_money(field: &'static str, value: &str) -> Result<Decimal> {
  let cleaned: String = value.chars().filter(|c| !matches!(c, '$' | ',')).collect();
  Decimal::from_str(cleaned.trim())
    .map_err(|_| Error::InvalidMoney { field, value: value.to_owned() })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fields(input: &str) -> Vec<Vec<String>> {
    records(input).unwrap().into_iter().map(|r| r.fields).collect()
  }

  #[test]
  fn header_is_skipped_and_blank_lines_ignored() {
    let rows = fields("Key,Value\r\n\r\nPayor Name,Acme\r\n");
    assert_eq!(rows, vec![vec!["Payor Name".to_owned(), "Acme".to_owned()]]);
  }

  #[test]
  fn quoted_fields_keep_commas_newlines_and_quotes() {
    let rows = fields(
      "Key,Value\nStop Loss Threshold,\"$1,000\"\nNote,\"say \"\"hi\"\"\nthere\"\nLast,x",
    );
    assert_eq!(rows[0][1], "$1,000");
    assert_eq!(rows[1][1], "say \"hi\"\nthere");
    assert_eq!(rows[2], vec!["Last".to_owned(), "x".to_owned()]);

    let recs = records("Key,Value\nA,\"1\n2\"\nB,3").unwrap();
    assert_eq!(recs[1].line, 4);
  }

  #[test]
  fn unterminated_quote_is_malformed() {
    let err = records("Key,Value\nA,\"oops\n").unwrap_err();
    assert!(matches!(err, Error::MalformedLine { line: 2, .. }));
  }

  #[test]
  fn extra_columns_are_malformed() {
    let err = into_fields(records("Key,Value\nA,1,2\n").unwrap()).unwrap_err();
    assert!(matches!(err, Error::MalformedLine { line: 2, .. }));
  }

  #[test]
  fn empty_values_are_absent() {
    let map = into_fields(records("Key,Value\nA,\nB,  2 \nC\n").unwrap()).unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map["B"], "2");
  }

  #[test]
  fn dates_accept_both_formats() {
    let want = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert_eq!(clean_date("Effective Date", "01-Jan-24").unwrap(), want);
    assert_eq!(clean_date("Effective Date", "2024-01-01").unwrap(), want);
    assert!(matches!(
      clean_date("Effective Date", "Jan 1st"),
      Err(Error::InvalidDate { .. })
    ));
  }

  #[test]
  fn notice_period_takes_first_number() {
    assert_eq!(clean_notice_days("90 days written notice"), Some(90));
    assert_eq!(clean_notice_days("Within 30 or 60 days"), Some(30));
    assert_eq!(clean_notice_days("none"), None);
  }

  #[test]
  fn money_strips_symbols() {
    assert_eq!(
      clean_money("Stop Loss Threshold", "$1,250,000.50").unwrap(),
      Decimal::new(125_000_050, 2)
    );
    assert!(matches!(
      clean_money("Stop Loss Threshold", "lots"),
      Err(Error::InvalidMoney { .. })
    ));
  }
}
