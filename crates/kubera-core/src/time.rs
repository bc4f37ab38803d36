//! Helpers for converting between calendar dates and ledger instants.
//!
//! Amendments are dated by calendar day; the ledger orders revisions by
//! instant. A date always maps to the start of that day in UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone as _, Utc};

use crate::{Error, Result};

/// The instant at which something dated `date` takes effect.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
  Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Parse an as-of argument: either an RFC 3339 instant or a bare
/// `YYYY-MM-DD` date (meaning [`start_of_day`]).
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map(start_of_day)
    .map_err(|_| Error::InvalidInstant(s.to_owned()))
}

#[cfg(test)]
mod tests {
  use chrono::Timelike as _;

  use super::*;

  #[test]
  fn date_maps_to_midnight_utc() {
    let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let at = start_of_day(d);
    assert_eq!(at.date_naive(), d);
    assert_eq!(at.hour(), 0);
    assert_eq!(at.minute(), 0);
  }

  #[test]
  fn parses_dates_and_instants() {
    let date = parse_instant("2024-02-01").unwrap();
    assert_eq!(date.to_rfc3339(), "2024-02-01T00:00:00+00:00");

    let instant = parse_instant("2024-02-01T12:30:00+02:00").unwrap();
    assert_eq!(instant.to_rfc3339(), "2024-02-01T10:30:00+00:00");
  }

  #[test]
  fn rejects_garbage() {
    let err = parse_instant("next tuesday").unwrap_err();
    assert!(matches!(err, Error::InvalidInstant(ref s) if s == "next tuesday"));
  }
}
