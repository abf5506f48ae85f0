//! Acquisition date ranges.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive calendar date range used for catalog searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TimeParseError> {
        if start > end {
            return Err(TimeParseError::Reversed {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// STAC `datetime` interval covering both end days completely.
    pub fn to_stac_interval(&self) -> String {
        format!(
            "{}T00:00:00Z/{}T23:59:59Z",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start, self.end)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, TimeParseError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid date format: {0}. Expected 'YYYY-MM-DD'")]
    InvalidFormat(String),

    #[error("Start date {start} is after end date {end}")]
    Reversed { start: String, end: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stac_interval() {
        let range = DateRange::parse("2023-06-01", "2023-06-30").unwrap();
        assert_eq!(
            range.to_stac_interval(),
            "2023-06-01T00:00:00Z/2023-06-30T23:59:59Z"
        );
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::parse("2023-06-01", "2023-06-01").unwrap();
        assert!(range.contains(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()));
    }

    #[test]
    fn test_reversed_range_rejected() {
        assert!(matches!(
            DateRange::parse("2023-07-01", "2023-06-01"),
            Err(TimeParseError::Reversed { .. })
        ));
        assert!(matches!(
            DateRange::parse("01/06/2023", "2023-06-30"),
            Err(TimeParseError::InvalidFormat(_))
        ));
    }
}
