//! Save-date window for library sync

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Half-open window `[start, end)` over track save timestamps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    start_label: String,
    end_label: String,
}

impl DateWindow {
    /// Build a window from two instants
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        Self::labelled(
            start,
            end,
            start.format(LABEL_FORMAT).to_string(),
            end.format(LABEL_FORMAT).to_string(),
        )
    }

    /// Parse two calendar dates, each taken as midnight UTC
    ///
    /// Accepts `YYYY.MM.DD` and `YYYY-MM-DD`. The raw strings are kept as
    /// labels for the playlist name and description.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start_at = parse_date(start)?;
        let end_at = parse_date(end)?;
        Self::labelled(start_at, end_at, start.trim().to_string(), end.trim().to_string())
    }

    fn labelled(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        start_label: String,
        end_label: String,
    ) -> Result<Self> {
        if start >= end {
            return Err(Error::invalid_input(format!(
                "start date {start_label} must be before end date {end_label}"
            )));
        }
        Ok(Self {
            start,
            end,
            start_label,
            end_label,
        })
    }

    /// Inclusive lower bound, exclusive upper bound
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Whether `at` lies before the window
    pub fn is_before(&self, at: DateTime<Utc>) -> bool {
        at < self.start
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn start_label(&self) -> &str {
        &self.start_label
    }

    pub fn end_label(&self) -> &str {
        &self.end_label
    }
}

const LABEL_FORMAT: &str = "%Y.%m.%d";

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y.%m.%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| {
            Error::invalid_input(format!("invalid date '{raw}', expected YYYY.MM.DD"))
        })?;
    date.and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| Error::invalid_input(format!("invalid date '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bounds_are_half_open() {
        let window = DateWindow::parse("2020.01.01", "2020.02.01").unwrap();
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap();

        assert!(window.contains(start));
        assert!(!window.contains(end));
        assert!(window.contains(end - chrono::Duration::seconds(1)));
        assert!(window.is_before(start - chrono::Duration::seconds(1)));
    }

    #[test]
    fn both_date_formats_parse() {
        let dotted = DateWindow::parse("2020.01.01", "2020.02.01").unwrap();
        let dashed = DateWindow::parse("2020-01-01", "2020-02-01").unwrap();
        assert_eq!(dotted.start(), dashed.start());
        assert_eq!(dotted.end_label(), "2020.02.01");
        assert_eq!(dashed.end_label(), "2020-02-01");
    }

    #[test]
    fn inverted_or_empty_window_rejected() {
        assert!(DateWindow::parse("2020.02.01", "2020.01.01").is_err());
        assert!(DateWindow::parse("2020.01.01", "2020.01.01").is_err());
        assert!(DateWindow::parse("Jan 1", "2020.01.01").is_err());
    }

    #[test]
    fn labels_from_instants() {
        let start = Utc.with_ymd_and_hms(2021, 3, 4, 12, 0, 0).unwrap();
        let window = DateWindow::new(start, start + chrono::Duration::days(1)).unwrap();
        assert_eq!(window.start_label(), "2021.03.04");
        assert_eq!(window.end_label(), "2021.03.05");
    }
}
