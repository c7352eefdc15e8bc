/*!
 * Data type definitions for visit records and report rows
 */

use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, NaiveDateTime};

/// Format-neutral input table handed over by the loading layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from string slices
    pub fn from_rows<H, R>(headers: &[H], rows: &[R]) -> Self
    where
        H: AsRef<str>,
        R: AsRef<[&'static str]>,
    {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.as_ref().iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-blank, trimmed cell value
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)?
            .get(column)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// One normalized patient visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub provider: String,
    pub patient_id: String,
    pub visit_date: NaiveDateTime,
    pub registration_date: Option<NaiveDateTime>,
    pub signing_date: Option<NaiveDateTime>,
    pub registered_locally: bool,
    pub registered_externally: bool,
    pub signed_locally: bool,
    pub signed_externally: bool,
    pub team_name: Option<String>,
    /// Row belongs to the health-hut team
    pub in_health_hut: bool,
}

impl VisitRecord {
    pub fn visit_day(&self) -> NaiveDate {
        self.visit_date.date()
    }

    pub fn registration_day(&self) -> Option<NaiveDate> {
        self.registration_date.map(|d| d.date())
    }

    pub fn signing_day(&self) -> Option<NaiveDate> {
        self.signing_date.map(|d| d.date())
    }

    /// Local signing that counts toward the main signing rate
    pub fn effective_local_sign(&self) -> bool {
        self.signed_locally && !self.in_health_hut
    }
}

/// Inclusive calendar-date interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Create a window. An inverted window is allowed and matches nothing.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window covering a single day
    pub fn single_day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// `YYYYMMDD_YYYYMMDD`, used in export file names
    pub fn file_tag(&self) -> String {
        format!("{}_{}", self.start.format("%Y%m%d"), self.end.format("%Y%m%d"))
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Row of the new-registrations subset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistrationRow {
    pub provider: String,
    pub patient_id: String,
    pub registration_date: NaiveDateTime,
    pub visit_date: NaiveDateTime,
}

/// Row of the new-signings and health-hut-signings subsets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRow {
    pub provider: String,
    pub patient_id: String,
    pub signing_date: NaiveDateTime,
}

/// Optional metric groups, enabled by the date columns present in the input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricGroups {
    /// Input carries a registration date column
    pub new_registrations: bool,
    /// Input carries a signing date column
    pub new_signings: bool,
}

/// Row accounting for one normalization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationStats {
    /// Rows in the raw input
    pub rows_read: usize,
    /// Rows dropped for a missing or unparseable visit date
    pub rows_dropped: usize,
    /// Registration or signing dates that failed to parse and were kept as absent
    pub dates_blanked: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_is_inclusive() {
        let window = DateWindow::new(day(2024, 3, 1), day(2024, 3, 31));
        assert!(window.contains(day(2024, 3, 1)));
        assert!(window.contains(day(2024, 3, 31)));
        assert!(!window.contains(day(2024, 4, 1)));
        assert_eq!(window.file_tag(), "20240301_20240331");
    }

    #[test]
    fn test_inverted_window_matches_nothing() {
        let window = DateWindow::new(day(2024, 3, 31), day(2024, 3, 1));
        assert!(window.is_inverted());
        assert!(!window.contains(day(2024, 3, 15)));
    }

    #[test]
    fn test_raw_table_cell_trims_blanks() {
        let table = RawTable::from_rows(&["a", "b"], &[["  x ", "   "]]);
        assert_eq!(table.cell(0, 0), Some("x"));
        assert_eq!(table.cell(0, 1), None);
        assert_eq!(table.cell(1, 0), None);
    }
}
