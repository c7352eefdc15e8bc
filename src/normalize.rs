/*!
 * Record normalization
 *
 * Turns a raw table into typed visit records: dates are parsed, the four
 * origin columns become booleans and health-hut membership is flagged.
 */

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::data_types::*;
use crate::schema::{ColumnMap, VisitField, VisitSchema};
use crate::{PerfError, Result};

/// Normalized records together with what the input schema allows
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSet {
    pub records: Vec<VisitRecord>,
    pub groups: MetricGroups,
    pub stats: NormalizationStats,
}

impl NormalizedSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Window spanning the earliest to the latest visit day
    pub fn visit_date_range(&self) -> Option<DateWindow> {
        let first = self.records.iter().map(|r| r.visit_day()).min()?;
        let last = self.records.iter().map(|r| r.visit_day()).max()?;
        Some(DateWindow::new(first, last))
    }
}

/// Converts raw tables into [`NormalizedSet`]s
#[derive(Debug, Clone)]
pub struct RecordNormalizer<'a> {
    config: &'a EngineConfig,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Normalize every row of `table`.
    ///
    /// Fails only when a required column is missing from the header row. A
    /// row is dropped solely for a missing or unparseable visit date.
    pub fn normalize(&self, table: &RawTable) -> Result<NormalizedSet> {
        let columns = VisitSchema::resolve(&table.headers, &self.config.column_aliases)?;

        let groups = MetricGroups {
            new_registrations: columns.has(VisitField::RegistrationDate),
            new_signings: columns.has(VisitField::SigningDate),
        };

        let mut stats = NormalizationStats {
            rows_read: table.len(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(table.len());

        for row in 0..table.len() {
            match self.normalize_row(table, &columns, row, &mut stats) {
                Some(record) => records.push(record),
                None => stats.rows_dropped += 1,
            }
        }

        if stats.rows_dropped > 0 {
            warn!(
                dropped = stats.rows_dropped,
                "dropped rows without a valid visit date"
            );
        }
        debug!(
            rows = stats.rows_read,
            kept = records.len(),
            blanked_dates = stats.dates_blanked,
            "normalized visit records"
        );

        Ok(NormalizedSet { records, groups, stats })
    }

    fn normalize_row(
        &self,
        table: &RawTable,
        columns: &ColumnMap,
        row: usize,
        stats: &mut NormalizationStats,
    ) -> Option<VisitRecord> {
        let cell = |field: VisitField| columns.get(field).and_then(|col| table.cell(row, col));

        let visit_date = cell(VisitField::VisitDate).and_then(|v| self.parse_date(v))?;

        let mut optional_date = |field: VisitField| {
            let raw = cell(field)?;
            let parsed = self.parse_date(raw);
            if parsed.is_none() {
                stats.dates_blanked += 1;
            }
            parsed
        };
        let registration_date = optional_date(VisitField::RegistrationDate);
        let signing_date = optional_date(VisitField::SigningDate);

        let team_name = cell(VisitField::TeamName).map(str::to_string);
        let in_health_hut = team_name
            .as_deref()
            .map(|team| team == self.config.health_hut_label.trim())
            .unwrap_or(false);

        Some(VisitRecord {
            provider: cell(VisitField::Provider).unwrap_or_default().to_string(),
            patient_id: cell(VisitField::PatientId).unwrap_or_default().to_string(),
            visit_date,
            registration_date,
            signing_date,
            registered_locally: self.parse_flag(cell(VisitField::RegisteredLocally)),
            registered_externally: self.parse_flag(cell(VisitField::RegisteredExternally)),
            signed_locally: self.parse_flag(cell(VisitField::SignedLocally)),
            signed_externally: self.parse_flag(cell(VisitField::SignedExternally)),
            team_name,
            in_health_hut,
        })
    }

    /// Parse a date cell with the configured formats. Date-only values get midnight.
    pub fn parse_date(&self, value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        self.config.date_formats.iter().find_map(|format| {
            NaiveDateTime::parse_from_str(value, format)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(value, format)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        })
    }

    /// Parse a calendar day, failing with the accepted formats listed
    pub fn parse_day(&self, value: &str) -> Result<NaiveDate> {
        self.parse_date(value)
            .map(|d| d.date())
            .ok_or_else(|| PerfError::date_parse_with_format(value, &self.config.date_formats.join(", ")))
    }

    /// An origin indicator is set when it equals the affirmative marker or the numeral 1
    pub fn parse_flag(&self, value: Option<&str>) -> bool {
        match value {
            Some(v) => {
                v == self.config.affirmative_marker.trim()
                    || v.parse::<f64>().map(|n| n == 1.0).unwrap_or(false)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PerfError;

    const HEADERS: [&str; 10] = [
        "provider", "patient_id", "visit_date", "registration_date", "signing_date",
        "registered_locally", "registered_externally", "signed_locally", "signed_externally",
        "team_name",
    ];

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_drops_only_bad_visit_dates() {
        let table = RawTable::from_rows(&HEADERS, &[
            ["Dr. A", "p1", "2024-03-01", "not a date", "", "是", "否", "1", "0", ""],
            ["Dr. A", "p2", "", "2024-03-01", "", "是", "否", "1", "0", ""],
            ["Dr. B", "p3", "garbage", "", "", "是", "否", "1", "0", ""],
            ["Dr. B", "p4", "2024/03/02 14:30:00", "2024-03-02", "2024-03-02", "0", "是", "1.0", "否", "健康小屋"],
        ]);
        let config = EngineConfig::default();
        let set = RecordNormalizer::new(&config).normalize(&table).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.stats.rows_read, 4);
        assert_eq!(set.stats.rows_dropped, 2);
        assert_eq!(set.stats.dates_blanked, 1);

        let first = &set.records[0];
        assert_eq!(first.registration_date, None);
        assert!(first.registered_locally);
        assert!(!first.registered_externally);
        assert!(first.signed_locally);
        assert!(!first.in_health_hut);

        let second = &set.records[1];
        assert_eq!(second.visit_date, dt("2024-03-02 14:30:00"));
        assert!(!second.registered_locally);
        assert!(second.registered_externally);
        assert!(second.signed_locally);
        assert!(second.in_health_hut);
        assert!(!second.effective_local_sign());

        assert!(set.groups.new_registrations);
        assert!(set.groups.new_signings);
    }

    #[test]
    fn test_missing_origin_column_is_schema_error() {
        let table = RawTable::from_rows(
            &["provider", "patient_id", "visit_date", "registered_locally", "signed_locally"],
            &[["Dr. A", "p1", "2024-03-01", "是", "是"]],
        );
        let config = EngineConfig::default();
        let err = RecordNormalizer::new(&config).normalize(&table).unwrap_err();
        match err {
            PerfError::Schema { missing, .. } => assert_eq!(missing.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_optional_groups_follow_columns() {
        let table = RawTable::from_rows(
            &["诊疗医生", "身份证号", "就诊日期", "是否本机构建档", "是否外机构建档", "是否本机构签约", "是否外机构签约"],
            &[["Dr. A", "p1", "2024-03-01", "是", "否", "否", "否"]],
        );
        let config = EngineConfig::default();
        let set = RecordNormalizer::new(&config).normalize(&table).unwrap();
        assert_eq!(set.groups, MetricGroups::default());
        assert_eq!(set.records[0].team_name, None);
    }

    #[test]
    fn test_parse_flag_and_dates() {
        let config = EngineConfig::default();
        let normalizer = RecordNormalizer::new(&config);
        assert!(normalizer.parse_flag(Some("是")));
        assert!(normalizer.parse_flag(Some("1")));
        assert!(normalizer.parse_flag(Some("1.0")));
        assert!(!normalizer.parse_flag(Some("否")));
        assert!(!normalizer.parse_flag(Some("2")));
        assert!(!normalizer.parse_flag(None));

        assert_eq!(normalizer.parse_date("2024年3月5日"), Some(dt("2024-03-05 00:00:00")));
        assert_eq!(normalizer.parse_date("03/05/2024"), Some(dt("2024-03-05 00:00:00")));
        assert_eq!(normalizer.parse_date("20240305"), Some(dt("2024-03-05 00:00:00")));
        assert_eq!(normalizer.parse_date("2024-03-05T08:15:00"), Some(dt("2024-03-05 08:15:00")));
        assert_eq!(normalizer.parse_date("yesterday"), None);

        assert_eq!(normalizer.parse_day("2024/03/05").unwrap(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert!(matches!(normalizer.parse_day("someday"), Err(PerfError::DateParse { .. })));
    }

    #[test]
    fn test_fractional_seconds_and_minute_timestamps() {
        let table = RawTable::from_rows(&HEADERS, &[
            ["Dr. A", "p1", "2024-03-01 09:00:00.000", "2024-03-01T09:05", "", "是", "否", "否", "否", ""],
            ["Dr. A", "p2", "2024-03-02T10:30", "", "2024-03-02 10:45:12.250", "否", "否", "是", "否", ""],
        ]);
        let config = EngineConfig::default();
        let set = RecordNormalizer::new(&config).normalize(&table).unwrap();

        assert_eq!(set.stats.rows_dropped, 0);
        assert_eq!(set.stats.dates_blanked, 0);
        assert_eq!(set.records[0].visit_date, dt("2024-03-01 09:00:00"));
        assert_eq!(set.records[0].registration_date, Some(dt("2024-03-01 09:05:00")));
        assert_eq!(set.records[1].visit_date, dt("2024-03-02 10:30:00"));
        assert_eq!(set.records[1].signing_day(), NaiveDate::from_ymd_opt(2024, 3, 2));
    }

    #[test]
    fn test_visit_date_range() {
        let table = RawTable::from_rows(
            &["provider", "patient_id", "visit_date", "registered_locally", "registered_externally", "signed_locally", "signed_externally"],
            &[
                ["A", "1", "2024-03-09", "0", "0", "0", "0"],
                ["A", "2", "2024-03-02", "0", "0", "0", "0"],
                ["B", "3", "2024-03-05", "0", "0", "0", "0"],
            ],
        );
        let config = EngineConfig::default();
        let set = RecordNormalizer::new(&config).normalize(&table).unwrap();
        let range = set.visit_date_range().unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    }
}
