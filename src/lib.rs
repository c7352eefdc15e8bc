/*!
 * # Provider Performance Library
 *
 * Computes per-provider registration ("file-opening") and service-contract
 * ("signing") statistics from per-visit clinical records.
 *
 * ## Features
 *
 * - **Deterministic aggregation**: one row per provider, ordered by provider
 * - **Origin breakdown**: local vs. external registration and signing, with
 *   health-hut signings carved out of the main signing rate
 * - **Same-day activity**: new registrations and new signings measured against
 *   the still-unhandled pool
 * - **Dense rankings** over every rate and the new-signing count
 * - **Fixed column order** ready for tabular export
 *
 * ## Quick Start
 *
 * ```no_run
 * use provider_perf::prelude::*;
 * use chrono::NaiveDate;
 *
 * # fn main() -> Result<()> {
 * let table = VisitReader::new().load("visits.csv")?;
 * let engine = PerformanceEngine::new(EngineConfig::load()?);
 *
 * let window = DateWindow::new(
 *     NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
 *     NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
 * );
 * let report = engine.compute(&table, window)?;
 *
 * for row in &report.statistics {
 *     println!("{}: {:.2}% registered (rank {})",
 *         row.provider, row.registration_rate * 100.0, row.registration_rank);
 * }
 *
 * CsvExporter::new().export(&report, std::path::Path::new("out"), "performance")?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Pipeline
 *
 * Every stage is a pure function returning a new value:
 *
 * 1. [`normalize`] parses dates and origin flags and flags health-hut rows
 * 2. [`window`] keeps the visits inside the caller's date window
 * 3. [`aggregate`] groups by provider and computes counts and base rates
 * 4. [`subsets`] extracts new registrations, new signings and health-hut
 *    signings and left-merges their counts
 * 5. [`rank`] assigns dense ranks
 * 6. [`columns`] renders the table in a fixed topical column order
 *
 * [`engine::PerformanceEngine`] runs the whole pipeline.
 */

// Re-export error types from root
pub use error::{PerfError, Result, ErrorContext, ExportFormat};

// Public modules
pub mod data_types;
pub mod schema;
pub mod error;
pub mod config;
pub mod normalize;
pub mod window;
pub mod aggregate;
pub mod subsets;
pub mod rank;
pub mod columns;
pub mod engine;
pub mod analytics;
pub mod reader;
pub mod export;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use provider_perf::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_types::*;
    pub use crate::schema::{VisitField, VisitSchema};
    pub use crate::error::{PerfError, Result};
    pub use crate::config::{ConfigBuilder, EngineConfig};
    pub use crate::aggregate::{ProviderStatistics, NewRegistrationMetrics, NewSigningMetrics};
    pub use crate::subsets::SubsetTables;
    pub use crate::rank::RankedMetric;
    pub use crate::columns::{CellValue, Column, HeaderStyle, StatisticsTable};
    pub use crate::engine::{PerformanceEngine, PerformanceReport};
    pub use crate::analytics::{leaderboard, PerformanceAnalytics, PerformanceSummary};
    pub use crate::reader::VisitReader;
    pub use crate::export::{CsvExporter, JsonExporter, ReportExporter};
    pub use crate::ExportFormat;
}

/// Domain constants
pub mod constants {
    /// Team whose signings are tracked apart from the main signing rate
    pub const DEFAULT_HEALTH_HUT_LABEL: &str = "健康小屋";

    /// Value the source system writes for "yes" in origin columns
    pub const DEFAULT_AFFIRMATIVE_MARKER: &str = "是";

    /// Date-time format used when writing exported tables
    pub const EXPORT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{NaiveDate, NaiveDateTime};
    use crate::data_types::VisitRecord;

    pub fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    /// Builder for hand-written visit records
    pub struct Visit(VisitRecord);

    impl Visit {
        pub fn new(provider: &str, patient: &str, visit: &str) -> Self {
            Visit(VisitRecord {
                provider: provider.to_string(),
                patient_id: patient.to_string(),
                visit_date: at(visit),
                registration_date: None,
                signing_date: None,
                registered_locally: false,
                registered_externally: false,
                signed_locally: false,
                signed_externally: false,
                team_name: None,
                in_health_hut: false,
            })
        }

        pub fn registered(mut self, on: &str) -> Self {
            self.0.registered_locally = true;
            self.0.registration_date = Some(at(on));
            self
        }

        pub fn registered_elsewhere(mut self) -> Self {
            self.0.registered_externally = true;
            self
        }

        pub fn signed(mut self, on: &str) -> Self {
            self.0.signed_locally = true;
            self.0.signing_date = Some(at(on));
            self
        }

        pub fn signed_elsewhere(mut self) -> Self {
            self.0.signed_externally = true;
            self
        }

        pub fn health_hut(mut self) -> Self {
            self.0.team_name = Some(crate::constants::DEFAULT_HEALTH_HUT_LABEL.to_string());
            self.0.in_health_hut = true;
            self
        }

        pub fn build(self) -> VisitRecord {
            self.0
        }
    }
}
