/*!
 * Key metrics and leaderboards over a computed report
 *
 * This is what the dashboard layer shows above and beside the main table:
 * clinic-wide totals with overall rates, and providers ordered by a metric.
 */

use std::cmp::Ordering;
use serde::{Deserialize, Serialize};

use crate::aggregate::{ratio, ProviderStatistics};
use crate::columns::{CellValue, Column};
use crate::data_types::DateWindow;
use crate::engine::PerformanceReport;

/// Clinic-wide totals for one report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub window: DateWindow,
    pub providers: usize,
    pub total_visits: u64,
    pub registered_locally: u64,
    pub registered_externally: u64,
    pub remaining_unregistered: u64,
    pub signed_locally: u64,
    pub signed_externally: u64,
    pub health_hut_signed: u64,
    pub remaining_unsigned: u64,
    /// `None` when the input has no registration date column
    pub new_registrations: Option<u64>,
    /// `None` when the input has no signing date column
    pub new_signings: Option<u64>,
    pub new_health_hut_signings: Option<u64>,
    pub registration_rate: f64,
    pub signing_rate: f64,
    /// New signings over all visits in the window
    pub new_signing_rate: Option<f64>,
}

impl PerformanceSummary {
    pub fn from_report(report: &PerformanceReport) -> Self {
        let stats = &report.statistics;
        let sum = |f: fn(&ProviderStatistics) -> u64| stats.iter().map(f).sum::<u64>();

        let total_visits = sum(|s| s.visit_count);
        let registered_locally = sum(|s| s.registered_locally);
        let signed_locally = sum(|s| s.signed_locally);

        let new_registrations = report
            .groups
            .new_registrations
            .then(|| sum(|s| s.new_registrations.map_or(0, |m| m.count)));
        let new_signings = report
            .groups
            .new_signings
            .then(|| sum(|s| s.new_signings.map_or(0, |m| m.count)));
        let new_health_hut_signings = report
            .groups
            .new_signings
            .then(|| sum(|s| s.new_signings.map_or(0, |m| m.health_hut_count)));

        Self {
            window: report.window,
            providers: stats.len(),
            total_visits,
            registered_locally,
            registered_externally: sum(|s| s.registered_externally),
            remaining_unregistered: sum(|s| s.remaining_unregistered),
            signed_locally,
            signed_externally: sum(|s| s.signed_externally),
            health_hut_signed: sum(|s| s.health_hut_signed),
            remaining_unsigned: sum(|s| s.remaining_unsigned),
            new_registrations,
            new_signings,
            new_health_hut_signings,
            registration_rate: ratio(registered_locally, total_visits),
            signing_rate: ratio(signed_locally, total_visits),
            new_signing_rate: new_signings.map(|n| ratio(n, total_visits)),
        }
    }

    /// Print formatted summary
    pub fn print_summary(&self) {
        println!("=== Provider Performance: {} ===", self.window);
        println!("Providers: {}", self.providers);
        println!("Total Visits: {}", self.total_visits);
        println!("Registration:");
        println!("  Local: {}", self.registered_locally);
        println!("  External: {}", self.registered_externally);
        println!("  Remaining: {}", self.remaining_unregistered);
        println!("  Rate: {:.2}%", self.registration_rate * 100.0);
        if let Some(n) = self.new_registrations {
            println!("  New: {}", n);
        }
        println!("Signing:");
        println!("  Local: {}", self.signed_locally);
        println!("  External: {}", self.signed_externally);
        println!("  Health Hut: {}", self.health_hut_signed);
        println!("  Remaining: {}", self.remaining_unsigned);
        println!("  Rate: {:.2}%", self.signing_rate * 100.0);
        if let (Some(n), Some(rate)) = (self.new_signings, self.new_signing_rate) {
            println!("  New: {} ({:.2}% of visits)", n, rate * 100.0);
        }
        if let Some(n) = self.new_health_hut_signings {
            println!("  New Health Hut: {}", n);
        }
    }
}

/// Providers ordered by `metric`, highest first, ties by provider name.
///
/// Providers without a value for the metric (absent group, text column) are left out.
pub fn leaderboard(stats: &[ProviderStatistics], metric: &Column, limit: usize) -> Vec<(String, CellValue)> {
    let mut entries: Vec<(String, CellValue, f64)> = stats
        .iter()
        .filter_map(|s| {
            let cell = metric.cell(s)?;
            let value = cell.as_f64()?;
            Some((s.provider.clone(), cell, value))
        })
        .collect();

    entries.sort_by(|a, b| match b.2.total_cmp(&a.2) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    entries.truncate(limit);

    entries.into_iter().map(|(provider, cell, _)| (provider, cell)).collect()
}

/// Lookups over one report's provider rows
pub struct PerformanceAnalytics<'a> {
    report: &'a PerformanceReport,
}

impl<'a> PerformanceAnalytics<'a> {
    pub fn new(report: &'a PerformanceReport) -> Self {
        Self { report }
    }

    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary::from_report(self.report)
    }

    /// Providers whose name contains `query`, case-insensitive
    pub fn find_by_name(&self, query: &str) -> Vec<&'a ProviderStatistics> {
        let query = query.to_lowercase();
        self.report
            .statistics
            .iter()
            .filter(|s| s.provider.to_lowercase().contains(&query))
            .collect()
    }

    /// Top `limit` providers by `metric`
    pub fn top(&self, metric: &Column, limit: usize) -> Vec<(String, CellValue)> {
        leaderboard(&self.report.statistics, metric, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PerformanceEngine;
    use crate::normalize::NormalizedSet;
    use crate::data_types::{MetricGroups, NormalizationStats};
    use crate::test_support::{day, Visit};

    fn report(groups: MetricGroups) -> PerformanceReport {
        let records = vec![
            Visit::new("Chen", "1", "2024-03-01 09:00").registered("2024-03-01 09:00").signed("2024-03-01 09:00").build(),
            Visit::new("Chen", "2", "2024-03-01 09:30").registered("2023-05-01 09:00").build(),
            Visit::new("Li", "3", "2024-03-02 09:00").registered("2024-03-02 09:00").signed("2024-03-02 09:00").build(),
            Visit::new("Li", "4", "2024-03-02 09:30").signed("2024-03-02 10:00").health_hut().build(),
            Visit::new("Wang", "5", "2024-03-03 09:00").build(),
        ];
        let set = NormalizedSet {
            records,
            groups,
            stats: NormalizationStats::default(),
        };
        let window = crate::data_types::DateWindow::new(day("2024-03-01"), day("2024-03-31"));
        PerformanceEngine::with_defaults().compute_normalized(&set, window)
    }

    const ALL: MetricGroups = MetricGroups {
        new_registrations: true,
        new_signings: true,
    };

    #[test]
    fn test_summary_totals_and_rates() {
        let summary = report(ALL).summary();
        assert_eq!(summary.providers, 3);
        assert_eq!(summary.total_visits, 5);
        assert_eq!(summary.registered_locally, 3);
        assert_eq!(summary.remaining_unregistered, 2);
        assert_eq!(summary.signed_locally, 2);
        assert_eq!(summary.health_hut_signed, 1);
        assert_eq!(summary.new_registrations, Some(2));
        assert_eq!(summary.new_signings, Some(2));
        assert_eq!(summary.new_health_hut_signings, Some(1));
        assert!((summary.registration_rate - 0.6).abs() < 1e-12);
        assert!((summary.signing_rate - 0.4).abs() < 1e-12);
        assert_eq!(summary.new_signing_rate, Some(0.4));
    }

    #[test]
    fn test_summary_without_date_columns() {
        let summary = report(MetricGroups::default()).summary();
        assert_eq!(summary.new_registrations, None);
        assert_eq!(summary.new_signing_rate, None);
    }

    #[test]
    fn test_empty_report_summary_is_zero() {
        let report = PerformanceEngine::with_defaults().compute_normalized(
            &NormalizedSet { records: Vec::new(), groups: ALL, stats: NormalizationStats::default() },
            DateWindow::single_day(day("2024-03-01")),
        );
        let summary = report.summary();
        assert_eq!(summary.total_visits, 0);
        assert_eq!(summary.registration_rate, 0.0);
        assert_eq!(summary.new_signing_rate, Some(0.0));
    }

    #[test]
    fn test_leaderboard_orders_and_breaks_ties_by_name() {
        let report = report(ALL);
        let board = leaderboard(&report.statistics, &Column::RegistrationRate, 10);
        let names: Vec<&str> = board.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(names, vec!["Chen", "Li", "Wang"]);
        assert_eq!(board[0].1, CellValue::Rate(1.0));

        let board = leaderboard(&report.statistics, &Column::NewSignings, 2);
        let names: Vec<&str> = board.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(names, vec!["Chen", "Li"]);
    }

    #[test]
    fn test_leaderboard_skips_absent_groups() {
        let report = report(MetricGroups::default());
        assert!(leaderboard(&report.statistics, &Column::NewSigningRate, 5).is_empty());
        assert!(leaderboard(&report.statistics, &Column::Provider, 5).is_empty());
    }

    #[test]
    fn test_lookups() {
        let report = report(ALL);
        let analytics = PerformanceAnalytics::new(&report);
        assert_eq!(analytics.find_by_name("li").len(), 1);
        assert_eq!(analytics.top(&Column::SigningRate, 1)[0].0, "Chen");
    }
}
