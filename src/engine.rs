/*!
 * Top-level performance pipeline
 *
 * [`PerformanceEngine`] owns its configuration and nothing else. Every call
 * takes an input table and a window and returns a fresh [`PerformanceReport`];
 * no state survives between calls.
 */

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::aggregate::{aggregate, ProviderStatistics};
use crate::analytics::PerformanceSummary;
use crate::columns::{HeaderStyle, StatisticsTable};
use crate::config::EngineConfig;
use crate::data_types::*;
use crate::normalize::{NormalizedSet, RecordNormalizer};
use crate::rank::rank_providers;
use crate::subsets::{extract_subsets, merge_subsets, SubsetTables};
use crate::window::filter_window;
use crate::Result;

/// Output of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub window: DateWindow,
    /// Optional metric groups present in the input
    pub groups: MetricGroups,
    /// One row per provider, ordered by provider
    pub statistics: Vec<ProviderStatistics>,
    pub subsets: SubsetTables,
    pub normalization: NormalizationStats,
    /// Visits left after window filtering
    pub records_in_window: usize,
}

impl PerformanceReport {
    /// Flat table in the fixed column order
    pub fn table(&self) -> StatisticsTable {
        StatisticsTable::from_statistics(&self.statistics, self.groups)
    }

    /// Header row for the flat table
    pub fn headers(&self, style: HeaderStyle) -> Vec<String> {
        self.table().headers(style)
    }

    pub fn get(&self, provider: &str) -> Option<&ProviderStatistics> {
        self.statistics
            .binary_search_by(|s| s.provider.as_str().cmp(provider))
            .ok()
            .map(|i| &self.statistics[i])
    }

    /// No visit fell inside the window
    pub fn is_empty(&self) -> bool {
        self.statistics.is_empty()
    }

    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary::from_report(self)
    }
}

/// Runs normalization, filtering, aggregation, subset merging and ranking
#[derive(Debug, Clone, Default)]
pub struct PerformanceEngine {
    config: EngineConfig,
}

impl PerformanceEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize a raw table once, for reuse across several windows
    pub fn normalize(&self, table: &RawTable) -> Result<NormalizedSet> {
        RecordNormalizer::new(&self.config).normalize(table)
    }

    /// Full pipeline over a raw table.
    ///
    /// Fails only with a schema error. An empty window gives an empty report.
    pub fn compute(&self, table: &RawTable, window: DateWindow) -> Result<PerformanceReport> {
        let normalized = self.normalize(table)?;
        Ok(self.compute_normalized(&normalized, window))
    }

    /// Pipeline over already normalized records
    pub fn compute_normalized(&self, normalized: &NormalizedSet, window: DateWindow) -> PerformanceReport {
        let windowed = filter_window(&normalized.records, &window);

        let statistics = aggregate(&windowed);
        let subsets = extract_subsets(&windowed, &window, normalized.groups);
        let statistics = merge_subsets(statistics, &subsets);
        let statistics = rank_providers(statistics);

        debug!(%window, providers = statistics.len(), "computed performance report");

        PerformanceReport {
            window,
            groups: normalized.groups,
            statistics,
            subsets,
            normalization: normalized.stats,
            records_in_window: windowed.len(),
        }
    }

    /// One report per window over the same records, in window order
    pub fn compute_many(&self, normalized: &NormalizedSet, windows: &[DateWindow]) -> Vec<PerformanceReport> {
        info!(windows = windows.len(), records = normalized.len(), "computing batch of windows");

        #[cfg(feature = "parallel")]
        let reports = windows
            .par_iter()
            .map(|w| self.compute_normalized(normalized, *w))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let reports = windows
            .iter()
            .map(|w| self.compute_normalized(normalized, *w))
            .collect();

        reports
    }
}
