/*!
 * New-activity subsets
 *
 * Three filtered views over the windowed records, each counted per provider
 * and left-merged into the aggregated table:
 *
 * - new registrations: registered locally on the day of the visit, with the
 *   registration date inside the window
 * - new signings: signed locally inside the window, outside the health-hut team
 * - health-hut signings: signed locally inside the window by the health-hut team
 */

use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregate::{pool_rate, NewRegistrationMetrics, NewSigningMetrics, ProviderStatistics};
use crate::data_types::*;

/// The three subset tables. A subset is `None` when the input has no date
/// column to derive it from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsetTables {
    pub new_registrations: Option<Vec<NewRegistrationRow>>,
    pub new_signings: Option<Vec<SigningRow>>,
    pub health_hut_signings: Option<Vec<SigningRow>>,
}

impl SubsetTables {
    pub fn new_registration_count(&self) -> usize {
        self.new_registrations.as_ref().map_or(0, Vec::len)
    }

    pub fn new_signing_count(&self) -> usize {
        self.new_signings.as_ref().map_or(0, Vec::len)
    }

    pub fn health_hut_signing_count(&self) -> usize {
        self.health_hut_signings.as_ref().map_or(0, Vec::len)
    }
}

/// Registered locally on the visit's calendar day, registration inside the window
pub fn is_new_registration(record: &VisitRecord, window: &DateWindow) -> bool {
    match record.registration_day() {
        Some(registered) => {
            record.registered_locally
                && registered == record.visit_day()
                && window.contains(registered)
        }
        None => false,
    }
}

fn signed_in_window(record: &VisitRecord, window: &DateWindow) -> bool {
    record.signed_locally
        && record.signing_day().map_or(false, |d| window.contains(d))
}

/// Local signing inside the window, excluding the health-hut team
pub fn is_new_signing(record: &VisitRecord, window: &DateWindow) -> bool {
    signed_in_window(record, window) && !record.in_health_hut
}

/// Local signing inside the window by the health-hut team
pub fn is_health_hut_signing(record: &VisitRecord, window: &DateWindow) -> bool {
    signed_in_window(record, window) && record.in_health_hut
}

fn signing_row(record: &VisitRecord) -> Option<SigningRow> {
    Some(SigningRow {
        provider: record.provider.clone(),
        patient_id: record.patient_id.clone(),
        signing_date: record.signing_date?,
    })
}

/// Extract the subsets the input's date columns allow, preserving input order
pub fn extract_subsets(
    records: &[VisitRecord],
    window: &DateWindow,
    groups: MetricGroups,
) -> SubsetTables {
    let new_registrations = groups.new_registrations.then(|| {
        records
            .iter()
            .filter(|r| is_new_registration(r, window))
            .filter_map(|r| {
                Some(NewRegistrationRow {
                    provider: r.provider.clone(),
                    patient_id: r.patient_id.clone(),
                    registration_date: r.registration_date?,
                    visit_date: r.visit_date,
                })
            })
            .collect()
    });

    let (new_signings, health_hut_signings) = if groups.new_signings {
        let new_signings = records
            .iter()
            .filter(|r| is_new_signing(r, window))
            .filter_map(signing_row)
            .collect();
        let hut = records
            .iter()
            .filter(|r| is_health_hut_signing(r, window))
            .filter_map(signing_row)
            .collect();
        (Some(new_signings), Some(hut))
    } else {
        (None, None)
    };

    let subsets = SubsetTables {
        new_registrations,
        new_signings,
        health_hut_signings,
    };
    debug!(
        new_registrations = subsets.new_registration_count(),
        new_signings = subsets.new_signing_count(),
        health_hut_signings = subsets.health_hut_signing_count(),
        "extracted subsets"
    );
    subsets
}

/// Count rows per non-blank provider
pub fn count_by_provider<'a, I>(providers: I) -> BTreeMap<&'a str, u64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = BTreeMap::new();
    for provider in providers.into_iter().filter(|p| !p.is_empty()) {
        *counts.entry(provider).or_insert(0) += 1;
    }
    counts
}

/// Left join of per-provider counts onto the main table.
///
/// Every main row is kept and gets 0 when absent from `counts`. Providers
/// only present in `counts` are reported and never added as rows.
fn left_merge<F>(
    mut stats: Vec<ProviderStatistics>,
    counts: &BTreeMap<&str, u64>,
    subset: &str,
    mut apply: F,
) -> Vec<ProviderStatistics>
where
    F: FnMut(&mut ProviderStatistics, u64),
{
    let known: BTreeSet<&str> = stats.iter().map(|s| s.provider.as_str()).collect();
    let orphans: Vec<&str> = counts.keys().copied().filter(|p| !known.contains(p)).collect();
    if !orphans.is_empty() {
        warn!(subset, providers = ?orphans, "subset providers missing from the main table");
    }

    for row in stats.iter_mut() {
        let count = counts.get(row.provider.as_str()).copied().unwrap_or(0);
        apply(row, count);
    }
    stats
}

/// Merge subset counts and their pool-based rates into the main table
pub fn merge_subsets(stats: Vec<ProviderStatistics>, subsets: &SubsetTables) -> Vec<ProviderStatistics> {
    let mut stats = stats;

    if let Some(rows) = &subsets.new_registrations {
        let counts = count_by_provider(rows.iter().map(|r| r.provider.as_str()));
        stats = left_merge(stats, &counts, "new_registrations", |row, count| {
            row.new_registrations = Some(NewRegistrationMetrics {
                count,
                rate: pool_rate(count, row.remaining_unregistered),
                rank: 0,
            });
        });
    }

    if let Some(rows) = &subsets.new_signings {
        let counts = count_by_provider(rows.iter().map(|r| r.provider.as_str()));
        stats = left_merge(stats, &counts, "new_signings", |row, count| {
            row.new_signings = Some(NewSigningMetrics {
                count,
                rate: pool_rate(count, row.remaining_unsigned),
                ..Default::default()
            });
        });
    }

    if let Some(rows) = &subsets.health_hut_signings {
        let counts = count_by_provider(rows.iter().map(|r| r.provider.as_str()));
        stats = left_merge(stats, &counts, "health_hut_signings", |row, count| {
            row.new_signings.get_or_insert_with(Default::default).health_hut_count = count;
        });
    }

    stats
}
