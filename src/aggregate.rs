/*!
 * Per-provider aggregation
 *
 * Groups windowed visit records by provider and derives base counts,
 * remaining (unhandled) counts and base rates. Ranks and new-activity
 * metrics are filled in by later stages.
 */

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data_types::VisitRecord;

/// Statistics for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatistics {
    pub provider: String,
    pub visit_count: u64,

    pub registered_locally: u64,
    pub registered_externally: u64,
    /// Visits without a local registration, whatever their external status
    pub remaining_unregistered: u64,
    pub registration_rate: f64,
    pub registration_rank: u32,
    pub new_registrations: Option<NewRegistrationMetrics>,

    /// Local signings outside the health-hut team
    pub signed_locally: u64,
    pub signed_externally: u64,
    /// Visits by the health-hut team, signed or not
    pub health_hut_signed: u64,
    /// Visits without an effective local signing
    pub remaining_unsigned: u64,
    pub signing_rate: f64,
    pub signing_rank: u32,
    pub new_signings: Option<NewSigningMetrics>,
}

/// Same-day registrations inside the window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRegistrationMetrics {
    pub count: u64,
    /// `count / (remaining_unregistered + count)`, zero when nothing remains
    pub rate: f64,
    pub rank: u32,
}

/// Local signings dated inside the window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSigningMetrics {
    pub count: u64,
    /// `count / (remaining_unsigned + count)`, zero when nothing remains
    pub rate: f64,
    pub rate_rank: u32,
    pub count_rank: u32,
    /// Health-hut signings dated inside the window; not ranked
    pub health_hut_count: u64,
}

/// `numerator / denominator`, or zero for an empty denominator
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Conversion rate against the still-unhandled pool.
///
/// Zero whenever nothing remains unhandled, whatever `new_count` is.
pub fn pool_rate(new_count: u64, remaining: u64) -> f64 {
    if remaining == 0 {
        0.0
    } else {
        ratio(new_count, remaining + new_count)
    }
}

#[derive(Default)]
struct Tally {
    visits: u64,
    registered_locally: u64,
    registered_externally: u64,
    signed_locally: u64,
    signed_externally: u64,
    health_hut_signed: u64,
}

impl Tally {
    fn add(&mut self, record: &VisitRecord) {
        self.visits += 1;
        self.registered_locally += u64::from(record.registered_locally);
        self.registered_externally += u64::from(record.registered_externally);
        self.signed_locally += u64::from(record.effective_local_sign());
        self.signed_externally += u64::from(record.signed_externally);
        self.health_hut_signed += u64::from(record.in_health_hut);
    }

    fn into_statistics(self, provider: String) -> ProviderStatistics {
        let remaining_unregistered = self.visits - self.registered_locally;
        let remaining_unsigned = self.visits - self.signed_locally;

        ProviderStatistics {
            provider,
            visit_count: self.visits,
            registered_locally: self.registered_locally,
            registered_externally: self.registered_externally,
            remaining_unregistered,
            registration_rate: ratio(self.registered_locally, self.visits),
            registration_rank: 0,
            new_registrations: None,
            signed_locally: self.signed_locally,
            signed_externally: self.signed_externally,
            health_hut_signed: self.health_hut_signed,
            remaining_unsigned,
            signing_rate: ratio(self.signed_locally, self.visits),
            signing_rank: 0,
            new_signings: None,
        }
    }
}

/// Group `records` by provider, one row per distinct non-blank provider,
/// ordered by provider name.
///
/// Records with a blank provider belong to no group and are skipped.
pub fn aggregate(records: &[VisitRecord]) -> Vec<ProviderStatistics> {
    let mut groups: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut unattributed = 0usize;

    for record in records {
        if record.provider.is_empty() {
            unattributed += 1;
            continue;
        }
        groups.entry(record.provider.as_str()).or_default().add(record);
    }

    if unattributed > 0 {
        warn!(rows = unattributed, "skipped visits without a provider");
    }

    let stats: Vec<ProviderStatistics> = groups
        .into_iter()
        .map(|(provider, tally)| tally.into_statistics(provider.to_string()))
        .collect();

    debug!(records = records.len(), providers = stats.len(), "aggregated providers");
    stats
}
