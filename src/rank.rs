/*!
 * Dense ranking
 *
 * Rank 1 is the highest value. Equal values share a rank and the next
 * distinct value takes the next integer, so the ranks of one metric are
 * always `1..=k` for `k` distinct values.
 */

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::ProviderStatistics;

/// Metrics that receive a rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankedMetric {
    RegistrationRate,
    SigningRate,
    NewRegistrationRate,
    NewSigningRate,
    NewSigningCount,
}

impl RankedMetric {
    pub const ALL: [RankedMetric; 5] = [
        RankedMetric::RegistrationRate,
        RankedMetric::SigningRate,
        RankedMetric::NewRegistrationRate,
        RankedMetric::NewSigningRate,
        RankedMetric::NewSigningCount,
    ];

    /// Value ranked for a provider, `None` when the metric group is absent
    pub fn value(&self, stats: &ProviderStatistics) -> Option<f64> {
        match self {
            RankedMetric::RegistrationRate => Some(stats.registration_rate),
            RankedMetric::SigningRate => Some(stats.signing_rate),
            RankedMetric::NewRegistrationRate => stats.new_registrations.map(|m| m.rate),
            RankedMetric::NewSigningRate => stats.new_signings.map(|m| m.rate),
            RankedMetric::NewSigningCount => stats.new_signings.map(|m| m.count as f64),
        }
    }

    /// Rank currently stored for a provider
    pub fn rank(&self, stats: &ProviderStatistics) -> Option<u32> {
        match self {
            RankedMetric::RegistrationRate => Some(stats.registration_rank),
            RankedMetric::SigningRate => Some(stats.signing_rank),
            RankedMetric::NewRegistrationRate => stats.new_registrations.map(|m| m.rank),
            RankedMetric::NewSigningRate => stats.new_signings.map(|m| m.rate_rank),
            RankedMetric::NewSigningCount => stats.new_signings.map(|m| m.count_rank),
        }
    }

    fn assign(&self, stats: &mut ProviderStatistics, rank: u32) {
        match self {
            RankedMetric::RegistrationRate => stats.registration_rank = rank,
            RankedMetric::SigningRate => stats.signing_rank = rank,
            RankedMetric::NewRegistrationRate => {
                if let Some(m) = stats.new_registrations.as_mut() {
                    m.rank = rank;
                }
            }
            RankedMetric::NewSigningRate => {
                if let Some(m) = stats.new_signings.as_mut() {
                    m.rate_rank = rank;
                }
            }
            RankedMetric::NewSigningCount => {
                if let Some(m) = stats.new_signings.as_mut() {
                    m.count_rank = rank;
                }
            }
        }
    }
}

/// Dense descending ranks for `values`, position for position
pub fn dense_rank(values: &[f64]) -> Vec<u32> {
    let mut distinct: Vec<f64> = values.to_vec();
    distinct.sort_by(|a, b| b.total_cmp(a));
    distinct.dedup_by(|a, b| a.total_cmp(b).is_eq());

    values
        .iter()
        .map(|v| {
            let position = distinct
                .binary_search_by(|probe| v.total_cmp(probe))
                .unwrap_or_else(|p| p);
            position as u32 + 1
        })
        .collect()
}

/// Rank every metric present in the table, each independently of the others
pub fn rank_providers(mut stats: Vec<ProviderStatistics>) -> Vec<ProviderStatistics> {
    for metric in RankedMetric::ALL {
        let ranked: Vec<(usize, f64)> = stats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| metric.value(s).map(|v| (i, v)))
            .collect();
        if ranked.is_empty() {
            continue;
        }

        let values: Vec<f64> = ranked.iter().map(|(_, v)| *v).collect();
        let ranks = dense_rank(&values);
        for ((index, _), rank) in ranked.iter().zip(ranks) {
            metric.assign(&mut stats[*index], rank);
        }
        debug!(?metric, providers = ranked.len(), "ranked metric");
    }
    stats
}
