// src/ingest/freshness.rs
// Cache freshness reporting: the per-filter fresh/stale probe and the
// estimated daily credit spend against the fixed per-provider budgets.
// Pure reads of store and config state.

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::ingest::config::{AppConfig, SlotConfig};
use crate::store::{ArticleStore, QueryFilters, StoreResult};

/// Estimated credits used per day: every configured parameter set costs
/// one upstream request per slot fire.
#[derive(Debug, Clone, Serialize)]
pub struct CreditEstimate {
    pub newsdata_requests_per_day: usize,
    pub newsdata_daily_limit: u32,
    pub newsapi_requests_per_day: usize,
    pub newsapi_daily_limit: u32,
}

impl CreditEstimate {
    pub fn within_budget(&self) -> bool {
        self.newsdata_requests_per_day <= self.newsdata_daily_limit as usize
            && self.newsapi_requests_per_day <= self.newsapi_daily_limit as usize
    }
}

pub fn estimate_daily_credits(config: &AppConfig) -> CreditEstimate {
    estimate_for_slots(
        &config.slots,
        config.newsdata_daily_limit,
        config.newsapi_daily_limit,
    )
}

pub fn estimate_for_slots(
    slots: &[SlotConfig],
    newsdata_daily_limit: u32,
    newsapi_daily_limit: u32,
) -> CreditEstimate {
    let (a, b) = slots.iter().fold((0usize, 0usize), |(a, b), slot| {
        let (sa, sb) = slot.request_counts();
        (a + sa, b + sb)
    });
    CreditEstimate {
        newsdata_requests_per_day: a,
        newsdata_daily_limit,
        newsapi_requests_per_day: b,
        newsapi_daily_limit,
    }
}

/// Outcome of a per-filter freshness probe against the store.
#[derive(Debug, Serialize)]
pub struct FreshnessCheck {
    pub fresh: bool,
    /// Minutes since the newest matching record was fetched; None when
    /// nothing matches (always stale).
    pub age_minutes: Option<i64>,
}

/// A filter's cache is fresh when its newest `fetched_at` is within
/// `cache_expiry_minutes`. An empty match is stale by definition.
pub fn check_freshness(
    store: &ArticleStore,
    filters: &QueryFilters,
    cache_expiry_minutes: i64,
) -> StoreResult<FreshnessCheck> {
    let newest = store.latest_fetched_at(filters)?;
    Ok(match newest {
        Some(fetched_at) => {
            let age = Utc::now() - fetched_at;
            FreshnessCheck {
                fresh: age <= Duration::minutes(cache_expiry_minutes),
                age_minutes: Some(age.num_minutes()),
            }
        }
        None => FreshnessCheck {
            fresh: false,
            age_minutes: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_estimate_sums_parameter_sets_across_slots() {
        let cfg = AppConfig::default();
        let est = estimate_daily_credits(&cfg);
        let by_hand: (usize, usize) = cfg
            .slots
            .iter()
            .map(|s| s.request_counts())
            .fold((0, 0), |(a, b), (sa, sb)| (a + sa, b + sb));
        assert_eq!(est.newsdata_requests_per_day, by_hand.0);
        assert_eq!(est.newsapi_requests_per_day, by_hand.1);
        assert!(est.within_budget());
    }

    #[test]
    fn over_budget_is_detected() {
        let cfg = AppConfig::default();
        let est = estimate_for_slots(&cfg.slots, 1, 1);
        assert!(!est.within_budget());
    }
}
