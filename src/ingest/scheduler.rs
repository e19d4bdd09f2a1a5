// src/ingest/scheduler.rs
// The ingestion control loop: one timer task per configured slot, each
// firing at a fixed UTC wall-clock time, plus manual triggers. A slot
// execution fans out sequentially over the configured parameter sets,
// normalizes everything, and commits one bulk upsert at the end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::article::NewsArticle;
use crate::ingest::config::SlotConfig;
use crate::ingest::types::{FetchParams, NewsProvider};
use crate::ingest::{ensure_metrics_described, normalize_batch};
use crate::store::{ArticleStore, StoreError, UpsertReport};

const BOOTSTRAP_DELAY_SECS: u64 = 3;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Bad input from the triggering caller; surfaced, not swallowed.
    #[error("unknown slot: {0}")]
    UnknownSlot(String),
}

/// Cumulative counters. Successes/failures count slot executions, not
/// individual parameter-set fetches. In-memory only; reset on restart.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestStats {
    pub fetch_attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub articles_saved: u64,
}

/// Result of one slot execution, for logs and the manual-trigger path.
#[derive(Debug, Serialize)]
pub struct SlotOutcome {
    pub slot: String,
    pub committed: usize,
    pub rejected: usize,
    pub fetch_errors: usize,
    pub record_errors: usize,
}

#[derive(Debug, Serialize)]
pub struct SlotStatus {
    pub name: String,
    pub time: String,
    pub description: String,
    pub newsdata_requests: usize,
    pub newsapi_requests: usize,
    pub last_fetch: Option<DateTime<Utc>>,
}

/// Cheaply clone-able handle; all clones share one scheduler. The
/// process's composition root owns the first handle, spawned timer tasks
/// hold the rest.
#[derive(Clone)]
pub struct IngestScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<ArticleStore>,
    provider_a: Arc<dyn NewsProvider>,
    provider_b: Arc<dyn NewsProvider>,
    slots: Vec<SlotConfig>,
    stats: Mutex<IngestStats>,
    last_fetch: Mutex<HashMap<String, DateTime<Utc>>>,
    // Non-empty iff the scheduler is running.
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl IngestScheduler {
    pub fn new(
        store: Arc<ArticleStore>,
        provider_a: Arc<dyn NewsProvider>,
        provider_b: Arc<dyn NewsProvider>,
        slots: Vec<SlotConfig>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            inner: Arc::new(Inner {
                store,
                provider_a,
                provider_b,
                slots,
                stats: Mutex::new(IngestStats::default()),
                last_fetch: Mutex::new(HashMap::new()),
                timers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn slots(&self) -> &[SlotConfig] {
        &self.inner.slots
    }

    pub fn is_running(&self) -> bool {
        !self
            .inner
            .timers
            .lock()
            .expect("timer mutex poisoned")
            .is_empty()
    }

    pub fn stats_snapshot(&self) -> IngestStats {
        self.inner.stats.lock().expect("stats mutex poisoned").clone()
    }

    pub fn last_fetch_snapshot(&self) -> HashMap<String, DateTime<Utc>> {
        self.inner
            .last_fetch
            .lock()
            .expect("last-fetch mutex poisoned")
            .clone()
    }

    pub fn slot_statuses(&self) -> Vec<SlotStatus> {
        let last = self.last_fetch_snapshot();
        self.inner
            .slots
            .iter()
            .map(|s| {
                let (a, b) = s.request_counts();
                SlotStatus {
                    name: s.name.clone(),
                    time: s.time.clone(),
                    description: s.description.clone(),
                    newsdata_requests: a,
                    newsapi_requests: b,
                    last_fetch: last.get(&s.name).copied(),
                }
            })
            .collect()
    }

    /// Arm one recurring timer per slot. No-op when already running. If
    /// the store is empty, one bootstrap slot runs after a short settle
    /// delay so a fresh deployment serves data without waiting for the
    /// first scheduled fire.
    pub fn start(&self) {
        let mut timers = self.inner.timers.lock().expect("timer mutex poisoned");
        if !timers.is_empty() {
            tracing::debug!("scheduler already running, start ignored");
            return;
        }

        for slot in &self.inner.slots {
            let fire = match slot.fire_time() {
                Ok(t) => t,
                Err(e) => {
                    // Config validation catches this earlier; an unarmable
                    // slot must not take the scheduler down.
                    tracing::warn!(slot = %slot.name, error = %e, "slot not armed");
                    continue;
                }
            };
            let me = self.clone();
            let name = slot.name.clone();
            timers.push(tokio::spawn(async move {
                loop {
                    let wait = duration_until_next(Utc::now(), fire);
                    tracing::debug!(slot = %name, wait_secs = wait.as_secs(), "slot timer armed");
                    tokio::time::sleep(wait).await;
                    if let Err(e) = me.execute_slot(&name).await {
                        tracing::warn!(slot = %name, error = %e, "scheduled slot failed");
                    }
                }
            }));
        }

        if self.inner.store.is_empty() {
            if let Some(first) = self.inner.slots.first().map(|s| s.name.clone()) {
                let me = self.clone();
                timers.push(tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_secs(BOOTSTRAP_DELAY_SECS))
                        .await;
                    tracing::info!(slot = %first, "store empty, running bootstrap slot");
                    let _ = me.execute_slot(&first).await;
                }));
            }
        }

        tracing::info!(slots = self.inner.slots.len(), "ingest scheduler started");
    }

    /// Disarm all timers. Idempotent; in-flight slot executions are
    /// cancelled at their next await point.
    pub fn stop(&self) {
        let mut timers = self.inner.timers.lock().expect("timer mutex poisoned");
        for handle in timers.drain(..) {
            handle.abort();
        }
        tracing::info!("ingest scheduler stopped");
    }

    /// Fire-and-forget manual trigger: validates the slot name, then
    /// returns while execution proceeds in the background. Failures are
    /// visible via subsequent status queries.
    pub fn trigger_manual(&self, slot_name: &str) -> Result<(), SchedulerError> {
        let slot = self
            .find_slot(slot_name)
            .ok_or_else(|| SchedulerError::UnknownSlot(slot_name.to_string()))?;
        let name = slot.name.clone();
        let me = self.clone();
        tokio::spawn(async move {
            let _ = me.execute_slot(&name).await;
        });
        Ok(())
    }

    fn find_slot(&self, name: &str) -> Option<&SlotConfig> {
        self.inner
            .slots
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Run one slot to completion: provider A's parameter sets first, then
    /// provider B's, sequentially; a failed fetch is skipped, never fatal.
    /// All normalized records commit in a single bulk upsert at the end.
    pub async fn execute_slot(&self, slot_name: &str) -> Result<SlotOutcome, SchedulerError> {
        let slot = self
            .find_slot(slot_name)
            .ok_or_else(|| SchedulerError::UnknownSlot(slot_name.to_string()))?
            .clone();

        counter!("ingest_slot_runs_total").increment(1);
        self.inner
            .stats
            .lock()
            .expect("stats mutex poisoned")
            .fetch_attempts += 1;

        let mut records: Vec<NewsArticle> = Vec::new();
        let mut rejected = 0usize;
        let mut fetch_errors = 0usize;

        self.fetch_parameter_sets(
            &self.inner.provider_a,
            &slot.newsdata_requests,
            &mut records,
            &mut rejected,
            &mut fetch_errors,
        )
        .await;
        self.fetch_parameter_sets(
            &self.inner.provider_b,
            &slot.newsapi_requests,
            &mut records,
            &mut rejected,
            &mut fetch_errors,
        )
        .await;

        let outcome = match self.inner.store.bulk_upsert(&records) {
            Ok(report) => {
                let committed = report.committed();
                {
                    let mut stats = self.inner.stats.lock().expect("stats mutex poisoned");
                    stats.successes += 1;
                    stats.articles_saved += committed as u64;
                }
                self.inner
                    .last_fetch
                    .lock()
                    .expect("last-fetch mutex poisoned")
                    .insert(slot.name.clone(), Utc::now());
                counter!("ingest_articles_saved_total").increment(committed as u64);
                gauge!("ingest_last_run_ts").set(Utc::now().timestamp() as f64);

                if !report.errors.is_empty() {
                    tracing::warn!(
                        slot = %slot.name,
                        record_errors = report.errors.len(),
                        "some records failed storage validation"
                    );
                }
                tracing::info!(
                    slot = %slot.name,
                    committed,
                    rejected,
                    fetch_errors,
                    "slot execution committed"
                );
                SlotOutcome {
                    slot: slot.name.clone(),
                    committed,
                    rejected,
                    fetch_errors,
                    record_errors: report.errors.len(),
                }
            }
            Err(e) => {
                self.inner
                    .stats
                    .lock()
                    .expect("stats mutex poisoned")
                    .failures += 1;
                tracing::error!(slot = %slot.name, error = %e, "slot could not write to store");
                SlotOutcome {
                    slot: slot.name.clone(),
                    committed: 0,
                    rejected,
                    fetch_errors,
                    record_errors: 0,
                }
            }
        };
        Ok(outcome)
    }

    /// Synchronous ad-hoc refresh outside the slot system: one abstract
    /// filter set sent to both providers, committed immediately.
    pub async fn refresh_now(&self, params: FetchParams) -> Result<UpsertReport, StoreError> {
        let mut records: Vec<NewsArticle> = Vec::new();
        let mut rejected = 0usize;
        let mut fetch_errors = 0usize;
        let sets = [params];

        self.fetch_parameter_sets(
            &self.inner.provider_a,
            &sets,
            &mut records,
            &mut rejected,
            &mut fetch_errors,
        )
        .await;
        self.fetch_parameter_sets(
            &self.inner.provider_b,
            &sets,
            &mut records,
            &mut rejected,
            &mut fetch_errors,
        )
        .await;

        let report = self.inner.store.bulk_upsert(&records)?;
        tracing::info!(
            committed = report.committed(),
            rejected,
            fetch_errors,
            "manual refresh committed"
        );
        Ok(report)
    }

    /// Sequential fan-out over one provider's parameter sets. Awaits each
    /// call before issuing the next to bound outbound load; a failure is
    /// logged and skipped so the remaining sets still run.
    async fn fetch_parameter_sets(
        &self,
        provider: &Arc<dyn NewsProvider>,
        sets: &[FetchParams],
        records: &mut Vec<NewsArticle>,
        rejected: &mut usize,
        fetch_errors: &mut usize,
    ) {
        for params in sets {
            match provider.fetch(params).await {
                Ok(raw) => {
                    let (mut batch, dropped) = normalize_batch(&raw, params);
                    *rejected += dropped;
                    records.append(&mut batch);
                }
                Err(e) => {
                    *fetch_errors += 1;
                    counter!("ingest_provider_errors_total").increment(1);
                    tracing::warn!(
                        provider = %provider.tag(),
                        params = %params.describe(),
                        error = %e,
                        "parameter-set fetch failed, skipping"
                    );
                }
            }
        }
    }
}

/// Time until the next occurrence of `fire` (UTC wall clock), from `now`.
fn duration_until_next(now: DateTime<Utc>, fire: NaiveTime) -> std::time::Duration {
    let today = now.date_naive().and_time(fire).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_fire_is_today_when_still_ahead() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let fire = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
        assert_eq!(
            duration_until_next(now, fire),
            std::time::Duration::from_secs(8 * 3600)
        );
    }

    #[test]
    fn next_fire_rolls_to_tomorrow_when_passed() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 19, 0, 0).unwrap();
        let fire = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
        assert_eq!(
            duration_until_next(now, fire),
            std::time::Duration::from_secs(23 * 3600)
        );
    }
}
