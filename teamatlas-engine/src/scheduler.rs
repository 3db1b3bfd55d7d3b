//! Priority-tiered update scheduler
//!
//! One scheduler object owns the refresh queue, tier timers and counters.
//! Timers enqueue every catalog country of their tier; a worker task drains
//! the queue in batches with bounded in-batch concurrency and a fixed delay
//! between batches. Failed refreshes are retried after `retry_delay` until
//! `max_retries` is exceeded, then dropped until the next timer cycle.
//!
//! Single instance per process: nothing coordinates two schedulers sharing a
//! durable store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use teamatlas_common::config::SchedulerSettings;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::countries::{classify_tier, countries_in_tier, normalize_code};
use crate::error::{EngineError, EngineResult};
use crate::types::PriorityTier;

/// Longest idle wait before the worker re-checks the queue
const IDLE_POLL: Duration = Duration::from_secs(60);

/// Something that can refresh one country
#[async_trait]
pub trait RefreshTarget: Send + Sync {
    async fn refresh_country(&self, country_code: &str) -> EngineResult<()>;
}

/// Why an item was queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    Scheduled,
    Forced,
    Retry,
}

/// One pending country refresh
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub country_code: String,
    pub priority_tier: PriorityTier,
    pub reason: QueueReason,
    pub added_at: DateTime<Utc>,
    pub retry_count: u32,
    /// Not processed before this instant
    pub eligible_at: Instant,
    /// Insertion order
    seq: u64,
}

/// Scheduler timing and limits
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tier1_interval: Duration,
    pub tier2_interval: Duration,
    pub tier3_interval: Duration,
    pub batch_size: usize,
    pub batch_concurrency: usize,
    pub inter_batch_delay: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl SchedulerConfig {
    pub fn interval_for(&self, tier: PriorityTier) -> Duration {
        match tier {
            PriorityTier::Tier1 => self.tier1_interval,
            PriorityTier::Tier2 => self.tier2_interval,
            PriorityTier::Tier3 => self.tier3_interval,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig::from(&SchedulerSettings::default())
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(s: &SchedulerSettings) -> Self {
        Self {
            tier1_interval: Duration::from_secs(s.tier1_interval_secs.max(1)),
            tier2_interval: Duration::from_secs(s.tier2_interval_secs.max(1)),
            tier3_interval: Duration::from_secs(s.tier3_interval_secs.max(1)),
            batch_size: s.batch_size.max(1),
            batch_concurrency: s.batch_concurrency.max(1),
            inter_batch_delay: Duration::from_millis(s.inter_batch_delay_ms),
            max_retries: s.max_retries,
            retry_delay: Duration::from_secs(s.retry_delay_secs),
        }
    }
}

/// Point-in-time scheduler counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub queue_length: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub failed_attempts: u64,
    pub retries_scheduled: u64,
    pub dropped: u64,
    pub last_completed_at: Option<DateTime<Utc>>,
}

/// Outcome of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Default)]
struct SchedulerState {
    queue: Vec<QueueItem>,
    queued: HashSet<String>,
    in_flight: HashSet<String>,
    completed_at: HashMap<String, DateTime<Utc>>,
    next_seq: u64,
    completed: u64,
    failed_attempts: u64,
    retries_scheduled: u64,
    dropped: u64,
    last_completed_at: Option<DateTime<Utc>>,
}

impl SchedulerState {
    fn push(&mut self, mut item: QueueItem) {
        item.seq = self.next_seq;
        self.next_seq += 1;
        self.queued.insert(item.country_code.clone());
        self.queue.push(item);
    }
}

/// Update scheduler
pub struct UpdateScheduler {
    target: Arc<dyn RefreshTarget>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    wake: Notify,
    cancel: CancellationToken,
}

/// Background tasks started by [`UpdateScheduler::start`]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Cancel all scheduler tasks and wait for them to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }
}

impl UpdateScheduler {
    pub fn new(target: Arc<dyn RefreshTarget>, config: SchedulerConfig) -> Self {
        Self {
            target,
            config,
            state: Mutex::new(SchedulerState::default()),
            wake: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queue a country unless it is already queued or being refreshed
    ///
    /// Returns whether a new item was added.
    pub async fn enqueue(&self, country_code: &str, reason: QueueReason) -> EngineResult<bool> {
        let code = normalize_code(country_code)
            .ok_or_else(|| EngineError::InvalidCountry(country_code.to_string()))?;

        let mut state = self.state.lock().await;
        if state.queued.contains(&code) || state.in_flight.contains(&code) {
            debug!(country = %code, ?reason, "Already queued, skipping");
            return Ok(false);
        }

        state.push(QueueItem {
            priority_tier: classify_tier(&code),
            country_code: code,
            reason,
            added_at: Utc::now(),
            retry_count: 0,
            eligible_at: Instant::now(),
            seq: 0,
        });
        drop(state);

        self.wake.notify_one();
        Ok(true)
    }

    /// Queue every catalog country in a tier
    pub async fn enqueue_tier(&self, tier: PriorityTier) -> usize {
        let mut added = 0;
        for country in countries_in_tier(tier) {
            if let Ok(true) = self.enqueue(country.code, QueueReason::Scheduled).await {
                added += 1;
            }
        }
        info!(tier = %tier, added, "Scheduled tier refresh");
        added
    }

    /// Queue countries immediately at their natural tier
    ///
    /// All codes are validated first; one invalid code rejects the request.
    /// A country already waiting on a retry delay becomes eligible now.
    pub async fn force_update<S: AsRef<str>>(&self, country_codes: &[S]) -> EngineResult<usize> {
        let codes = country_codes
            .iter()
            .map(|c| {
                normalize_code(c.as_ref())
                    .ok_or_else(|| EngineError::InvalidCountry(c.as_ref().to_string()))
            })
            .collect::<EngineResult<Vec<String>>>()?;

        let mut added = 0;
        {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            for code in codes {
                if state.in_flight.contains(&code) {
                    continue;
                }
                if let Some(item) = state.queue.iter_mut().find(|i| i.country_code == code) {
                    item.eligible_at = now;
                    item.reason = QueueReason::Forced;
                    continue;
                }
                state.push(QueueItem {
                    priority_tier: classify_tier(&code),
                    country_code: code,
                    reason: QueueReason::Forced,
                    added_at: Utc::now(),
                    retry_count: 0,
                    eligible_at: now,
                    seq: 0,
                });
                added += 1;
            }
        }

        info!(requested = country_codes.len(), added, "Forced update queued");
        self.wake.notify_one();
        Ok(added)
    }

    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Whether a country is waiting in the queue
    pub async fn is_queued(&self, country_code: &str) -> bool {
        self.state.lock().await.queued.contains(country_code)
    }

    /// Copy of the pending queue in processing order
    pub async fn queued_items(&self) -> Vec<QueueItem> {
        let state = self.state.lock().await;
        let mut items = state.queue.clone();
        items.sort_by_key(|i| (i.priority_tier, i.seq));
        items
    }

    pub async fn last_completed(&self, country_code: &str) -> Option<DateTime<Utc>> {
        self.state.lock().await.completed_at.get(country_code).copied()
    }

    /// Remove up to `batch_size` eligible items, highest tier first
    async fn take_batch(&self) -> Vec<QueueItem> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let mut eligible: Vec<(PriorityTier, u64)> = state
            .queue
            .iter()
            .filter(|i| i.eligible_at <= now)
            .map(|i| (i.priority_tier, i.seq))
            .collect();
        eligible.sort();
        eligible.truncate(self.config.batch_size);
        let chosen: HashSet<u64> = eligible.into_iter().map(|(_, seq)| seq).collect();

        let (mut batch, rest): (Vec<QueueItem>, Vec<QueueItem>) = std::mem::take(&mut state.queue)
            .into_iter()
            .partition(|i| chosen.contains(&i.seq));
        state.queue = rest;
        batch.sort_by_key(|i| (i.priority_tier, i.seq));

        for item in &batch {
            state.queued.remove(&item.country_code);
            state.in_flight.insert(item.country_code.clone());
        }
        batch
    }

    /// Time until the earliest queued item becomes eligible
    async fn next_eligible_in(&self) -> Option<Duration> {
        let state = self.state.lock().await;
        let now = Instant::now();
        state
            .queue
            .iter()
            .map(|i| i.eligible_at.saturating_duration_since(now))
            .min()
    }

    async fn record_result(&self, item: QueueItem, result: EngineResult<()>) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&item.country_code);

        match result {
            Ok(()) => {
                let now = Utc::now();
                state.completed += 1;
                state.last_completed_at = Some(now);
                state.completed_at.insert(item.country_code.clone(), now);
                debug!(country = %item.country_code, "Refresh completed");
            }
            Err(e) => {
                state.failed_attempts += 1;
                let retry_count = item.retry_count + 1;

                if retry_count <= self.config.max_retries {
                    state.retries_scheduled += 1;
                    warn!(
                        country = %item.country_code,
                        retry_count,
                        max_retries = self.config.max_retries,
                        error = %e,
                        "Refresh failed, retry scheduled"
                    );
                    state.push(QueueItem {
                        reason: QueueReason::Retry,
                        retry_count,
                        added_at: Utc::now(),
                        eligible_at: Instant::now() + self.config.retry_delay,
                        ..item
                    });
                } else {
                    state.dropped += 1;
                    warn!(
                        country = %item.country_code,
                        attempts = retry_count,
                        error = %e,
                        "Refresh failed permanently, dropped until next scheduled cycle"
                    );
                }
            }
        }
    }

    /// Refresh one batch of eligible countries
    pub async fn process_next_batch(&self) -> BatchReport {
        let batch = self.take_batch().await;
        if batch.is_empty() {
            return BatchReport::default();
        }

        debug!(size = batch.len(), "Processing refresh batch");
        let target = Arc::clone(&self.target);

        let results: Vec<(QueueItem, EngineResult<()>)> = stream::iter(batch)
            .map(|item| {
                let target = Arc::clone(&target);
                async move {
                    let result = target.refresh_country(&item.country_code).await;
                    (item, result)
                }
            })
            .buffer_unordered(self.config.batch_concurrency)
            .collect()
            .await;

        let mut report = BatchReport {
            processed: results.len(),
            ..Default::default()
        };
        for (item, result) in results {
            if result.is_ok() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            self.record_result(item, result).await;
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "Refresh batch completed"
        );
        report
    }

    /// Drain the queue until cancelled
    pub async fn run(self: Arc<Self>) {
        info!("Update scheduler worker started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let report = self.process_next_batch().await;
            if report.processed > 0 {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.inter_batch_delay) => {}
                }
                continue;
            }

            let idle = self.next_eligible_in().await.unwrap_or(IDLE_POLL).min(IDLE_POLL);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(idle) => {}
            }
        }
        info!("Update scheduler worker stopped");
    }

    fn spawn_timer(self: &Arc<Self>, tier: PriorityTier) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let period = scheduler.config.interval_for(tier);
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = scheduler.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        scheduler.enqueue_tier(tier).await;
                    }
                }
            }
            debug!(tier = %tier, "Tier timer stopped");
        })
    }

    /// Spawn the three tier timers and the worker
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let mut tasks: Vec<JoinHandle<()>> = PriorityTier::ALL
            .iter()
            .map(|&tier| self.spawn_timer(tier))
            .collect();
        tasks.push(tokio::spawn(Arc::clone(self).run()));

        info!(
            tier1_secs = self.config.tier1_interval.as_secs(),
            tier2_secs = self.config.tier2_interval.as_secs(),
            tier3_secs = self.config.tier3_interval.as_secs(),
            "Update scheduler started"
        );

        SchedulerHandle {
            cancel: self.cancel.clone(),
            tasks,
        }
    }

    /// Cancel timers and worker
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub async fn stats(&self) -> SchedulerStats {
        let state = self.state.lock().await;
        SchedulerStats {
            queue_length: state.queue.len(),
            in_flight: state.in_flight.len(),
            completed: state.completed,
            failed_attempts: state.failed_attempts,
            retries_scheduled: state.retries_scheduled,
            dropped: state.dropped,
            last_completed_at: state.last_completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOk;

    #[async_trait]
    impl RefreshTarget for AlwaysOk {
        async fn refresh_country(&self, _country_code: &str) -> EngineResult<()> {
            Ok(())
        }
    }

    fn scheduler(batch_size: usize) -> UpdateScheduler {
        let config = SchedulerConfig {
            batch_size,
            inter_batch_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        UpdateScheduler::new(Arc::new(AlwaysOk), config)
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates_by_code() {
        let s = scheduler(5);
        assert!(s.enqueue("ar", QueueReason::Scheduled).await.unwrap());
        assert!(!s.enqueue("AR", QueueReason::Forced).await.unwrap());
        assert_eq!(s.queue_len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_code_rejected() {
        let s = scheduler(5);
        assert!(matches!(
            s.enqueue("ARG", QueueReason::Scheduled).await,
            Err(EngineError::InvalidCountry(_))
        ));
        assert!(s.force_update(&["AR", "??"]).await.is_err());
        assert_eq!(s.queue_len().await, 0);
    }

    #[tokio::test]
    async fn test_queue_ordered_by_tier_then_insertion() {
        let s = scheduler(5);
        s.enqueue("MT", QueueReason::Scheduled).await.unwrap();
        s.enqueue("BE", QueueReason::Scheduled).await.unwrap();
        s.enqueue("BR", QueueReason::Scheduled).await.unwrap();
        s.enqueue("AR", QueueReason::Scheduled).await.unwrap();

        let order: Vec<String> = s.queued_items().await.into_iter().map(|i| i.country_code).collect();
        assert_eq!(order, vec!["BR", "AR", "BE", "MT"]);
    }

    #[tokio::test]
    async fn test_batch_size_respected() {
        let s = scheduler(2);
        s.force_update(&["AR", "BR", "DE"]).await.unwrap();

        let report = s.process_next_batch().await;
        assert_eq!(report.processed, 2);
        assert_eq!(s.queue_len().await, 1);

        let stats = s.stats().await;
        assert_eq!(stats.completed, 2);
        assert!(stats.last_completed_at.is_some());
        assert!(s.last_completed("AR").await.is_some());
    }

    #[test]
    fn test_config_from_settings_clamps_zero_values() {
        let settings = SchedulerSettings {
            batch_size: 0,
            batch_concurrency: 0,
            ..SchedulerSettings::default()
        };
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.batch_concurrency, 1);
        assert_eq!(config.tier1_interval, Duration::from_secs(24 * 3600));
    }
}
