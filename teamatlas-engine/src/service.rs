//! TeamAtlas service facade
//!
//! Wires cache, adapters, orchestrator and scheduler together and exposes the
//! consumer-facing operations.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use teamatlas_common::config::TeamAtlasConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::{AdapterSet, SourceStats};
use crate::cache::{CacheConfig, CacheStats, DurableStore, MemoryStore, SqliteStore, TieredCache};
use crate::config::resolve_rest_catalog_key;
use crate::error::EngineResult;
use crate::orchestrator::{Orchestrator, RefreshOutcome};
use crate::scheduler::{SchedulerConfig, SchedulerHandle, SchedulerStats, UpdateScheduler};
use crate::types::CountryDataset;

/// Combined engine statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub cache: CacheStats,
    pub queue_length: usize,
    pub sources: Vec<SourceStats>,
    pub scheduler: SchedulerStats,
}

/// Running background tasks
pub struct BackgroundTasks {
    scheduler: SchedulerHandle,
    sweeper: JoinHandle<()>,
    sweeper_cancel: CancellationToken,
}

impl BackgroundTasks {
    pub async fn shutdown(self) {
        self.sweeper_cancel.cancel();
        self.scheduler.shutdown().await;
        if let Err(e) = self.sweeper.await {
            tracing::warn!(error = %e, "Cache sweeper ended abnormally");
        }
        info!("Background tasks stopped");
    }
}

/// Team data fusion engine
pub struct TeamAtlas {
    orchestrator: Arc<Orchestrator>,
    scheduler: Arc<UpdateScheduler>,
}

impl TeamAtlas {
    pub fn new(orchestrator: Arc<Orchestrator>, scheduler_config: SchedulerConfig) -> Self {
        let scheduler = Arc::new(UpdateScheduler::new(orchestrator.clone(), scheduler_config));
        Self {
            orchestrator,
            scheduler,
        }
    }

    /// Build from configuration; `pool` backs the durable tier when present
    pub fn from_config(config: &TeamAtlasConfig, pool: Option<SqlitePool>) -> EngineResult<Self> {
        let durable: Arc<dyn DurableStore> = match pool {
            Some(pool) => Arc::new(SqliteStore::new(
                pool,
                config.cache.durable_max_entries,
                config.cache.max_lock_wait_ms,
            )),
            None => Arc::new(MemoryStore::new(config.cache.durable_max_entries)),
        };
        let cache = Arc::new(TieredCache::new(CacheConfig::from(&config.cache), Some(durable)));

        let rest_key = resolve_rest_catalog_key(config);
        let adapters = AdapterSet::from_settings(&config.sources, &rest_key)?;

        let orchestrator = Arc::new(Orchestrator::new(cache, adapters));
        Ok(Self::new(orchestrator, SchedulerConfig::from(&config.scheduler)))
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn scheduler(&self) -> &Arc<UpdateScheduler> {
        &self.scheduler
    }

    /// Cached team list for a country; never empty, never an error
    pub async fn get_country_teams(&self, country_code: &str) -> CountryDataset {
        self.orchestrator.get_country_teams(country_code).await
    }

    /// Bypass the cache and refetch a country now
    pub async fn refresh_country(&self, country_code: &str) -> EngineResult<RefreshOutcome> {
        self.orchestrator.refresh(country_code).await
    }

    /// Queue countries for the scheduler, bypassing the tier timers
    pub async fn force_update<S: AsRef<str>>(&self, country_codes: &[S]) -> EngineResult<usize> {
        self.scheduler.force_update(country_codes).await
    }

    pub async fn get_stats(&self) -> EngineStats {
        let scheduler = self.scheduler.stats().await;
        EngineStats {
            cache: self.orchestrator.cache().stats(),
            queue_length: scheduler.queue_length,
            sources: self.orchestrator.adapters().stats(),
            scheduler,
        }
    }

    /// Start the scheduler and the cache sweeper
    pub fn start_background(&self) -> BackgroundTasks {
        let sweeper_cancel = CancellationToken::new();
        let sweeper = self.orchestrator.cache().spawn_sweeper(sweeper_cancel.clone());
        BackgroundTasks {
            scheduler: self.scheduler.start(),
            sweeper,
            sweeper_cancel,
        }
    }
}
