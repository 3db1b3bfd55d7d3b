//! Per-country refresh orchestration
//!
//! `cache-check → hit: done | miss: fetch → fuse → cache-write → done`
//!
//! Tier 1/2 countries query the knowledge graph first and add the REST
//! catalog only when fewer than [`SUPPLEMENT_THRESHOLD`] teams survive fusion.
//! Tier 3 countries query the static files and the REST catalog concurrently.
//! An empty result is replaced by a single synthetic fallback record so
//! consumers never see an empty team list.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::adapters::{all_attempts_failed, AdapterSet, FetchReport};
use crate::cache::{CacheTier, TieredCache};
use crate::countries::{country_key, display_name, normalize_code};
use crate::error::{EngineError, EngineResult};
use crate::fusion::{transform, TransformContext};
use crate::scheduler::RefreshTarget;
use crate::types::{
    CountryDataset, CountryKey, SourceKind, Stadium, TeamRecord, DEFAULT_COLORS,
};

/// Cache key namespace for country datasets
pub const CACHE_KEY_PREFIX: &str = "teams:";

/// Fused team count below which a well-covered country is supplemented
pub const SUPPLEMENT_THRESHOLD: usize = 5;

/// Confidence of the synthesized fallback record
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

pub fn cache_key(country_code: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, country_code)
}

/// Result of one uncached refresh
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub dataset: CountryDataset,
    /// Every attempted adapter failed at transport, status or parse level;
    /// adapters with nothing to query are not counted
    pub all_sources_failed: bool,
}

/// Country refresh orchestrator
pub struct Orchestrator {
    cache: Arc<TieredCache>,
    adapters: AdapterSet,
}

impl Orchestrator {
    pub fn new(cache: Arc<TieredCache>, adapters: AdapterSet) -> Self {
        Self { cache, adapters }
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    /// Cached dataset for a country, fetching on miss
    ///
    /// Never fails and never returns an empty team list. Invalid codes get an
    /// uncached fallback dataset.
    pub async fn get_country_teams(&self, country_code: &str) -> CountryDataset {
        let Some(code) = normalize_code(country_code) else {
            warn!(country = %country_code, "Invalid country code, serving fallback");
            let key = country_key(country_code);
            return fallback_dataset(&key);
        };

        if let Some(dataset) = self.cache.get::<CountryDataset>(&cache_key(&code)).await {
            debug!(country = %code, teams = dataset.teams.len(), "Cache hit");
            return dataset;
        }

        debug!(country = %code, "Cache miss, fetching from sources");
        self.fetch_and_store(&code).await.dataset
    }

    /// Fetch from sources regardless of cache state
    pub async fn refresh(&self, country_code: &str) -> EngineResult<RefreshOutcome> {
        let code = normalize_code(country_code)
            .ok_or_else(|| EngineError::InvalidCountry(country_code.to_string()))?;
        Ok(self.fetch_and_store(&code).await)
    }

    async fn fetch_and_store(&self, code: &str) -> RefreshOutcome {
        let start = Instant::now();
        let key = country_key(code);
        let ctx = TransformContext::new(&key);

        let (teams, all_sources_failed) = if key.tier.is_well_covered() {
            self.fetch_well_covered(&key, &ctx).await
        } else {
            self.fetch_long_tail(&key, &ctx).await
        };

        if teams.is_empty() && all_sources_failed {
            // Keep previously fetched real data through a full outage
            if let Some(previous) = self.cache.get::<CountryDataset>(&cache_key(code)).await {
                if !previous.is_fallback {
                    warn!(country = %code, "All sources failed, keeping cached dataset");
                    return RefreshOutcome {
                        dataset: previous,
                        all_sources_failed,
                    };
                }
            }
        }

        let dataset = if teams.is_empty() {
            warn!(country = %code, tier = %key.tier, "No team data from any source, using fallback");
            fallback_dataset(&key)
        } else {
            build_dataset(&key, teams)
        };

        // A fallback caused by an outage stays out of the durable tier
        let tier = if dataset.is_fallback && all_sources_failed {
            CacheTier::Fast
        } else {
            CacheTier::Durable
        };
        self.cache.set(&cache_key(code), &dataset, tier).await;

        info!(
            country = %code,
            tier = %key.tier,
            teams = dataset.teams.len(),
            sources = ?dataset.data_sources,
            fallback = dataset.is_fallback,
            duration_ms = start.elapsed().as_millis() as u64,
            "Country refreshed"
        );

        RefreshOutcome {
            dataset,
            all_sources_failed,
        }
    }

    /// Richest source first, REST catalog when too few teams survive
    async fn fetch_well_covered(
        &self,
        key: &CountryKey,
        ctx: &TransformContext,
    ) -> (Vec<TeamRecord>, bool) {
        let primary = self.adapters.knowledge_graph.fetch(key).await;
        let mut outcomes = vec![primary.outcome()];
        let mut raws = primary.records;
        let mut teams = transform(&raws, ctx);

        if teams.len() < SUPPLEMENT_THRESHOLD {
            debug!(
                country = %key.code,
                teams = teams.len(),
                "Below supplement threshold, querying REST catalog"
            );
            let supplement = self.adapters.rest_catalog.fetch(key).await;
            outcomes.push(supplement.outcome());
            raws.extend(supplement.records);
            teams = transform(&raws, ctx);
        }

        (teams, all_attempts_failed(&outcomes))
    }

    /// Both light sources concurrently, fuse whatever returns
    async fn fetch_long_tail(
        &self,
        key: &CountryKey,
        ctx: &TransformContext,
    ) -> (Vec<TeamRecord>, bool) {
        let (static_report, rest_report): (FetchReport, FetchReport) = tokio::join!(
            self.adapters.static_file.fetch(key),
            self.adapters.rest_catalog.fetch(key)
        );

        let all_failed = all_attempts_failed(&[static_report.outcome(), rest_report.outcome()]);
        let mut raws = static_report.records;
        raws.extend(rest_report.records);

        (transform(&raws, ctx), all_failed)
    }
}

#[async_trait]
impl RefreshTarget for Orchestrator {
    async fn refresh_country(&self, country_code: &str) -> EngineResult<()> {
        let outcome = self.refresh(country_code).await?;
        if outcome.all_sources_failed {
            return Err(EngineError::SourcesUnavailable(country_code.to_string()));
        }
        Ok(())
    }
}

/// Distinct record sources in first-seen order
fn collect_sources(teams: &[TeamRecord]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for source in teams.iter().flat_map(|t| t.sources.iter()) {
        if !sources.contains(source) {
            sources.push(source.clone());
        }
    }
    sources
}

fn build_dataset(key: &CountryKey, teams: Vec<TeamRecord>) -> CountryDataset {
    CountryDataset {
        country_code: key.code.clone(),
        data_sources: collect_sources(&teams),
        teams,
        priority_tier: key.tier,
        last_updated: Utc::now(),
        is_fallback: false,
    }
}

/// Single synthetic record named after the country
pub fn fallback_record(key: &CountryKey) -> TeamRecord {
    let country = display_name(&key.code);
    TeamRecord {
        id: format!("{}-fallback", key.code.to_ascii_lowercase()),
        name: format!("{} FC", country),
        short_name: key.code.clone(),
        city: "Capital City".to_string(),
        country: key.code.clone(),
        founded: None,
        stadium: Stadium::default(),
        league: key.default_league(),
        website: None,
        colors: DEFAULT_COLORS.map(String::from),
        achievements: Vec::new(),
        sources: vec![SourceKind::Fallback.as_str().to_string()],
        confidence: FALLBACK_CONFIDENCE,
        last_updated: Utc::now(),
        synthetic: true,
    }
}

pub fn fallback_dataset(key: &CountryKey) -> CountryDataset {
    CountryDataset {
        country_code: key.code.clone(),
        teams: vec![fallback_record(key)],
        data_sources: vec![SourceKind::Fallback.as_str().to_string()],
        priority_tier: key.tier,
        last_updated: Utc::now(),
        is_fallback: true,
    }
}
