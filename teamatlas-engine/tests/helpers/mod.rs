//! Test Helper Utilities
//!
//! Shared fixtures for teamatlas-engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use teamatlas_engine::adapters::{AdapterSet, FetchReport, SourceAdapter, SourceStats};
use teamatlas_engine::cache::{CacheConfig, TieredCache};
use teamatlas_engine::orchestrator::Orchestrator;
use teamatlas_engine::types::{CountryKey, RawRecord};

/// Scripted adapter that replays one report and counts calls
pub struct MockAdapter {
    name: &'static str,
    report: Mutex<FetchReport>,
    calls: AtomicUsize,
}

impl MockAdapter {
    pub fn new(name: &'static str, report: FetchReport) -> Arc<Self> {
        Arc::new(Self {
            name,
            report: Mutex::new(report),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn empty(name: &'static str) -> Arc<Self> {
        Self::new(name, FetchReport::ok(Vec::new()))
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Self::new(name, FetchReport::failed())
    }

    pub fn with_teams(name: &'static str, teams: &[(&str, &str)]) -> Arc<Self> {
        let records = teams
            .iter()
            .map(|(team, city)| RawRecord::new(*team, *city, name, 0.8))
            .collect();
        Self::new(name, FetchReport::ok(records))
    }

    /// Replace the scripted report for subsequent calls
    pub fn set_report(&self, report: FetchReport) {
        *self.report.lock().unwrap() = report;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _country: &CountryKey) -> FetchReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.report.lock().unwrap().clone()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            source: self.name.to_string(),
            requests: self.calls() as u64,
            ..Default::default()
        }
    }
}

/// The three mocks behind an orchestrator, kept for call assertions
pub struct MockSources {
    pub knowledge_graph: Arc<MockAdapter>,
    pub static_file: Arc<MockAdapter>,
    pub rest_catalog: Arc<MockAdapter>,
}

impl MockSources {
    pub fn empty() -> Self {
        Self {
            knowledge_graph: MockAdapter::empty("knowledge_graph"),
            static_file: MockAdapter::empty("static_file"),
            rest_catalog: MockAdapter::empty("rest_catalog"),
        }
    }

    pub fn adapter_set(&self) -> AdapterSet {
        AdapterSet::new(
            self.knowledge_graph.clone(),
            self.static_file.clone(),
            self.rest_catalog.clone(),
        )
    }
}

pub fn test_cache_config() -> CacheConfig {
    CacheConfig {
        fast_ttl: Duration::from_secs(60),
        durable_ttl: Duration::from_secs(3600),
        fast_max_entries: 100,
        sweep_interval: Duration::from_secs(60),
    }
}

pub fn create_test_cache() -> Arc<TieredCache> {
    Arc::new(TieredCache::in_memory(test_cache_config()))
}

pub fn create_test_orchestrator(sources: &MockSources) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(create_test_cache(), sources.adapter_set()))
}

/// Distinct club names that never share a merge key
pub const CLUB_NAMES: [&str; 8] = [
    "Boca Juniors",
    "River Plate",
    "Racing Club",
    "Independiente",
    "San Lorenzo",
    "Estudiantes",
    "Velez Sarsfield",
    "Lanus",
];

/// First `count` clubs of [`CLUB_NAMES`], all in one city
pub fn clubs(count: usize) -> Vec<(&'static str, &'static str)> {
    CLUB_NAMES.iter().take(count).map(|name| (*name, "Buenos Aires")).collect()
}
