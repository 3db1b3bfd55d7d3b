//! Source adapters
//!
//! Each adapter fetches raw team records for one country from one upstream
//! source. Adapters never fail past their boundary: transport, status and
//! parse errors are logged and reported as an empty, `failed` fetch.

pub mod knowledge_graph;
pub mod rate_limit;
pub mod rest_catalog;
pub mod static_file;

pub use knowledge_graph::KnowledgeGraphAdapter;
pub use rate_limit::{MinuteQuota, RequestGate};
pub use rest_catalog::RestCatalogAdapter;
pub use static_file::StaticFileAdapter;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use teamatlas_common::config::SourceSettings;
use thiserror::Error;

use crate::types::{Confidence, CountryKey, RawRecord};

const USER_AGENT: &str = concat!("TeamAtlas/", env!("CARGO_PKG_VERSION"));

/// Adapter-internal failure, never returned to callers
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Records from one adapter call
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub records: Vec<RawRecord>,
    /// True when at least one request failed at transport, status or parse level
    pub failed: bool,
    /// False when the adapter had nothing to query for the country
    pub attempted: bool,
}

impl FetchReport {
    pub fn ok(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            failed: false,
            attempted: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            records: Vec::new(),
            failed: true,
            attempted: true,
        }
    }

    /// No request was sent
    pub fn skipped() -> Self {
        Self::default()
    }

    /// Outcome flags, kept after the records are moved out
    pub fn outcome(&self) -> FetchOutcome {
        match (self.attempted, self.failed) {
            (false, _) => FetchOutcome::Skipped,
            (true, true) => FetchOutcome::Failed,
            (true, false) => FetchOutcome::Succeeded,
        }
    }
}

/// How one adapter call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Succeeded,
    Failed,
    Skipped,
}

/// True when at least one adapter was queried and every queried adapter failed
///
/// Skipped adapters neither count as success nor as failure.
pub fn all_attempts_failed(outcomes: &[FetchOutcome]) -> bool {
    let mut attempted = outcomes.iter().filter(|o| **o != FetchOutcome::Skipped).peekable();
    attempted.peek().is_some() && attempted.all(|o| *o == FetchOutcome::Failed)
}

/// Per-adapter request counters
#[derive(Debug, Default)]
pub struct SourceMetrics {
    requests: AtomicU64,
    failures: AtomicU64,
    records: AtomicU64,
}

impl SourceMetrics {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_records(&self, count: usize) {
        self.records.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, source: &str) -> SourceStats {
        SourceStats {
            source: source.to_string(),
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time adapter counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub source: String,
    pub requests: u64,
    pub failures: u64,
    pub records: u64,
}

/// One upstream source of raw team records
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source tag written into every record's `source`
    fn name(&self) -> &'static str;

    /// Fetch raw records, reporting whether the source failed
    async fn fetch(&self, country: &CountryKey) -> FetchReport;

    fn stats(&self) -> SourceStats;

    /// Raw records only; empty on any failure
    async fn fetch_country_teams(&self, country: &CountryKey) -> Vec<RawRecord> {
        self.fetch(country).await.records
    }
}

/// Completeness-based confidence
///
/// `0.5 + 0.5 * populated / total`, scaled by the source weight and kept
/// within [0.5, 1.0].
pub fn completeness_confidence(raw: &RawRecord, weight: f64) -> Confidence {
    let ratio = raw.populated_optional_fields() as f64 / RawRecord::OPTIONAL_FIELDS as f64;
    ((0.5 + 0.5 * ratio) * weight).clamp(0.5, 1.0)
}

/// HTTP client shared by an adapter's requests
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::NetworkError(e.to_string()))
}

/// Send a request and decode a JSON body, counting the attempt
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    metrics: &SourceMetrics,
) -> Result<T, SourceError> {
    metrics.record_request();

    let response = request
        .send()
        .await
        .map_err(|e| SourceError::NetworkError(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SourceError::ParseError(e.to_string()))
}

/// Trimmed, non-empty string or `None`
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The three built-in adapters
#[derive(Clone)]
pub struct AdapterSet {
    pub knowledge_graph: Arc<dyn SourceAdapter>,
    pub static_file: Arc<dyn SourceAdapter>,
    pub rest_catalog: Arc<dyn SourceAdapter>,
}

impl AdapterSet {
    pub fn new(
        knowledge_graph: Arc<dyn SourceAdapter>,
        static_file: Arc<dyn SourceAdapter>,
        rest_catalog: Arc<dyn SourceAdapter>,
    ) -> Self {
        Self {
            knowledge_graph,
            static_file,
            rest_catalog,
        }
    }

    /// Build the production adapters; `rest_key` is the resolved REST catalog key
    pub fn from_settings(settings: &SourceSettings, rest_key: &str) -> Result<Self, SourceError> {
        Ok(Self::new(
            Arc::new(KnowledgeGraphAdapter::new(settings)?),
            Arc::new(StaticFileAdapter::new(settings)?),
            Arc::new(RestCatalogAdapter::new(settings, rest_key)?),
        ))
    }

    pub fn stats(&self) -> Vec<SourceStats> {
        vec![
            self.knowledge_graph.stats(),
            self.static_file.stats(),
            self.rest_catalog.stats(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_monotonic_and_bounded() {
        let mut raw = RawRecord::new("Club", "City", "test", 0.0);
        let bare = completeness_confidence(&raw, 1.0);
        assert_eq!(bare, 0.5);

        raw.founded = Some(1900);
        raw.website = Some("https://example.org".into());
        let richer = completeness_confidence(&raw, 1.0);
        assert!(richer > bare);

        raw.short_name = Some("CLB".into());
        raw.league = Some("League".into());
        raw.stadium_name = Some("Ground".into());
        raw.stadium_capacity = Some(1000);
        raw.coordinates = Some(crate::types::RawCoordinates::LatLon { lat: 0.0, lon: 0.0 });
        raw.colors = vec!["red".into()];
        raw.achievements = vec!["Cup".into()];
        assert_eq!(completeness_confidence(&raw, 1.0), 1.0);
    }

    #[test]
    fn test_confidence_weight_never_drops_below_floor() {
        let raw = RawRecord::new("Club", "City", "test", 0.0);
        assert_eq!(completeness_confidence(&raw, 0.5), 0.5);
    }

    #[test]
    fn test_skipped_adapter_does_not_mask_outage() {
        use FetchOutcome::*;
        assert!(all_attempts_failed(&[Failed, Skipped]));
        assert!(all_attempts_failed(&[Failed, Failed]));
        assert!(!all_attempts_failed(&[Failed, Succeeded]));
        assert!(!all_attempts_failed(&[Skipped, Skipped]));
        assert!(!all_attempts_failed(&[]));
        assert_eq!(FetchReport::skipped().outcome(), Skipped);
        assert_eq!(FetchReport::ok(Vec::new()).outcome(), Succeeded);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = SourceMetrics::default();
        metrics.record_request();
        metrics.record_request();
        metrics.record_failure();
        metrics.record_records(4);

        let stats = metrics.snapshot("rest_catalog");
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.records, 4);
    }
}
