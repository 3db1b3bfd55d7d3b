//! Static-file adapter (club lists hosted as JSON files)
//!
//! Files live at `{base}/{season}/{league_path}.clubs.json`. A key without a
//! league path is reported as skipped, without a request.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use teamatlas_common::config::SourceSettings;
use tracing::{debug, warn};

use super::{
    build_http_client, completeness_confidence, non_empty, send_json, FetchReport, RequestGate,
    SourceAdapter, SourceError, SourceMetrics, SourceStats,
};
use crate::types::{CountryKey, RawRecord, SourceKind};

/// Curated but sparse; slightly below the knowledge graph
const SOURCE_WEIGHT: f64 = 0.9;

#[derive(Debug, Deserialize)]
struct ClubsFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    clubs: Vec<ClubEntry>,
}

#[derive(Debug, Deserialize)]
struct ClubEntry {
    name: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    stadium: Option<String>,
    #[serde(default)]
    capacity: Option<i64>,
    #[serde(default)]
    founded: Option<i32>,
}

/// Static-file adapter
pub struct StaticFileAdapter {
    http_client: reqwest::Client,
    base_url: String,
    season: String,
    gate: RequestGate,
    metrics: SourceMetrics,
}

impl StaticFileAdapter {
    pub fn new(settings: &SourceSettings) -> Result<Self, SourceError> {
        Self::with_base_url(
            &settings.static_file_url,
            &settings.static_file_season,
            Duration::from_millis(settings.static_file_interval_ms),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn with_base_url(
        base_url: &str,
        season: &str,
        min_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            season: season.to_string(),
            gate: RequestGate::new(min_interval),
            metrics: SourceMetrics::default(),
        })
    }

    fn file_url(&self, league_path: &str) -> String {
        format!("{}/{}/{}.clubs.json", self.base_url, self.season, league_path)
    }

    async fn download(&self, country: &CountryKey, league_path: &str) -> Result<Vec<RawRecord>, SourceError> {
        self.gate.wait().await;

        let url = self.file_url(league_path);
        debug!(country = %country.code, url = %url, "Fetching static club file");

        let file: ClubsFile = send_json(self.http_client.get(&url), &self.metrics).await?;
        let league = non_empty(file.name.as_deref());

        Ok(file
            .clubs
            .into_iter()
            .map(|club| to_raw(club, league.as_deref(), country))
            .collect())
    }
}

/// Club files often omit the city; such records rely on fusion to borrow one
/// from another source for the same club
fn to_raw(club: ClubEntry, league: Option<&str>, country: &CountryKey) -> RawRecord {
    let mut record = RawRecord {
        name: non_empty(Some(&club.name)),
        city: non_empty(club.city.as_deref()),
        short_name: non_empty(club.code.as_deref()),
        league: league.map(str::to_string),
        stadium_name: non_empty(club.stadium.as_deref()),
        stadium_capacity: club.capacity,
        founded: club.founded,
        source: SourceKind::StaticFile.as_str().to_string(),
        ..Default::default()
    };
    record.confidence = completeness_confidence(&record, SOURCE_WEIGHT);
    if record.league.is_none() {
        record.league = Some(country.default_league());
    }
    record
}

#[async_trait]
impl SourceAdapter for StaticFileAdapter {
    fn name(&self) -> &'static str {
        SourceKind::StaticFile.as_str()
    }

    async fn fetch(&self, country: &CountryKey) -> FetchReport {
        let Some(league_path) = country.league_path.as_deref() else {
            debug!(country = %country.code, "No static club file for country");
            return FetchReport::skipped();
        };

        match self.download(country, league_path).await {
            Ok(records) => {
                self.metrics.record_records(records.len());
                FetchReport::ok(records)
            }
            Err(e) => {
                self.metrics.record_failure();
                warn!(country = %country.code, source = self.name(), error = %e, "Source fetch failed");
                FetchReport::failed()
            }
        }
    }

    fn stats(&self) -> SourceStats {
        self.metrics.snapshot(self.name())
    }
}
