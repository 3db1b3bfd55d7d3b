//! REST catalog adapter (TheSportsDB v1 JSON API)
//!
//! One `search_all_teams` request per catalog league; countries without known
//! leagues are searched by sport and country name. The API reports numbers as
//! strings and answers "no results" with `"teams": null`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use teamatlas_common::config::SourceSettings;
use tracing::{debug, warn};

use super::{
    build_http_client, completeness_confidence, non_empty, send_json, FetchReport, MinuteQuota,
    RequestGate, SourceAdapter, SourceError, SourceMetrics, SourceStats,
};
use crate::types::{CountryKey, RawRecord, SourceKind};

const SOURCE_WEIGHT: f64 = 0.95;

#[derive(Debug, Deserialize)]
struct TeamsResponse {
    #[serde(default)]
    teams: Option<Vec<ApiTeam>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTeam {
    str_team: Option<String>,
    str_team_short: Option<String>,
    int_formed_year: Option<Value>,
    str_league: Option<String>,
    str_stadium: Option<String>,
    int_stadium_capacity: Option<Value>,
    str_location: Option<String>,
    str_stadium_location: Option<String>,
    str_website: Option<String>,
    str_colour1: Option<String>,
    str_colour2: Option<String>,
}

/// REST catalog adapter
pub struct RestCatalogAdapter {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    gate: RequestGate,
    quota: MinuteQuota,
    metrics: SourceMetrics,
}

impl RestCatalogAdapter {
    pub fn new(settings: &SourceSettings, api_key: &str) -> Result<Self, SourceError> {
        Self::with_base_url(
            &settings.rest_catalog_url,
            api_key,
            Duration::from_millis(settings.rest_catalog_interval_ms),
            settings.rest_catalog_per_minute,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        min_interval: Duration,
        per_minute: u32,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            gate: RequestGate::new(min_interval),
            quota: MinuteQuota::new(per_minute),
            metrics: SourceMetrics::default(),
        })
    }

    async fn search(&self, params: &[(&str, &str)]) -> Result<Vec<ApiTeam>, SourceError> {
        self.quota.acquire().await;
        self.gate.wait().await;

        let url = format!("{}/{}/search_all_teams.php", self.base_url, self.api_key);
        debug!(url = %url, ?params, "Querying REST catalog");

        let response: TeamsResponse =
            send_json(self.http_client.get(&url).query(params), &self.metrics).await?;
        Ok(response.teams.unwrap_or_default())
    }
}

#[async_trait]
impl SourceAdapter for RestCatalogAdapter {
    fn name(&self) -> &'static str {
        SourceKind::RestCatalog.as_str()
    }

    async fn fetch(&self, country: &CountryKey) -> FetchReport {
        let mut records = Vec::new();
        let mut failed = false;

        let searches: Vec<Vec<(&str, &str)>> = if country.leagues.is_empty() {
            vec![vec![("s", "Soccer"), ("c", country.name.as_str())]]
        } else {
            country
                .leagues
                .iter()
                .map(|league| vec![("l", league.as_str())])
                .collect()
        };

        // Leagues are fetched one after another; a failing league does not stop the rest
        for params in &searches {
            match self.search(params).await {
                Ok(teams) => records.extend(teams.into_iter().map(|t| to_raw(t, country))),
                Err(e) => {
                    failed = true;
                    self.metrics.record_failure();
                    warn!(country = %country.code, source = self.name(), ?params, error = %e, "Source fetch failed");
                }
            }
        }

        self.metrics.record_records(records.len());
        FetchReport {
            records,
            failed,
            attempted: true,
        }
    }

    fn stats(&self) -> SourceStats {
        self.metrics.snapshot(self.name())
    }
}

/// First comma-separated segment of a location string
fn city_from_location(location: Option<&str>) -> Option<String> {
    non_empty(location.and_then(|l| l.split(',').next()))
}

/// Every distinct segment of the location strings, in order
fn location_segments(locations: &[Option<&str>]) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    for segment in locations.iter().flatten().flat_map(|l| l.split(',')) {
        if let Some(segment) = non_empty(Some(segment)) {
            if !segments.contains(&segment) {
                segments.push(segment);
            }
        }
    }
    segments
}

/// Numeric fields arrive as strings, occasionally as numbers
fn parse_number<T: std::str::FromStr>(value: Option<&Value>) -> Option<T> {
    match value? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn to_raw(team: ApiTeam, country: &CountryKey) -> RawRecord {
    let colors = [team.str_colour1.as_deref(), team.str_colour2.as_deref()]
        .into_iter()
        .filter_map(non_empty)
        .collect();

    let locations = [team.str_location.as_deref(), team.str_stadium_location.as_deref()];

    let mut record = RawRecord {
        name: non_empty(team.str_team.as_deref()),
        city: locations.iter().find_map(|l| city_from_location(*l)),
        localities: location_segments(&locations),
        short_name: non_empty(team.str_team_short.as_deref()),
        league: non_empty(team.str_league.as_deref()),
        stadium_name: non_empty(team.str_stadium.as_deref()),
        stadium_capacity: parse_number(team.int_stadium_capacity.as_ref()),
        founded: parse_number(team.int_formed_year.as_ref()),
        website: non_empty(team.str_website.as_deref()),
        colors,
        source: SourceKind::RestCatalog.as_str().to_string(),
        ..Default::default()
    };
    record.confidence = completeness_confidence(&record, SOURCE_WEIGHT);
    if record.league.is_none() {
        record.league = Some(country.default_league());
    }
    record
}
