//! Knowledge-graph adapter (Wikidata SPARQL endpoint)
//!
//! One query per country returns every association football club located in
//! it, with optional venue, coordinates, inception, website and league. The
//! endpoint returns one row per combination of multi-valued properties, so
//! rows are folded by club URI.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use teamatlas_common::config::SourceSettings;
use tracing::{debug, warn};

use super::{
    build_http_client, completeness_confidence, non_empty, send_json, FetchReport, RequestGate,
    SourceAdapter, SourceError, SourceMetrics, SourceStats,
};
use crate::types::{CountryKey, RawCoordinates, RawRecord, SourceKind};

/// Richest source; full weight
const SOURCE_WEIGHT: f64 = 1.0;

const ROW_LIMIT: usize = 300;

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

/// Knowledge-graph adapter
pub struct KnowledgeGraphAdapter {
    http_client: reqwest::Client,
    endpoint: String,
    gate: RequestGate,
    metrics: SourceMetrics,
}

impl KnowledgeGraphAdapter {
    pub fn new(settings: &SourceSettings) -> Result<Self, SourceError> {
        Self::with_base_url(
            &settings.knowledge_graph_url,
            Duration::from_millis(settings.knowledge_graph_interval_ms),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    /// Point the adapter at an arbitrary SPARQL endpoint
    pub fn with_base_url(
        endpoint: &str,
        min_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            endpoint: endpoint.to_string(),
            gate: RequestGate::new(min_interval),
            metrics: SourceMetrics::default(),
        })
    }

    async fn query(&self, country: &CountryKey) -> Result<Vec<RawRecord>, SourceError> {
        self.gate.wait().await;

        let sparql = build_query(&country.code);
        debug!(country = %country.code, "Querying knowledge graph");

        let request = self
            .http_client
            .get(&self.endpoint)
            .header("Accept", "application/sparql-results+json")
            .query(&[("query", sparql.as_str()), ("format", "json")]);

        let response: SparqlResponse = send_json(request, &self.metrics).await?;
        Ok(fold_rows(response.results.bindings, country))
    }
}

#[async_trait]
impl SourceAdapter for KnowledgeGraphAdapter {
    fn name(&self) -> &'static str {
        SourceKind::KnowledgeGraph.as_str()
    }

    async fn fetch(&self, country: &CountryKey) -> FetchReport {
        match self.query(country).await {
            Ok(records) => {
                self.metrics.record_records(records.len());
                debug!(country = %country.code, count = records.len(), "Knowledge graph returned clubs");
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

fn build_query(country_code: &str) -> String {
    format!(
        r#"SELECT ?club ?clubLabel ?hqLabel ?adminLabel ?venueLabel ?capacity ?coords ?inception ?website ?leagueLabel WHERE {{
  ?country wdt:P297 "{code}" .
  ?club wdt:P31 wd:Q476028 ;
        wdt:P17 ?country .
  OPTIONAL {{ ?club wdt:P159 ?hq . }}
  OPTIONAL {{ ?club wdt:P131 ?admin . }}
  OPTIONAL {{
    ?club wdt:P115 ?venue .
    OPTIONAL {{ ?venue wdt:P1083 ?capacity . }}
    OPTIONAL {{ ?venue wdt:P625 ?coords . }}
  }}
  OPTIONAL {{ ?club wdt:P571 ?inception . }}
  OPTIONAL {{ ?club wdt:P856 ?website . }}
  OPTIONAL {{ ?club wdt:P118 ?league . }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en". }}
}}
LIMIT {limit}"#,
        code = country_code,
        limit = ROW_LIMIT
    )
}

/// Label service echoes the entity id (`Q12345`) when no English label exists
fn label(row: &HashMap<String, SparqlValue>, var: &str) -> Option<String> {
    non_empty(row.get(var).map(|v| v.value.as_str())).filter(|v| !is_entity_id(v))
}

fn is_entity_id(value: &str) -> bool {
    value
        .strip_prefix('Q')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

fn raw_value<'a>(row: &'a HashMap<String, SparqlValue>, var: &str) -> Option<&'a str> {
    row.get(var).map(|v| v.value.as_str())
}

/// `+1901-05-25T00:00:00Z` style timestamps
fn parse_year(value: &str) -> Option<i32> {
    let trimmed = value.trim_start_matches('+');
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}

fn parse_capacity(value: &str) -> Option<i64> {
    value.trim().parse::<f64>().ok().map(|v| v as i64)
}

/// Fold result rows into one record per club URI, first value per field wins
fn fold_rows(rows: Vec<HashMap<String, SparqlValue>>, country: &CountryKey) -> Vec<RawRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut clubs: HashMap<String, RawRecord> = HashMap::new();

    for row in &rows {
        let Some(uri) = raw_value(row, "club") else {
            continue;
        };

        let record = clubs.entry(uri.to_string()).or_insert_with(|| {
            order.push(uri.to_string());
            RawRecord {
                source: SourceKind::KnowledgeGraph.as_str().to_string(),
                ..Default::default()
            }
        });

        if record.name.is_none() {
            record.name = label(row, "clubLabel");
        }
        if record.city.is_none() {
            record.city = label(row, "hqLabel").or_else(|| label(row, "adminLabel"));
        }
        for place in [label(row, "hqLabel"), label(row, "adminLabel")].into_iter().flatten() {
            if !record.localities.contains(&place) {
                record.localities.push(place);
            }
        }
        if record.stadium_name.is_none() {
            record.stadium_name = label(row, "venueLabel");
        }
        if record.stadium_capacity.is_none() {
            record.stadium_capacity = raw_value(row, "capacity").and_then(parse_capacity);
        }
        if record.coordinates.is_none() {
            record.coordinates = non_empty(raw_value(row, "coords")).map(RawCoordinates::WktPoint);
        }
        if record.founded.is_none() {
            record.founded = raw_value(row, "inception").and_then(parse_year);
        }
        if record.website.is_none() {
            record.website = non_empty(raw_value(row, "website"));
        }
        if record.league.is_none() {
            record.league = label(row, "leagueLabel");
        }
    }

    order
        .into_iter()
        .filter_map(|uri| clubs.remove(&uri))
        .map(|mut record| {
            // Scored before the league default so it does not count as populated
            record.confidence = completeness_confidence(&record, SOURCE_WEIGHT);
            if record.league.is_none() {
                record.league = Some(country.default_league());
            }
            record
        })
        .collect()
}
