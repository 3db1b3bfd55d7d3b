//! Core data model for the team fusion engine
//!
//! Raw records flow from source adapters into the transformer, which produces
//! canonical [`TeamRecord`]s. The orchestrator wraps them in a
//! [`CountryDataset`] that is cached and served to consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record reliability score (0.0-1.0)
pub type Confidence = f64;

/// Maximum number of teams kept per country
pub const MAX_TEAMS_PER_COUNTRY: usize = 30;

/// Placeholder colors used when a source supplies none
pub const DEFAULT_COLORS: [&str; 2] = ["#FFFFFF", "#000000"];

// ============================================================================
// Classification
// ============================================================================

/// Country data-availability tier
///
/// Determines which adapters are queried and how often the country is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    /// Major football nations, refreshed daily
    Tier1,
    /// Well-covered leagues, refreshed weekly
    Tier2,
    /// Long-tail countries, refreshed monthly
    Tier3,
}

impl PriorityTier {
    pub const ALL: [PriorityTier; 3] = [PriorityTier::Tier1, PriorityTier::Tier2, PriorityTier::Tier3];

    /// Tier 1 and 2 use the rich-source-first strategy
    pub fn is_well_covered(self) -> bool {
        matches!(self, PriorityTier::Tier1 | PriorityTier::Tier2)
    }

    pub fn as_u8(self) -> u8 {
        match self {
            PriorityTier::Tier1 => 1,
            PriorityTier::Tier2 => 2,
            PriorityTier::Tier3 => 3,
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.as_u8())
    }
}

/// Built-in source identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    KnowledgeGraph,
    StaticFile,
    RestCatalog,
    Fallback,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::KnowledgeGraph => "knowledge_graph",
            SourceKind::StaticFile => "static_file",
            SourceKind::RestCatalog => "rest_catalog",
            SourceKind::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Country key
// ============================================================================

/// Everything an adapter needs to query one country
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryKey {
    /// ISO 3166-1 alpha-2 code, upper case
    pub code: String,
    /// Display name ("Argentina")
    pub name: String,
    pub tier: PriorityTier,
    /// League names understood by the REST catalog
    pub leagues: Vec<String>,
    /// Static-file league path segment ("ar.1")
    pub league_path: Option<String>,
}

impl CountryKey {
    /// League name used when a record carries none
    pub fn default_league(&self) -> String {
        self.leagues
            .first()
            .cloned()
            .unwrap_or_else(|| format!("{} League", self.name))
    }
}

// ============================================================================
// Raw records (Tier 1 adapter output)
// ============================================================================

/// Coordinates as delivered by a source, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawCoordinates {
    /// Numeric latitude/longitude pair
    LatLon { lat: f64, lon: f64 },
    /// WKT literal, longitude first: `Point(-58.44 -34.54)`
    WktPoint(String),
    /// Free text `"lat,lon"`
    Text(String),
}

/// Source-specific team data before standardization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub name: Option<String>,
    pub city: Option<String>,
    pub short_name: Option<String>,
    pub league: Option<String>,
    pub stadium_name: Option<String>,
    pub stadium_capacity: Option<i64>,
    pub coordinates: Option<RawCoordinates>,
    pub founded: Option<i32>,
    pub website: Option<String>,
    pub colors: Vec<String>,
    pub achievements: Vec<String>,
    /// Every place name the source reports for the club (district, city,
    /// region); used to line up cities across sources
    pub localities: Vec<String>,
    /// Adapter tag that produced this record
    pub source: String,
    /// Adapter-assigned confidence (0.0-1.0)
    pub confidence: Confidence,
}

impl RawRecord {
    /// Number of optional fields tracked for completeness scoring
    pub const OPTIONAL_FIELDS: usize = 9;

    pub fn new(
        name: impl Into<String>,
        city: impl Into<String>,
        source: impl Into<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            name: Some(name.into()),
            city: Some(city.into()),
            source: source.into(),
            confidence,
            ..Default::default()
        }
    }

    /// Count of populated optional fields (0..=OPTIONAL_FIELDS)
    pub fn populated_optional_fields(&self) -> usize {
        [
            has_text(&self.short_name),
            has_text(&self.league),
            has_text(&self.stadium_name),
            self.stadium_capacity.is_some_and(|c| c > 0),
            self.coordinates.is_some(),
            self.founded.is_some(),
            has_text(&self.website),
            !self.colors.is_empty(),
            !self.achievements.is_empty(),
        ]
        .iter()
        .filter(|&&present| present)
        .count()
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

// ============================================================================
// Canonical records
// ============================================================================

/// Normalized WGS84 coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Home venue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stadium {
    pub name: Option<String>,
    pub capacity: Option<u32>,
    pub coordinates: Option<Coordinates>,
}

/// Canonical team record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub city: String,
    pub country: String,
    pub founded: Option<i32>,
    pub stadium: Stadium,
    pub league: String,
    pub website: Option<String>,
    pub colors: [String; 2],
    pub achievements: Vec<String>,
    pub sources: Vec<String>,
    pub confidence: Confidence,
    pub last_updated: DateTime<Utc>,
    /// Set only on the synthesized fallback record
    #[serde(default)]
    pub synthetic: bool,
}

/// All teams known for one country, as served to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryDataset {
    pub country_code: String,
    /// Confidence-descending, at most MAX_TEAMS_PER_COUNTRY
    pub teams: Vec<TeamRecord>,
    pub data_sources: Vec<String>,
    pub priority_tier: PriorityTier,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub is_fallback: bool,
}
