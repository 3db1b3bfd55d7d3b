// Standardizer - RawRecord → canonical TeamRecord
//
// Pure function of its inputs plus the transform context (country, clock).
// Records whose name or city is missing or a known placeholder are rejected.

use crate::types::{
    Coordinates, CountryKey, RawCoordinates, RawRecord, Stadium, TeamRecord, DEFAULT_COLORS,
};
use chrono::{DateTime, Datelike, Utc};
use reqwest::Url;

/// Plausible stadium capacity range
pub const MIN_CAPACITY: i64 = 100;
pub const MAX_CAPACITY: i64 = 150_000;

/// Earliest accepted founding year
pub const MIN_FOUNDED_YEAR: i32 = 1800;

/// Generic club-type tokens ignored for short names and merge keys
pub const CLUB_TOKENS: &[&str] = &[
    "fc", "cf", "sc", "afc", "ac", "as", "cd", "ca", "sd", "ud", "fk", "sk", "sv", "bk", "if",
    "club", "united", "utd", "athletic", "atletico", "calcio", "football", "futbol",
];

/// Connective words skipped when building initials
const CONNECTIVES: &[&str] = &["de", "del", "la", "el", "los", "the", "of", "and", "y", "da", "do"];

/// Sentinel names and cities that never identify a real team
const PLACEHOLDERS: &[&str] = &[
    "unknown",
    "n/a",
    "na",
    "none",
    "null",
    "undefined",
    "tbd",
    "tba",
    "-",
    "?",
    "capital city",
    "capital",
    "city",
    "main city",
    "unnamed",
    "test",
    "example",
    "default",
];

/// Country and clock a batch of records is standardized against
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub country_code: String,
    pub default_league: String,
    pub now: DateTime<Utc>,
}

impl TransformContext {
    pub fn new(country: &CountryKey) -> Self {
        Self::at(country, Utc::now())
    }

    pub fn at(country: &CountryKey, now: DateTime<Utc>) -> Self {
        Self {
            country_code: country.code.clone(),
            default_league: country.default_league(),
            now,
        }
    }
}

/// Standardize one raw record; `None` means rejected
pub fn standardize(raw: &RawRecord, ctx: &TransformContext) -> Option<TeamRecord> {
    let name = raw.name.as_deref().map(clean_text).filter(|n| !is_placeholder(n))?;
    let city = raw.city.as_deref().map(clean_text).filter(|c| !is_placeholder(c))?;

    let name = normalize_case(&name);
    let city = normalize_case(&city);

    let short_name = raw
        .short_name
        .as_deref()
        .map(clean_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| derive_short_name(&name));

    let league = raw
        .league
        .as_deref()
        .map(clean_text)
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| ctx.default_league.clone());

    let stadium = Stadium {
        name: raw
            .stadium_name
            .as_deref()
            .map(clean_text)
            .filter(|s| !s.is_empty()),
        capacity: raw.stadium_capacity.and_then(clamp_capacity),
        coordinates: raw.coordinates.as_ref().and_then(normalize_coordinates),
    };

    let mut achievements: Vec<String> = Vec::new();
    for a in raw.achievements.iter().map(|a| clean_text(a)) {
        if !a.is_empty() && !achievements.contains(&a) {
            achievements.push(a);
        }
    }

    Some(TeamRecord {
        id: team_id(&ctx.country_code, &name),
        name,
        short_name,
        city,
        country: ctx.country_code.clone(),
        founded: raw.founded.filter(|&y| valid_founded(y, ctx.now.year())),
        stadium,
        league,
        website: raw.website.as_deref().and_then(normalize_website),
        colors: normalize_colors(&raw.colors),
        achievements,
        sources: vec![raw.source.clone()],
        confidence: raw.confidence.clamp(0.0, 1.0),
        last_updated: ctx.now,
        synthetic: false,
    })
}

/// Trim and collapse internal whitespace
pub fn clean_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Placeholder or empty after cleaning
pub fn is_placeholder(value: &str) -> bool {
    let lower = clean_text(value).to_lowercase();
    lower.is_empty()
        || !lower.chars().any(char::is_alphanumeric)
        || PLACEHOLDERS.contains(&lower.as_str())
        || lower.starts_with("unknown")
        || lower.starts_with("placeholder")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Title-case text that arrived entirely in lower or upper case
///
/// Short all-caps tokens ("FC", "AFC") keep their case; mixed-case input is
/// left alone.
pub fn normalize_case(value: &str) -> String {
    let letters: Vec<char> = value.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return value.to_string();
    }

    if letters.iter().all(|c| c.is_lowercase()) {
        return value.split(' ').map(capitalize).collect::<Vec<_>>().join(" ");
    }

    if letters.iter().all(|c| c.is_uppercase()) && letters.len() > 4 {
        return value
            .split(' ')
            .map(|w| if w.chars().count() <= 3 { w.to_string() } else { capitalize(w) })
            .collect::<Vec<_>>()
            .join(" ");
    }

    value.to_string()
}

/// Lowercase with common Latin diacritics removed
pub fn fold_accents(value: &str) -> String {
    value
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            'ß' => 's',
            other => other,
        })
        .collect()
}

fn is_club_token(word: &str) -> bool {
    CLUB_TOKENS.contains(&fold_accents(word).as_str())
}

/// Initials of significant words, or the first three letters when there are
/// fewer than two significant words
pub fn derive_short_name(name: &str) -> String {
    let initials: String = name
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty())
        .filter(|w| !is_club_token(w) && !CONNECTIVES.contains(&fold_accents(w).as_str()))
        .filter_map(|w| w.chars().find(|c| c.is_alphanumeric()))
        .flat_map(char::to_uppercase)
        .take(4)
        .collect();

    if initials.chars().count() >= 2 {
        initials
    } else {
        name.chars()
            .filter(|c| c.is_alphanumeric())
            .take(3)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

fn in_range(lat: f64, lon: f64) -> Option<Coordinates> {
    let valid = lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon);
    valid.then_some(Coordinates { lat, lon })
}

/// Convert any source representation to lat/lon, rejecting out-of-range values
pub fn normalize_coordinates(raw: &RawCoordinates) -> Option<Coordinates> {
    match raw {
        RawCoordinates::LatLon { lat, lon } => in_range(*lat, *lon),
        RawCoordinates::WktPoint(wkt) => {
            let trimmed = wkt.trim();
            let open = trimmed.find('(')?;
            let close = trimmed.rfind(')')?;
            if !trimmed[..open].trim().eq_ignore_ascii_case("point") || close <= open {
                return None;
            }
            let mut parts = trimmed[open + 1..close].split_whitespace();
            let lon: f64 = parts.next()?.parse().ok()?;
            let lat: f64 = parts.next()?.parse().ok()?;
            in_range(lat, lon)
        }
        RawCoordinates::Text(text) => {
            let (lat, lon) = text.split_once(',')?;
            in_range(lat.trim().parse().ok()?, lon.trim().parse().ok()?)
        }
    }
}

/// Non-positive → none; otherwise clamped into the plausible range
pub fn clamp_capacity(capacity: i64) -> Option<u32> {
    if capacity <= 0 {
        return None;
    }
    u32::try_from(capacity.clamp(MIN_CAPACITY, MAX_CAPACITY)).ok()
}

pub fn valid_founded(year: i32, current_year: i32) -> bool {
    (MIN_FOUNDED_YEAR..=current_year).contains(&year)
}

/// Add a missing scheme and keep only http(s) URLs with a host
pub fn normalize_website(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).ok()?;
    let has_host = url.host_str().is_some_and(|h| h.contains('.') || h == "localhost");
    (matches!(url.scheme(), "http" | "https") && has_host).then(|| url.to_string())
}

fn named_color(name: &str) -> Option<&'static str> {
    let hex = match name {
        "white" => "#FFFFFF",
        "black" => "#000000",
        "red" => "#FF0000",
        "blue" => "#0000FF",
        "green" => "#008000",
        "yellow" => "#FFFF00",
        "orange" => "#FFA500",
        "navy" | "navy blue" => "#000080",
        "sky blue" | "light blue" => "#87CEEB",
        "claret" | "maroon" => "#800000",
        "purple" | "violet" => "#800080",
        "gold" => "#FFD700",
        _ => return None,
    };
    Some(hex)
}

/// `#RGB`, `#RRGGBB` (with or without `#`) or a common color name → `#RRGGBB`
pub fn normalize_color(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);

    if hex.chars().all(|c| c.is_ascii_hexdigit()) {
        match hex.len() {
            6 => return Some(format!("#{}", hex.to_ascii_uppercase())),
            3 => {
                let doubled: String = hex.chars().flat_map(|c| [c, c]).collect();
                return Some(format!("#{}", doubled.to_ascii_uppercase()));
            }
            _ => {}
        }
    }

    named_color(&clean_text(trimmed).to_lowercase()).map(str::to_string)
}

/// Exactly two colors, defaults filling the gaps
pub fn normalize_colors(colors: &[String]) -> [String; 2] {
    let mut valid = colors.iter().filter_map(|c| normalize_color(c));
    let primary = valid.next().unwrap_or_else(|| DEFAULT_COLORS[0].to_string());
    let secondary = valid.next().unwrap_or_else(|| DEFAULT_COLORS[1].to_string());
    [primary, secondary]
}

/// URL-safe lowercase slug
pub fn slug(value: &str) -> String {
    let mut out = String::new();
    for c in fold_accents(value).chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

/// `<country lowercase>-<slug(name)>`
pub fn team_id(country_code: &str, name: &str) -> String {
    format!("{}-{}", country_code.to_ascii_lowercase(), slug(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countries::country_key;
    use chrono::TimeZone;

    fn ctx() -> TransformContext {
        TransformContext::at(&country_key("AR"), Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_rejects_missing_and_placeholder_fields() {
        let ctx = ctx();
        assert!(standardize(&RawRecord::new("Unknown", "Rosario", "a", 0.6), &ctx).is_none());
        assert!(standardize(&RawRecord::new("Rosario Central", "Capital City", "a", 0.6), &ctx).is_none());
        assert!(standardize(&RawRecord::new("   ", "Rosario", "a", 0.6), &ctx).is_none());
        assert!(standardize(&RawRecord::new("Unknown Team 3", "Rosario", "a", 0.6), &ctx).is_none());

        let no_city = RawRecord {
            name: Some("Rosario Central".into()),
            ..Default::default()
        };
        assert!(standardize(&no_city, &ctx).is_none());
    }

    #[test]
    fn test_standardize_normalizes_fields() {
        let mut raw = RawRecord::new("  river   plate ", "BUENOS AIRES", "a", 0.8);
        raw.stadium_capacity = Some(500_000);
        raw.coordinates = Some(RawCoordinates::WktPoint("Point(-58.4497 -34.5453)".into()));
        raw.website = Some("cariverplate.com.ar".into());
        raw.colors = vec!["fff".into(), "#e30613".into()];
        raw.founded = Some(1901);

        let team = standardize(&raw, &ctx()).unwrap();
        assert_eq!(team.name, "River Plate");
        assert_eq!(team.city, "Buenos Aires");
        assert_eq!(team.short_name, "RP");
        assert_eq!(team.id, "ar-river-plate");
        assert_eq!(team.stadium.capacity, Some(150_000));
        assert_eq!(team.stadium.coordinates, Some(Coordinates { lat: -34.5453, lon: -58.4497 }));
        assert_eq!(team.website.as_deref(), Some("https://cariverplate.com.ar/"));
        assert_eq!(team.colors, ["#FFFFFF".to_string(), "#E30613".to_string()]);
        assert_eq!(team.league, "Argentinian Primera Division");
        assert_eq!(team.sources, vec!["a".to_string()]);
        assert_eq!(team.founded, Some(1901));
    }

    #[test]
    fn test_founded_outside_range_is_dropped() {
        let mut raw = RawRecord::new("Club Uno", "Salta", "a", 0.5);
        raw.founded = Some(1700);
        assert_eq!(standardize(&raw, &ctx()).unwrap().founded, None);

        raw.founded = Some(2030);
        assert_eq!(standardize(&raw, &ctx()).unwrap().founded, None);
    }

    #[test]
    fn test_short_name_rules() {
        assert_eq!(derive_short_name("Club Atlético River Plate"), "RP");
        assert_eq!(derive_short_name("Arsenal FC"), "ARS");
        assert_eq!(derive_short_name("Manchester United"), "MAN");
        assert_eq!(derive_short_name("Newell's Old Boys"), "NOB");
    }

    #[test]
    fn test_case_normalization() {
        assert_eq!(normalize_case("boca juniors"), "Boca Juniors");
        assert_eq!(normalize_case("RIVER PLATE FC"), "River Plate FC");
        assert_eq!(normalize_case("PSV"), "PSV");
        assert_eq!(normalize_case("McLaren Vale"), "McLaren Vale");
    }

    #[test]
    fn test_coordinate_representations() {
        assert_eq!(
            normalize_coordinates(&RawCoordinates::Text("-34.6, -58.4".into())),
            Some(Coordinates { lat: -34.6, lon: -58.4 })
        );
        assert_eq!(normalize_coordinates(&RawCoordinates::LatLon { lat: 91.0, lon: 0.0 }), None);
        assert_eq!(normalize_coordinates(&RawCoordinates::WktPoint("Point(200 10)".into())), None);
        assert_eq!(normalize_coordinates(&RawCoordinates::Text("nowhere".into())), None);
    }

    #[test]
    fn test_capacity_clamp() {
        assert_eq!(clamp_capacity(0), None);
        assert_eq!(clamp_capacity(-5), None);
        assert_eq!(clamp_capacity(40), Some(100));
        assert_eq!(clamp_capacity(45_000), Some(45_000));
    }

    #[test]
    fn test_website_validation() {
        assert_eq!(normalize_website("ftp://files.example.org"), None);
        assert_eq!(normalize_website("not a url"), None);
        assert_eq!(
            normalize_website("http://www.bocajuniors.com.ar/club"),
            Some("http://www.bocajuniors.com.ar/club".to_string())
        );
    }

    #[test]
    fn test_colors_default_when_absent_or_invalid() {
        assert_eq!(normalize_colors(&[]), ["#FFFFFF".to_string(), "#000000".to_string()]);
        assert_eq!(
            normalize_colors(&["Sky Blue".into(), "zz".into()]),
            ["#87CEEB".to_string(), "#000000".to_string()]
        );
    }
}
