//! Static country catalog
//!
//! Tier classification is a fixed lookup, independent of live data. Codes not
//! in the catalog are treated as long-tail (tier 3) and displayed by code.

use crate::types::{CountryKey, PriorityTier};
use PriorityTier::{Tier1, Tier2, Tier3};

/// Catalog entry for one country
#[derive(Debug, Clone, Copy)]
pub struct CountryInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub tier: PriorityTier,
    /// League names in the REST catalog
    pub leagues: &'static [&'static str],
    /// Static-file league path override; `{code}.1` when `None`
    pub league_path: Option<&'static str>,
}

const fn entry(
    code: &'static str,
    name: &'static str,
    tier: PriorityTier,
    leagues: &'static [&'static str],
    league_path: Option<&'static str>,
) -> CountryInfo {
    CountryInfo {
        code,
        name,
        tier,
        leagues,
        league_path,
    }
}

const fn minor(code: &'static str, name: &'static str) -> CountryInfo {
    entry(code, name, Tier3, &[], None)
}

static CATALOG: &[CountryInfo] = &[
    // Tier 1
    entry("GB", "England", Tier1, &["English Premier League", "English League Championship"], Some("en.1")),
    entry("DE", "Germany", Tier1, &["German Bundesliga", "German 2. Bundesliga"], None),
    entry("ES", "Spain", Tier1, &["Spanish La Liga", "Spanish La Liga 2"], None),
    entry("IT", "Italy", Tier1, &["Italian Serie A", "Italian Serie B"], None),
    entry("FR", "France", Tier1, &["French Ligue 1", "French Ligue 2"], None),
    entry("BR", "Brazil", Tier1, &["Brazilian Serie A"], None),
    entry("AR", "Argentina", Tier1, &["Argentinian Primera Division"], None),
    entry("PT", "Portugal", Tier1, &["Portuguese Primeira Liga"], None),
    entry("NL", "Netherlands", Tier1, &["Dutch Eredivisie"], None),
    // Tier 2
    entry("BE", "Belgium", Tier2, &["Belgian Pro League"], None),
    entry("TR", "Turkey", Tier2, &["Turkish Super Lig"], None),
    entry("MX", "Mexico", Tier2, &["Mexican Primera League"], None),
    entry("US", "United States", Tier2, &["American Major League Soccer"], None),
    entry("JP", "Japan", Tier2, &["Japanese J1 League"], None),
    entry("RU", "Russia", Tier2, &["Russian Football Premier League"], None),
    entry("UA", "Ukraine", Tier2, &["Ukrainian Premier League"], None),
    entry("AT", "Austria", Tier2, &["Austrian Football Bundesliga"], None),
    entry("CH", "Switzerland", Tier2, &["Swiss Super League"], None),
    entry("GR", "Greece", Tier2, &["Greek Superleague Greece"], None),
    entry("DK", "Denmark", Tier2, &["Danish Superliga"], None),
    entry("SE", "Sweden", Tier2, &["Swedish Allsvenskan"], None),
    entry("NO", "Norway", Tier2, &["Norwegian Eliteserien"], None),
    entry("PL", "Poland", Tier2, &["Polish Ekstraklasa"], None),
    entry("CZ", "Czech Republic", Tier2, &["Czech First League"], None),
    entry("HR", "Croatia", Tier2, &["Croatian First Football League"], None),
    entry("RS", "Serbia", Tier2, &["Serbian Super Liga"], None),
    entry("RO", "Romania", Tier2, &["Romanian Liga I"], None),
    entry("HU", "Hungary", Tier2, &["Hungarian NB I"], None),
    entry("CO", "Colombia", Tier2, &["Colombian Primera A"], None),
    entry("CL", "Chile", Tier2, &["Chilean Primera Division"], None),
    entry("UY", "Uruguay", Tier2, &["Uruguayan Primera Division"], None),
    entry("KR", "South Korea", Tier2, &["South Korean K League 1"], None),
    entry("CN", "China", Tier2, &["Chinese Super League"], None),
    entry("AU", "Australia", Tier2, &["Australian A-League"], None),
    entry("SA", "Saudi Arabia", Tier2, &["Saudi-Arabian Pro League"], None),
    entry("EG", "Egypt", Tier2, &["Egyptian Premier League"], None),
    entry("MA", "Morocco", Tier2, &["Moroccan Botola Pro"], None),
    entry("ZA", "South Africa", Tier2, &["South African Premier Soccer League"], None),
    entry("NG", "Nigeria", Tier2, &["Nigerian Professional Football League"], None),
    entry("CA", "Canada", Tier2, &["Canadian Premier League"], None),
    entry("IE", "Ireland", Tier2, &["Irish Premier Division"], None),
    // Tier 3
    minor("AD", "Andorra"),
    minor("AE", "United Arab Emirates"),
    minor("AF", "Afghanistan"),
    minor("AL", "Albania"),
    minor("AM", "Armenia"),
    minor("AO", "Angola"),
    minor("AZ", "Azerbaijan"),
    minor("BA", "Bosnia and Herzegovina"),
    minor("BD", "Bangladesh"),
    minor("BF", "Burkina Faso"),
    minor("BG", "Bulgaria"),
    minor("BH", "Bahrain"),
    minor("BJ", "Benin"),
    minor("BO", "Bolivia"),
    minor("BW", "Botswana"),
    minor("BY", "Belarus"),
    minor("CD", "DR Congo"),
    minor("CI", "Ivory Coast"),
    minor("CM", "Cameroon"),
    minor("CR", "Costa Rica"),
    minor("CU", "Cuba"),
    minor("CY", "Cyprus"),
    minor("DZ", "Algeria"),
    minor("EC", "Ecuador"),
    minor("EE", "Estonia"),
    minor("ET", "Ethiopia"),
    minor("FI", "Finland"),
    minor("GA", "Gabon"),
    minor("GE", "Georgia"),
    minor("GH", "Ghana"),
    minor("GN", "Guinea"),
    minor("GT", "Guatemala"),
    minor("HN", "Honduras"),
    minor("ID", "Indonesia"),
    minor("IL", "Israel"),
    minor("IN", "India"),
    minor("IQ", "Iraq"),
    minor("IR", "Iran"),
    minor("IS", "Iceland"),
    minor("JM", "Jamaica"),
    minor("JO", "Jordan"),
    minor("KE", "Kenya"),
    minor("KW", "Kuwait"),
    minor("KZ", "Kazakhstan"),
    minor("LB", "Lebanon"),
    minor("LT", "Lithuania"),
    minor("LU", "Luxembourg"),
    minor("LV", "Latvia"),
    minor("LY", "Libya"),
    minor("MD", "Moldova"),
    minor("ME", "Montenegro"),
    minor("MK", "North Macedonia"),
    minor("ML", "Mali"),
    minor("MT", "Malta"),
    minor("MY", "Malaysia"),
    minor("MZ", "Mozambique"),
    minor("NZ", "New Zealand"),
    minor("OM", "Oman"),
    minor("PA", "Panama"),
    minor("PE", "Peru"),
    minor("PH", "Philippines"),
    minor("PK", "Pakistan"),
    minor("PY", "Paraguay"),
    minor("QA", "Qatar"),
    minor("RW", "Rwanda"),
    minor("SD", "Sudan"),
    minor("SG", "Singapore"),
    minor("SI", "Slovenia"),
    minor("SK", "Slovakia"),
    minor("SN", "Senegal"),
    minor("SV", "El Salvador"),
    minor("SY", "Syria"),
    minor("TH", "Thailand"),
    minor("TN", "Tunisia"),
    minor("TT", "Trinidad and Tobago"),
    minor("TZ", "Tanzania"),
    minor("UG", "Uganda"),
    minor("UZ", "Uzbekistan"),
    minor("VE", "Venezuela"),
    minor("VN", "Vietnam"),
    minor("ZM", "Zambia"),
    minor("ZW", "Zimbabwe"),
];

/// Normalize a country code to two upper-case ASCII letters
///
/// Returns `None` for anything that is not a two-letter code.
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

/// Catalog lookup by (case-insensitive) code
pub fn lookup(code: &str) -> Option<&'static CountryInfo> {
    CATALOG.iter().find(|c| c.code.eq_ignore_ascii_case(code.trim()))
}

/// Static tier classification; unknown countries are long-tail
pub fn classify_tier(code: &str) -> PriorityTier {
    lookup(code).map(|c| c.tier).unwrap_or(Tier3)
}

/// Human-readable country name, or the code itself when unknown
pub fn display_name(code: &str) -> String {
    lookup(code)
        .map(|c| c.name.to_string())
        .unwrap_or_else(|| code.trim().to_ascii_uppercase())
}

/// Static-file path of a country's top division ("mt.1")
pub fn default_league_path(code: &str) -> String {
    format!("{}.1", code.trim().to_ascii_lowercase())
}

/// Build the adapter query key for a (normalized) code
pub fn country_key(code: &str) -> CountryKey {
    match lookup(code) {
        Some(info) => CountryKey {
            code: info.code.to_string(),
            name: info.name.to_string(),
            tier: info.tier,
            leagues: info.leagues.iter().map(|l| l.to_string()).collect(),
            league_path: Some(
                info.league_path
                    .map(str::to_string)
                    .unwrap_or_else(|| default_league_path(info.code)),
            ),
        },
        None => CountryKey {
            code: code.trim().to_ascii_uppercase(),
            name: display_name(code),
            tier: Tier3,
            leagues: Vec::new(),
            league_path: Some(default_league_path(code)),
        },
    }
}

/// All catalog countries in a tier
pub fn countries_in_tier(tier: PriorityTier) -> impl Iterator<Item = &'static CountryInfo> {
    CATALOG.iter().filter(move |c| c.tier == tier)
}

/// Every catalog country
pub fn all() -> &'static [CountryInfo] {
    CATALOG
}
