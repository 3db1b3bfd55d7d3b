//! Configuration resolution for teamatlas-engine
//!
//! REST catalog key priority: ENV → TOML → public key.

use teamatlas_common::config::TeamAtlasConfig;
use tracing::{info, warn};

/// Environment variable holding the REST catalog API key
pub const REST_CATALOG_KEY_ENV: &str = "TEAMATLAS_SPORTSDB_KEY";

/// Free public key accepted by the REST catalog
pub const PUBLIC_REST_CATALOG_KEY: &str = "3";

/// Resolve the REST catalog API key
pub fn resolve_rest_catalog_key(config: &TeamAtlasConfig) -> String {
    let env_key = std::env::var(REST_CATALOG_KEY_ENV).ok();
    resolve_key_from(env_key, config.sources.rest_catalog_key.clone())
}

fn resolve_key_from(env_key: Option<String>, toml_key: Option<String>) -> String {
    let env_key = env_key.filter(|k| is_valid_key(k));
    let toml_key = toml_key.filter(|k| is_valid_key(k));

    // Warn if multiple sources (potential misconfiguration)
    if env_key.is_some() && toml_key.is_some() {
        warn!("REST catalog key found in environment and TOML. Using environment (highest priority).");
    }

    if let Some(key) = env_key {
        info!("REST catalog key loaded from environment variable");
        return key.trim().to_string();
    }

    if let Some(key) = toml_key {
        info!("REST catalog key loaded from TOML config");
        return key.trim().to_string();
    }

    info!("REST catalog key not configured, using public key");
    PUBLIC_REST_CATALOG_KEY.to_string()
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
