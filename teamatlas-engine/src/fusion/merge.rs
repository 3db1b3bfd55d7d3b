// Record Fuser - duplicate detection and confidence-weighted merging
//
// Records sharing a merge key describe the same real-world team. The
// highest-confidence record of a group is primary; lower-confidence records
// only fill fields the primary lacks.

use super::standardize::{fold_accents, CLUB_TOKENS};
use crate::types::{RawRecord, TeamRecord, DEFAULT_COLORS, MAX_TEAMS_PER_COUNTRY};
use std::cmp::Ordering;
use tracing::debug;

/// Confidence bonus for agreement between distinct sources
pub const MULTI_SOURCE_BONUS: f64 = 0.1;

fn key_part(value: &str) -> String {
    fold_accents(value)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !CLUB_TOKENS.contains(w))
        .collect()
}

/// Normalized name + city identity key
pub fn merge_key(team: &TeamRecord) -> String {
    format!("{}{}", key_part(&team.name), key_part(&team.city))
}

fn place_key(value: &str) -> String {
    fold_accents(value).chars().filter(|c| c.is_alphanumeric()).collect()
}

/// City plus reported localities, as comparable keys
fn places(raw: &RawRecord) -> Vec<String> {
    raw.city
        .iter()
        .chain(raw.localities.iter())
        .map(|p| place_key(p))
        .filter(|k| !k.is_empty())
        .collect()
}

fn raw_name_key(raw: &RawRecord) -> Option<String> {
    raw.name.as_deref().map(key_part).filter(|k| !k.is_empty())
}

/// Put same-name raw records on one city spelling before keying
///
/// Sources name a club's location at different granularity ("La Boca" vs
/// "Buenos Aires"). Walking records by descending confidence, a record whose
/// places overlap an earlier same-name record's places takes that record's
/// city. A record without a city borrows one when its same-name records agree
/// on a single city.
pub fn align_cities(raws: &mut [RawRecord]) {
    let name_keys: Vec<Option<String>> = raws.iter().map(raw_name_key).collect();
    let mut order: Vec<usize> = (0..raws.len()).collect();
    order.sort_by(|&a, &b| {
        raws[b]
            .confidence
            .partial_cmp(&raws[a].confidence)
            .unwrap_or(Ordering::Equal)
    });

    for (pos, &i) in order.iter().enumerate() {
        let Some(name) = name_keys[i].as_ref() else {
            continue;
        };
        let Some(city) = raws[i].city.as_deref().map(place_key) else {
            continue;
        };
        let own_places = places(&raws[i]);

        for &anchor in &order[..pos] {
            if name_keys[anchor].as_ref() != Some(name) {
                continue;
            }
            let Some(anchor_city) = raws[anchor].city.clone() else {
                continue;
            };
            if place_key(&anchor_city) == city {
                break;
            }
            if places(&raws[anchor]).iter().any(|p| own_places.contains(p)) {
                debug!(from = ?raws[i].city, to = %anchor_city, "Aligned city across sources");
                raws[i].city = Some(anchor_city);
                break;
            }
        }
    }

    for &i in &order {
        if raws[i].city.is_some() {
            continue;
        }
        let Some(name) = name_keys[i].as_ref() else {
            continue;
        };

        let mut candidates: Vec<(String, String)> = Vec::new();
        for &other in &order {
            if name_keys[other].as_ref() != Some(name) {
                continue;
            }
            if let Some(city) = raws[other].city.as_ref() {
                let key = place_key(city);
                if !candidates.iter().any(|(k, _)| *k == key) {
                    candidates.push((key, city.clone()));
                }
            }
        }

        if let [(_, city)] = candidates.as_slice() {
            raws[i].city = Some(city.clone());
        }
    }
}

fn by_confidence_desc(a: &TeamRecord, b: &TeamRecord) -> Ordering {
    b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal)
}

/// Fuse one group of records sharing a merge key
///
/// Returns `None` only for an empty group.
pub fn fuse_group(group: &[TeamRecord]) -> Option<TeamRecord> {
    // Stable sort keeps input order among equal confidences
    let mut ranked: Vec<&TeamRecord> = group.iter().collect();
    ranked.sort_by(|a, b| by_confidence_desc(a, b));

    let mut fused = (*ranked.first()?).clone();

    for other in ranked.iter().skip(1) {
        if fused.founded.is_none() {
            fused.founded = other.founded;
        }
        if fused.website.is_none() {
            fused.website = other.website.clone();
        }
        if fused.stadium.name.is_none() {
            fused.stadium.name = other.stadium.name.clone();
        }
        if fused.stadium.capacity.is_none() {
            fused.stadium.capacity = other.stadium.capacity;
        }
        if fused.stadium.coordinates.is_none() {
            fused.stadium.coordinates = other.stadium.coordinates;
        }
        if fused.colors == DEFAULT_COLORS.map(String::from) && other.colors != fused.colors {
            fused.colors = other.colors.clone();
        }
        if other.last_updated > fused.last_updated {
            fused.last_updated = other.last_updated;
        }
    }

    // Unions follow input order
    fused.sources.clear();
    fused.achievements.clear();
    for record in group {
        for source in &record.sources {
            if !fused.sources.contains(source) {
                fused.sources.push(source.clone());
            }
        }
        for achievement in &record.achievements {
            if !fused.achievements.contains(achievement) {
                fused.achievements.push(achievement.clone());
            }
        }
    }

    let max_confidence = ranked[0].confidence;
    fused.confidence = if fused.sources.len() > 1 {
        (max_confidence + MULTI_SOURCE_BONUS).min(1.0)
    } else {
        max_confidence
    };

    Some(fused)
}

/// Group by merge key, fuse each group, rank and cap
pub fn fuse(records: Vec<TeamRecord>) -> Vec<TeamRecord> {
    let input_count = records.len();
    let mut keys: Vec<String> = Vec::new();
    let mut groups: Vec<Vec<TeamRecord>> = Vec::new();

    for record in records {
        let key = merge_key(&record);
        match keys.iter().position(|k| *k == key) {
            Some(i) => groups[i].push(record),
            None => {
                keys.push(key);
                groups.push(vec![record]);
            }
        }
    }

    let mut fused: Vec<TeamRecord> = groups.iter().filter_map(|g| fuse_group(g)).collect();
    fused.sort_by(by_confidence_desc);
    fused.truncate(MAX_TEAMS_PER_COUNTRY);

    debug!(
        "Fusion complete: {} records → {} teams ({} groups)",
        input_count,
        fused.len(),
        groups.len()
    );

    fused
}
