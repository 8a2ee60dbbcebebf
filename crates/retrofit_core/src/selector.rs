//! Static (building type, location) → artifact bundle lookup
//!
//! Combinations without a trained bundle are an error. There is no default
//! bundle to fall back to.

use crate::errors::{Result, RetrofitError};
use std::collections::BTreeMap;
use tracing::debug;

/// Legacy building-type spellings and their canonical names
const BUILDING_TYPE_ALIASES: &[(&str, &str)] = &[
    ("MidriseApartment", "MidRise"),
    ("Lowrise", "LowRise"),
];

/// (canonical building type, location) → bundle directory name
const BUNDLE_TABLE: &[((&str, &str), &str)] = &[
    (("MidRise", "Toronto"), "midrise_toronto"),
    (("LowRise", "Toronto"), "lowrise_toronto"),
];

/// Canonical spelling of `building_type`
pub fn canonical_building_type(building_type: &str) -> &str {
    BUILDING_TYPE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == building_type)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(building_type)
}

/// Bundle directory for a building type and location.
///
/// Inputs are trimmed and aliased, then matched exactly, then
/// case-insensitively.
pub fn resolve_bundle_dir(building_type: &str, location: &str) -> Result<&'static str> {
    let trimmed_type = building_type.trim();
    let location = location.trim();
    let canonical = canonical_building_type(trimmed_type);

    if let Some((_, dir)) = BUNDLE_TABLE
        .iter()
        .find(|((bt, loc), _)| *bt == canonical && *loc == location)
    {
        return Ok(*dir);
    }

    if let Some((_, dir)) = BUNDLE_TABLE.iter().find(|((bt, loc), _)| {
        bt.eq_ignore_ascii_case(canonical) && loc.eq_ignore_ascii_case(location)
    }) {
        debug!(building_type = canonical, location, bundle = *dir, "Matched bundle case-insensitively");
        return Ok(*dir);
    }

    Err(RetrofitError::NoModelForCombination {
        building_type: trimmed_type.to_string(),
        location: location.to_string(),
    })
}

/// Location → canonical building types with a trained bundle
pub fn supported_models() -> BTreeMap<&'static str, Vec<&'static str>> {
    let mut supported: BTreeMap<&'static str, Vec<&'static str>> = BTreeMap::new();
    for ((building_type, location), _) in BUNDLE_TABLE {
        supported.entry(*location).or_default().push(*building_type);
    }
    supported
}

/// City name from an EPW weather file name.
///
/// `CAN_ON_Toronto.Pearson.Intl.AP.716240_CWEC2016.epw` → `Toronto`.
/// Returns `Unknown` when the name has no province/city parts.
pub fn location_from_epw(epw_file: &str) -> String {
    const UNKNOWN: &str = "Unknown";

    if epw_file.is_empty() {
        return UNKNOWN.to_string();
    }

    let location = epw_file.replace("CAN_", "").replace(".epw", "");
    let mut parts = location.split('_');
    match (parts.next(), parts.next()) {
        (Some(_province), Some(city)) => city.split('.').next().unwrap_or(city).to_string(),
        _ => UNKNOWN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_resolves_to_canonical_bundle() {
        assert_eq!(canonical_building_type("MidriseApartment"), "MidRise");
        assert_eq!(
            resolve_bundle_dir("MidriseApartment", "Toronto").unwrap(),
            "midrise_toronto"
        );
        assert_eq!(resolve_bundle_dir("  Lowrise ", " Toronto").unwrap(), "lowrise_toronto");
    }

    #[test]
    fn case_insensitive_retry() {
        assert_eq!(resolve_bundle_dir("midrise", "TORONTO").unwrap(), "midrise_toronto");
    }

    #[test]
    fn unknown_combination_fails() {
        match resolve_bundle_dir("unknown-type", "Nowhere") {
            Err(RetrofitError::NoModelForCombination {
                building_type,
                location,
            }) => {
                assert_eq!(building_type, "unknown-type");
                assert_eq!(location, "Nowhere");
            }
            other => panic!("expected NoModelForCombination, got {other:?}"),
        }
        assert!(resolve_bundle_dir("MidRise", "Calgary").is_err());
    }

    #[test]
    fn supported_models_grouped_by_location() {
        let supported = supported_models();
        assert_eq!(supported.len(), 1);
        assert_eq!(supported["Toronto"], vec!["MidRise", "LowRise"]);
    }

    #[test]
    fn epw_location_parsing() {
        assert_eq!(
            location_from_epw("CAN_ON_Toronto.Pearson.Intl.AP.716240_CWEC2016.epw"),
            "Toronto"
        );
        assert_eq!(location_from_epw("CAN_AB_Calgary.Intl.AP.718770_CWEC2016.epw"), "Calgary");
        assert_eq!(location_from_epw(""), "Unknown");
        assert_eq!(location_from_epw("weather.epw"), "Unknown");
    }
}
