//! Free-text skill labels to canonical ability codes.
//!
//! Normalization never fails: blank or placeholder text becomes `MIXED`,
//! unknown text is kept (upper-cased) so equal unknowns still share a bucket.

use crate::domain::model::AbilityCode;

/// Canonical codes, lowest level first.
pub const CANONICAL_CODES: &[&str] = &["FT", "BZ1", "BZ2", "NZ", "IZ", "IZ1", "IZ2", "AZ"];

/// Values meaning "no level recorded".
pub const UNCLASSIFIED_TOKENS: &[&str] = &["", "UNKNOWN", "N/A", "NA", "NONE", "?", "-"];

/// Historical spellings seen in roster exports, keyed in folded (upper-case, single-spaced) form.
pub const ABILITY_ALIASES: &[(&str, &str)] = &[
    ("FIRST TIME", "FT"),
    ("FIRST TIMER", "FT"),
    ("FIRST-TIMER", "FT"),
    ("FIRSTTIMER", "FT"),
    ("NEVER EVER", "FT"),
    ("B1", "BZ1"),
    ("BZ 1", "BZ1"),
    ("BEGINNER 1", "BZ1"),
    ("BEGINNER1", "BZ1"),
    ("BEGINNER ZONE 1", "BZ1"),
    ("B2", "BZ2"),
    ("BZ 2", "BZ2"),
    ("BEGINNER 2", "BZ2"),
    ("BEGINNER2", "BZ2"),
    ("BEGINNER ZONE 2", "BZ2"),
    ("NOVICE", "NZ"),
    ("NOVICE ZONE", "NZ"),
    ("INTERMEDIATE", "IZ"),
    ("INT", "IZ"),
    ("I1", "IZ1"),
    ("IZ 1", "IZ1"),
    ("INTERMEDIATE 1", "IZ1"),
    ("BLUE INTERMEDIATE", "IZ1"),
    ("I2", "IZ2"),
    ("IZ 2", "IZ2"),
    ("INTERMEDIATE 2", "IZ2"),
    ("RED INTERMEDIATE", "IZ2"),
    ("ADVANCED", "AZ"),
    ("ADV", "AZ"),
];

fn fold(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub fn normalize(raw: &str) -> AbilityCode {
    let folded = fold(raw);

    if UNCLASSIFIED_TOKENS.contains(&folded.as_str()) {
        return AbilityCode::mixed();
    }

    if CANONICAL_CODES.contains(&folded.as_str()) {
        return AbilityCode::from_normalized(folded);
    }

    match ABILITY_ALIASES.iter().find(|(alias, _)| *alias == folded) {
        Some((_, code)) => AbilityCode::from_normalized((*code).to_string()),
        None => {
            tracing::debug!("Unmapped ability label kept as-is: {}", folded);
            AbilityCode::from_normalized(folded)
        }
    }
}

/// Ability from a product description such as `"Ride Tribe - FT"`.
///
/// The text after the last `-` is tried as a whole first (so `"... - Beginner 1"`
/// still maps), then its trailing whitespace token.
pub fn from_product_description(description: &str) -> AbilityCode {
    let trimmed = description.trim();
    let segment = trimmed.rsplit('-').next().unwrap_or(trimmed).trim();

    let whole = normalize(segment);
    if whole.is_canonical() || whole.is_mixed() {
        return whole;
    }

    let token = segment.split_whitespace().last().unwrap_or(segment);
    normalize(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_aliases_map_to_canonical_codes() {
        assert_eq!(normalize("first timer").as_str(), "FT");
        assert_eq!(normalize("  Beginner   1 ").as_str(), "BZ1");
        assert_eq!(normalize("b2").as_str(), "BZ2");
        assert_eq!(normalize("Red Intermediate").as_str(), "IZ2");
    }

    #[test]
    fn test_canonical_code_returned_unchanged() {
        for code in CANONICAL_CODES {
            assert_eq!(normalize(code).as_str(), *code);
            assert_eq!(normalize(&code.to_lowercase()).as_str(), *code);
        }
    }

    #[test]
    fn test_placeholders_become_mixed() {
        for raw in ["", "   ", "unknown", "N/A", "none"] {
            assert!(normalize(raw).is_mixed(), "{:?} should be MIXED", raw);
        }
    }

    #[test]
    fn test_unknown_label_is_preserved_upper_cased() {
        assert_eq!(normalize("park crew").as_str(), "PARK CREW");
        assert!(!normalize("park crew").is_canonical());
    }

    #[test]
    fn test_product_description_extraction() {
        assert_eq!(from_product_description("Ride Tribe - FT").as_str(), "FT");
        assert_eq!(from_product_description("Ride Tribe - Beginner 1").as_str(), "BZ1");
        assert_eq!(from_product_description("Snow Squad 6wk IZ1").as_str(), "IZ1");
        assert!(from_product_description("").is_mixed());
        assert!(from_product_description("Ride Tribe -").is_mixed());
    }

    fn raw_label() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-zA-Z0-9 /?-]{0,16}",
            proptest::sample::select(ABILITY_ALIASES.iter().map(|(a, _)| a.to_lowercase()).collect::<Vec<_>>()),
        ]
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(raw in raw_label()) {
            let once = normalize(&raw);
            let twice = normalize(once.as_str());
            prop_assert_eq!(once, twice);
        }
    }
}
