//! Locale resolution: BCP-47 language priority lists to language refsets.
//!
//! A caller expresses its dialect preference as an HTTP-style language
//! priority list (`"en-GB,en;q=0.9"`). Resolution filters a built-in
//! mapping of BCP-47 tags to language reference sets, restricted to the
//! refsets actually installed in the store, per RFC 4647 basic filtering.
//!
//! A private-use escape selects a refset directly by concept id:
//! `"en-x-999001261000000100"` resolves to that refset iff it is installed.

use std::collections::BTreeSet;

use snomed_types::{partition_kind, verhoeff_valid, well_known, ComponentKind, SctId};

use crate::error::StoreResult;
use crate::store::Store;

/// NHS realm language refset (UK clinical terms) - 999001261000000100.
const UK_CLINICAL: SctId = 999001261000000100;
/// Danish language refset - 554461000005103.
const DANISH: SctId = 554461000005103;
/// Swedish language refset - 46011000052107.
const SWEDISH: SctId = 46011000052107;
/// Dutch (Netherlands) language refset - 31000146106.
const DUTCH: SctId = 31000146106;
/// Spanish language refset - 448879004.
const SPANISH: SctId = 448879004;

/// Built-in BCP-47 tag to language-refset mapping, best match first.
const DEFAULT_MAPPINGS: &[(&str, &[SctId])] = &[
    ("en-gb", &[well_known::GB_ENGLISH, UK_CLINICAL]),
    ("en-us", &[well_known::US_ENGLISH]),
    ("en", &[well_known::US_ENGLISH, well_known::GB_ENGLISH]),
    ("da-dk", &[DANISH]),
    ("da", &[DANISH]),
    ("sv-se", &[SWEDISH]),
    ("sv", &[SWEDISH]),
    ("nl-nl", &[DUTCH]),
    ("nl", &[DUTCH]),
    ("es", &[SPANISH]),
];

/// Maps language priority lists to ordered language-refset identifiers.
///
/// Built once from the store's installed refsets; rebuild after
/// re-ingestion since the installed set may change.
#[derive(Debug, Clone)]
pub struct LanguageMatcher {
    /// `(lowercase tag, installed refsets)` in table order.
    entries: Vec<(&'static str, Vec<SctId>)>,
    installed: BTreeSet<SctId>,
}

impl LanguageMatcher {
    /// Builds a matcher over the given installed refsets.
    pub fn new(installed: BTreeSet<SctId>) -> Self {
        let entries = DEFAULT_MAPPINGS
            .iter()
            .map(|(tag, refsets)| {
                let available: Vec<SctId> = refsets
                    .iter()
                    .copied()
                    .filter(|id| installed.contains(id))
                    .collect();
                (*tag, available)
            })
            .filter(|(_, refsets)| !refsets.is_empty())
            .collect();
        LanguageMatcher { entries, installed }
    }

    /// Resolves a BCP-47 language priority list to an ordered list of
    /// language-refset identifiers.
    ///
    /// Unparseable headers resolve to the empty list; they are never an
    /// error.
    pub fn match_locales(&self, priority_list: &str) -> Vec<SctId> {
        let priority_list = priority_list.trim();
        if priority_list.is_empty() {
            return Vec::new();
        }

        if let Some(refset_id) = private_use_refset(priority_list) {
            return if self.installed.contains(&refset_id) {
                vec![refset_id]
            } else {
                Vec::new()
            };
        }

        let mut out: Vec<SctId> = Vec::new();
        let mut push_all = |refsets: &[SctId], out: &mut Vec<SctId>| {
            for refset in refsets {
                if !out.contains(refset) {
                    out.push(*refset);
                }
            }
        };
        for range in parse_priority_list(priority_list) {
            // An exact tag match outranks prefix matches, so a bare "en"
            // takes the "en" entry's own ordering first.
            for (tag, refsets) in &self.entries {
                if *tag == range {
                    push_all(refsets, &mut out);
                }
            }
            for (tag, refsets) in &self.entries {
                if *tag != range && range_matches(&range, tag) {
                    push_all(refsets, &mut out);
                }
            }
        }
        out
    }
}

impl Store {
    /// Builds a [`LanguageMatcher`] over this store's installed refsets.
    pub fn language_matcher(&self) -> StoreResult<LanguageMatcher> {
        Ok(LanguageMatcher::new(self.installed_refsets()?))
    }
}

/// Extracts a refset id from a `*-x-<digits>` private-use tag, when the
/// digits form a valid concept identifier.
fn private_use_refset(priority_list: &str) -> Option<SctId> {
    let first = priority_list.split(',').next()?.split(';').next()?.trim();
    let (_, private) = first.split_once("-x-").or_else(|| first.split_once("-X-"))?;
    let id: SctId = private.parse().ok()?;
    if verhoeff_valid(id) && partition_kind(id) == Some(ComponentKind::Concept) {
        Some(id)
    } else {
        None
    }
}

/// Parses a language priority list into lowercase ranges, best first.
///
/// Each item is `range[;q=weight]`; items with a weight of zero, an
/// unparseable weight, or a syntactically empty range are dropped.
fn parse_priority_list(priority_list: &str) -> Vec<String> {
    let mut ranges: Vec<(f32, usize, String)> = Vec::new();
    for (position, item) in priority_list.split(',').enumerate() {
        let mut parts = item.split(';');
        let range = match parts.next() {
            Some(r) => r.trim().to_ascii_lowercase(),
            None => continue,
        };
        if range.is_empty() {
            continue;
        }
        let mut quality = 1.0f32;
        for param in parts {
            if let Some(value) = param.trim().strip_prefix("q=") {
                quality = value.parse().unwrap_or(0.0);
            }
        }
        if quality > 0.0 {
            ranges.push((quality, position, range));
        }
    }
    // Stable order: quality descending, original position ascending.
    ranges.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));
    ranges.into_iter().map(|(_, _, range)| range).collect()
}

/// RFC 4647 basic filtering: a range matches a tag when it equals the tag
/// or is a prefix of it at a subtag boundary. `*` matches everything.
fn range_matches(range: &str, tag: &str) -> bool {
    range == "*"
        || range == tag
        || (tag.len() > range.len() && tag.starts_with(range) && tag.as_bytes()[range.len()] == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(installed: &[SctId]) -> LanguageMatcher {
        LanguageMatcher::new(installed.iter().copied().collect())
    }

    #[test]
    fn test_exact_dialect_match() {
        let m = matcher(&[well_known::GB_ENGLISH, well_known::US_ENGLISH]);
        assert_eq!(m.match_locales("en-GB"), vec![well_known::GB_ENGLISH]);
        assert_eq!(m.match_locales("en-US"), vec![well_known::US_ENGLISH]);
    }

    #[test]
    fn test_priority_order_respected() {
        let m = matcher(&[well_known::GB_ENGLISH, well_known::US_ENGLISH]);
        let resolved = m.match_locales("en-GB,en;q=0.9");
        assert_eq!(resolved[0], well_known::GB_ENGLISH);
        assert!(resolved.contains(&well_known::US_ENGLISH));
    }

    #[test]
    fn test_quality_weights_reorder() {
        let m = matcher(&[well_known::GB_ENGLISH, well_known::US_ENGLISH]);
        let resolved = m.match_locales("en-US;q=0.5,en-GB");
        assert_eq!(resolved, vec![well_known::GB_ENGLISH, well_known::US_ENGLISH]);
    }

    #[test]
    fn test_bare_language_matches_dialects() {
        let m = matcher(&[well_known::GB_ENGLISH, well_known::US_ENGLISH]);
        let resolved = m.match_locales("en");
        // The exact "en" entry wins first and lists US before GB.
        assert_eq!(resolved[0], well_known::US_ENGLISH);
        assert!(resolved.contains(&well_known::GB_ENGLISH));
    }

    #[test]
    fn test_uninstalled_refsets_filtered() {
        let m = matcher(&[well_known::US_ENGLISH]);
        assert_eq!(m.match_locales("en-GB"), Vec::<SctId>::new());
        assert_eq!(m.match_locales("en"), vec![well_known::US_ENGLISH]);
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let m = matcher(&[DANISH]);
        assert_eq!(m.match_locales("*"), vec![DANISH]);
    }

    #[test]
    fn test_private_use_escape_installed() {
        let m = matcher(&[UK_CLINICAL]);
        assert_eq!(m.match_locales("en-x-999001261000000100"), vec![UK_CLINICAL]);
    }

    #[test]
    fn test_private_use_escape_not_installed() {
        let m = matcher(&[well_known::GB_ENGLISH]);
        assert_eq!(
            m.match_locales("en-x-999001261000000100"),
            Vec::<SctId>::new()
        );
    }

    #[test]
    fn test_private_use_escape_invalid_check_digit() {
        let m = matcher(&[well_known::GB_ENGLISH, well_known::US_ENGLISH]);
        // Digits fail Verhoeff validation, so the escape is ignored and the
        // list parses as ordinary ranges.
        assert_eq!(
            m.match_locales("en-x-999001261000000101,en-US"),
            vec![well_known::US_ENGLISH]
        );
    }

    #[test]
    fn test_unparseable_header_is_empty() {
        let m = matcher(&[well_known::GB_ENGLISH]);
        assert_eq!(m.match_locales(""), Vec::<SctId>::new());
        assert_eq!(m.match_locales(";;;"), Vec::<SctId>::new());
        assert_eq!(m.match_locales("zz-ZZ"), Vec::<SctId>::new());
    }

    #[test]
    fn test_zero_quality_dropped() {
        let m = matcher(&[well_known::GB_ENGLISH, well_known::US_ENGLISH]);
        assert_eq!(m.match_locales("en-GB;q=0,en-US"), vec![well_known::US_ENGLISH]);
    }
}
