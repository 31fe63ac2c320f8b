//! Declarative band-name dispatch
//!
//! Every raster band name resolves to exactly one [`BandIdentity`] through an
//! ordered table of name patterns. Names that match nothing, or more than one
//! pattern, are rejected instead of being guessed.

use crate::types::{BandIdentity, CoregError, CoregResult, View};
use regex::{Captures, Regex};

/// How a matched pattern turns into a band identity
#[derive(Debug, Clone, Copy)]
enum IdentityRule {
    /// SLSTR channel from capture `ch` plus `offset`, view from capture `view`
    Slstr { offset: u8 },
    /// OLCI band number from capture `ch`
    Olci,
}

#[derive(Debug, Clone)]
struct BandPattern {
    pattern: Regex,
    rule: IdentityRule,
}

impl BandPattern {
    fn identity(&self, caps: &Captures<'_>) -> Option<BandIdentity> {
        let number: u8 = caps.name("ch")?.as_str().parse().ok()?;
        match self.rule {
            IdentityRule::Slstr { offset } => {
                let view = match caps.name("view")?.as_str() {
                    "n" => View::Nadir,
                    "o" => View::Oblique,
                    _ => return None,
                };
                Some(BandIdentity::Slstr {
                    channel: number + offset,
                    view,
                })
            }
            IdentityRule::Olci => {
                if (1..=21).contains(&number) {
                    Some(BandIdentity::Olci { band: number })
                } else {
                    None
                }
            }
        }
    }
}

/// Band-name pattern table
#[derive(Debug, Clone)]
pub struct BandTable {
    patterns: Vec<BandPattern>,
}

/// Band names the standard table must resolve
pub const EXPECTED_BANDS: &[&str] = &[
    "S1_radiance_an",
    "S3_radiance_ao",
    "S5_radiance_bn",
    "S6_exception_bo",
    "S7_BT_in",
    "S9_BT_io",
    "F1_BT_fn",
    "F2_BT_io",
    "Oa01_radiance",
    "Oa17_radiance",
    "Oa21_radiance",
];

impl BandTable {
    /// Sentinel-3 OLCI and SLSTR L1 band naming
    pub fn standard() -> CoregResult<Self> {
        let table = Self::from_patterns(&[
            (r"^S(?P<ch>[1-6])_(?:radiance|exception)_[abc](?P<view>[no])$", IdentityRule::Slstr { offset: 0 }),
            (r"^S(?P<ch>[7-9])_(?:BT|exception)_i(?P<view>[no])$", IdentityRule::Slstr { offset: 0 }),
            (r"^F(?P<ch>[12])_(?:BT|exception)_[if](?P<view>[no])$", IdentityRule::Slstr { offset: 9 }),
            (r"^Oa(?P<ch>\d{2})_radiance$", IdentityRule::Olci),
        ])?;
        table.check_coverage(EXPECTED_BANDS)?;
        Ok(table)
    }

    fn from_patterns(entries: &[(&str, IdentityRule)]) -> CoregResult<Self> {
        let patterns = entries
            .iter()
            .map(|(pattern, rule)| {
                Regex::new(pattern)
                    .map(|pattern| BandPattern { pattern, rule: *rule })
                    .map_err(|e| CoregError::Config(format!("Regex error: {}", e)))
            })
            .collect::<CoregResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Resolve one band name
    pub fn identify(&self, band_name: &str) -> CoregResult<BandIdentity> {
        let mut matches = self
            .patterns
            .iter()
            .filter_map(|p| p.pattern.captures(band_name).and_then(|caps| p.identity(&caps)));

        match (matches.next(), matches.next()) {
            (Some(identity), None) => Ok(identity),
            (Some(_), Some(_)) => Err(CoregError::UnknownBand(format!(
                "{} matches more than one band pattern",
                band_name
            ))),
            (None, _) => Err(CoregError::UnknownBand(band_name.to_string())),
        }
    }

    /// Fail unless every name in `expected` resolves
    pub fn check_coverage(&self, expected: &[&str]) -> CoregResult<()> {
        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|name| self.identify(name).is_err())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoregError::UnknownBand(format!(
                "band table does not cover: {}",
                missing.join(", ")
            )))
        }
    }

    /// Resolve all product band names up front, reporting every unmatched one
    pub fn identify_all<'a>(&self, band_names: &[&'a str]) -> CoregResult<Vec<(&'a str, BandIdentity)>> {
        let mut resolved = Vec::with_capacity(band_names.len());
        let mut unknown = Vec::new();

        for &name in band_names {
            match self.identify(name) {
                Ok(identity) => resolved.push((name, identity)),
                Err(_) => unknown.push(name),
            }
        }

        if !unknown.is_empty() {
            return Err(CoregError::UnknownBand(unknown.join(", ")));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_identifies_bands() {
        let table = BandTable::standard().unwrap();
        assert_eq!(
            table.identify("S3_radiance_an").unwrap(),
            BandIdentity::Slstr { channel: 3, view: View::Nadir }
        );
        assert_eq!(
            table.identify("S8_BT_io").unwrap(),
            BandIdentity::Slstr { channel: 8, view: View::Oblique }
        );
        assert_eq!(
            table.identify("F1_BT_fn").unwrap(),
            BandIdentity::Slstr { channel: 10, view: View::Nadir }
        );
        assert_eq!(table.identify("Oa17_radiance").unwrap(), BandIdentity::Olci { band: 17 });
    }

    #[test]
    fn test_unmatched_names_fail() {
        let table = BandTable::standard().unwrap();
        assert!(matches!(table.identify("Oa22_radiance"), Err(CoregError::UnknownBand(_))));
        assert!(matches!(table.identify("S3_radiance"), Err(CoregError::UnknownBand(_))));
        assert!(matches!(table.identify("latitude_an"), Err(CoregError::UnknownBand(_))));
    }

    #[test]
    fn test_identify_all_reports_every_unknown() {
        let table = BandTable::standard().unwrap();
        match table.identify_all(&["S1_radiance_an", "foo", "Oa02_radiance", "bar"]) {
            Err(CoregError::UnknownBand(msg)) => assert_eq!(msg, "foo, bar"),
            other => panic!("expected UnknownBand, got {:?}", other),
        }
        let resolved = table.identify_all(&["S1_radiance_an", "Oa02_radiance"]).unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_overlapping_patterns_are_ambiguous() {
        let table = BandTable::from_patterns(&[
            (r"^S(?P<ch>\d)_radiance_a(?P<view>[no])$", IdentityRule::Slstr { offset: 0 }),
            (r"^S(?P<ch>\d)_radiance_[ab](?P<view>[no])$", IdentityRule::Slstr { offset: 0 }),
        ])
        .unwrap();
        assert!(table.identify("S1_radiance_bn").is_ok());
        assert!(matches!(table.identify("S1_radiance_an"), Err(CoregError::UnknownBand(_))));
    }

    #[test]
    fn test_coverage_check_lists_missing() {
        let table = BandTable::from_patterns(&[(r"^Oa(?P<ch>\d{2})_radiance$", IdentityRule::Olci)]).unwrap();
        match table.check_coverage(&["Oa01_radiance", "S1_radiance_an"]) {
            Err(CoregError::UnknownBand(msg)) => assert!(msg.contains("S1_radiance_an")),
            other => panic!("expected coverage failure, got {:?}", other),
        }
    }
}
