//! Adduct rules: how a neutral mass shifts to the m/z observed for each ion.
//!
//! Tables are written in TOML, one table per polarity, mapping the adduct name
//! to `"offset, factor"`. The factor may be written as a fraction:
//!
//! ```toml
//! [adducts.positive]
//! "M+H" = "1.007276, 1"
//! "M+2H" = "1.007276, 1/2"
//!
//! [adducts.negative]
//! "M-H" = "-1.007276, 1"
//! ```
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AdductConfigError;
use crate::numeric::parse_decimal;
use crate::sample::Polarity;

const PROTON: f64 = 1.007276;

/// A named ion formation rule, `m/z = mass × factor + offset`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdductRule {
    pub name: String,
    pub offset: f64,
    pub factor: f64,
    pub polarity: Polarity,
}

impl AdductRule {
    pub fn new(name: impl Into<String>, offset: f64, factor: f64, polarity: Polarity) -> Self {
        Self {
            name: name.into(),
            offset,
            factor,
            polarity,
        }
    }

    /// The m/z this adduct of `target_mass` is observed at
    pub fn expected_mz(&self, target_mass: f64) -> f64 {
        target_mass * self.factor + self.offset
    }

    /// Whether `observed_mz` lies strictly within `delta` of the expected m/z
    pub fn matches(&self, target_mass: f64, observed_mz: f64, delta: f64) -> bool {
        let expected = self.expected_mz(target_mass);
        expected - delta < observed_mz && observed_mz < expected + delta
    }
}

/// The raw form of an adduct table, as it is written in configuration files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdductTableSpec {
    #[serde(default)]
    pub positive: BTreeMap<String, String>,
    #[serde(default)]
    pub negative: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AdductFile {
    adducts: AdductTableSpec,
}

fn parse_factor(name: &str, text: &str) -> Result<f64, AdductConfigError> {
    let invalid = || AdductConfigError::InvalidNumber {
        name: name.to_string(),
        field: "factor",
        value: text.to_string(),
    };
    match text.split_once('/') {
        Some((num, den)) => {
            let num = parse_decimal(num).map_err(|_| invalid())?;
            let den = parse_decimal(den).map_err(|_| invalid())?;
            if den == 0.0 {
                return Err(AdductConfigError::ZeroDenominator {
                    name: name.to_string(),
                });
            }
            Ok(num / den)
        }
        None => parse_decimal(text).map_err(|_| invalid()),
    }
}

/// Read one `"offset, factor"` rule
pub fn parse_rule(name: &str, value: &str, polarity: Polarity) -> Result<AdductRule, AdductConfigError> {
    let (offset, factor) = value
        .split_once(',')
        .ok_or_else(|| AdductConfigError::MalformedRule {
            name: name.to_string(),
            value: value.to_string(),
        })?;
    if factor.contains(',') {
        return Err(AdductConfigError::MalformedRule {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    let offset = parse_decimal(offset).map_err(|_| AdductConfigError::InvalidNumber {
        name: name.to_string(),
        field: "offset",
        value: offset.trim().to_string(),
    })?;
    let factor = parse_factor(name, factor.trim())?;
    Ok(AdductRule::new(name, offset, factor, polarity))
}

/// Every adduct known to a run, across both polarities
#[derive(Debug, Clone, PartialEq)]
pub struct AdductTable {
    rules: Vec<AdductRule>,
}

impl Default for AdductTable {
    /// Common electrospray adducts
    fn default() -> Self {
        use Polarity::*;
        Self::new(vec![
            AdductRule::new("M+H", PROTON, 1.0, Positive),
            AdductRule::new("M+Na", 22.989218, 1.0, Positive),
            AdductRule::new("M+K", 38.963158, 1.0, Positive),
            AdductRule::new("M+NH4", 18.033823, 1.0, Positive),
            AdductRule::new("M+2H", PROTON, 0.5, Positive),
            AdductRule::new("M-H", -PROTON, 1.0, Negative),
            AdductRule::new("M+Cl", 34.969402, 1.0, Negative),
            AdductRule::new("M+HCOO", 44.998201, 1.0, Negative),
            AdductRule::new("M-2H", -PROTON, 0.5, Negative),
        ])
    }
}

impl AdductTable {
    pub fn new(rules: Vec<AdductRule>) -> Self {
        Self { rules }
    }

    pub fn from_spec(spec: &AdductTableSpec) -> Result<Self, AdductConfigError> {
        let positive = spec
            .positive
            .iter()
            .map(|(name, value)| parse_rule(name, value, Polarity::Positive));
        let negative = spec
            .negative
            .iter()
            .map(|(name, value)| parse_rule(name, value, Polarity::Negative));
        let rules = positive.chain(negative).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Read a TOML document holding an `[adducts]` table
    pub fn from_toml_str(text: &str) -> Result<Self, AdductConfigError> {
        let file: AdductFile =
            toml::from_str(text).map_err(|e| AdductConfigError::Toml(e.to_string()))?;
        Self::from_spec(&file.adducts)
    }

    pub fn rules(&self) -> &[AdductRule] {
        &self.rules
    }

    pub fn for_polarity(&self, polarity: Polarity) -> impl Iterator<Item = &AdductRule> + '_ {
        self.rules.iter().filter(move |r| r.polarity == polarity)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_matching_window() {
        let rule = AdductRule::new("M+H", 1.0073, 1.0, Polarity::Positive);
        assert!(rule.matches(300.0, 301.0073, 0.01));
        assert!(!rule.matches(300.0, 301.02, 0.01));
        // Both edges of the window are open
        assert!(!rule.matches(300.0, 300.9973, 0.01));
        assert!(!rule.matches(300.0, 301.0173, 0.01));
        assert!(rule.matches(300.0, 300.9974, 0.01));
        assert!(rule.matches(300.0, 301.0172, 0.01));

        let doubly = AdductRule::new("M+2H", 1.0073, 0.5, Polarity::Positive);
        assert!((doubly.expected_mz(300.0) - 151.0073).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rules() {
        let rule = parse_rule("M+2H", "1.007276, 1/2", Polarity::Positive).unwrap();
        assert_eq!(rule.factor, 0.5);
        assert_eq!(rule.offset, 1.007276);

        let rule = parse_rule("M-H", " -1.007276 ,1", Polarity::Negative).unwrap();
        assert_eq!(rule.offset, -1.007276);
        assert_eq!(rule.factor, 1.0);

        assert!(matches!(
            parse_rule("M+H", "1.007276", Polarity::Positive),
            Err(AdductConfigError::MalformedRule { .. })
        ));
        assert!(matches!(
            parse_rule("M+H", "1.0, 1/0", Polarity::Positive),
            Err(AdductConfigError::ZeroDenominator { .. })
        ));
        assert!(matches!(
            parse_rule("M+H", "proton, 1", Polarity::Positive),
            Err(AdductConfigError::InvalidNumber { field: "offset", .. })
        ));
    }

    #[test]
    fn test_from_toml() -> Result<(), AdductConfigError> {
        let table = AdductTable::from_toml_str(
            r#"
[adducts.positive]
"M+H" = "1.007276, 1"
"M+2H" = "1.007276, 1/2"

[adducts.negative]
"M-H" = "-1.007276, 1"
"#,
        )?;
        assert_eq!(table.len(), 3);
        assert_eq!(table.for_polarity(Polarity::Positive).count(), 2);
        let negative: Vec<_> = table.for_polarity(Polarity::Negative).collect();
        assert_eq!(negative[0].name, "M-H");

        assert!(matches!(
            AdductTable::from_toml_str("[adducts.positive]\n\"M+H\" = 1.0\n"),
            Err(AdductConfigError::Toml(_))
        ));
        Ok(())
    }

    #[test]
    fn test_default_table() {
        let table = AdductTable::default();
        assert!(table
            .for_polarity(Polarity::Positive)
            .all(|r| r.polarity == Polarity::Positive));
        assert!(table.rules().iter().any(|r| r.name == "M+H"));
        assert!(table.rules().iter().any(|r| r.name == "M-H"));
    }
}
