use super::elements;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static FORMULA_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z][a-z]?)(\d*)").expect("Invalid formula token regex"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("Composition is empty (total atom count is zero)")]
    Empty,
    #[error("Element '{0}' has a count of zero")]
    ZeroCount(String),
    #[error("Unknown element symbol: '{0}'")]
    UnknownElement(String),
    #[error("Malformed formula '{formula}': {reason}")]
    MalformedFormula { formula: String, reason: String },
    #[error("Atom count overflows at element '{0}'")]
    CountOverflow(String),
}

/// An order-irrelevant multiset of element symbols describing a molecule's atoms.
///
/// Backed by a `BTreeMap` so that iteration, formula rendering, and serialization are
/// deterministic. Every count is at least one and the map is never empty; both are
/// checked at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct Composition {
    counts: BTreeMap<String, u32>,
}

impl Composition {
    /// Builds a composition from `(symbol, count)` pairs.
    ///
    /// Repeated symbols accumulate. Symbols must be valid element symbols and counts
    /// must be at least one.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError`] for an empty input, a zero count, an unknown symbol,
    /// or a total atom count that does not fit in a `u32`.
    pub fn new<I, S>(entries: I) -> Result<Self, CompositionError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        let mut total: u32 = 0;
        for (symbol, count) in entries {
            let symbol = symbol.into();
            if !elements::is_known_symbol(&symbol) {
                return Err(CompositionError::UnknownElement(symbol));
            }
            if count == 0 {
                return Err(CompositionError::ZeroCount(symbol));
            }
            total = match total.checked_add(count) {
                Some(total) => total,
                None => return Err(CompositionError::CountOverflow(symbol)),
            };
            // Bounded by `total`, which did not overflow.
            *counts.entry(symbol).or_insert(0) += count;
        }
        if counts.is_empty() {
            return Err(CompositionError::Empty);
        }
        Ok(Self { counts })
    }

    /// Parses a Hill-style formula such as `C7H5N3O6` or `H2O`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::MalformedFormula`] when the string contains anything
    /// other than element/count runs, and the errors of [`Composition::new`] otherwise.
    pub fn from_formula(formula: &str) -> Result<Self, CompositionError> {
        let trimmed = formula.trim();
        if trimmed.is_empty() {
            return Err(CompositionError::Empty);
        }

        let mut consumed = 0;
        let mut entries = Vec::new();
        for cap in FORMULA_TOKEN.captures_iter(trimmed) {
            let whole = cap.get(0).map(|m| m.range()).unwrap_or(0..0);
            if whole.start != consumed {
                return Err(CompositionError::MalformedFormula {
                    formula: trimmed.to_string(),
                    reason: format!("unexpected character at position {consumed}"),
                });
            }
            consumed = whole.end;

            let symbol = cap[1].to_string();
            let count = match &cap[2] {
                "" => 1,
                digits => digits
                    .parse::<u32>()
                    .map_err(|e| CompositionError::MalformedFormula {
                        formula: trimmed.to_string(),
                        reason: format!("invalid count '{digits}': {e}"),
                    })?,
            };
            entries.push((symbol, count));
        }

        if consumed != trimmed.len() {
            return Err(CompositionError::MalformedFormula {
                formula: trimmed.to_string(),
                reason: format!("unexpected character at position {consumed}"),
            });
        }

        Self::new(entries)
    }

    /// Total atom count `N`. Construction guarantees the sum fits in a `u32`.
    pub fn total_atoms(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn unique_elements(&self) -> usize {
        self.counts.len()
    }

    /// Count of a given element, zero when absent.
    pub fn count(&self, symbol: &str) -> u32 {
        self.counts.get(symbol).copied().unwrap_or(0)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.counts.contains_key(symbol)
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(s, c)| (s.as_str(), *c))
    }

    /// Number of atoms whose element is a metal.
    pub fn metal_atom_count(&self) -> u32 {
        self.iter()
            .filter(|(symbol, _)| elements::is_metal(symbol))
            .map(|(_, count)| count)
            .sum()
    }

    /// Distinct metal symbols present, in sorted order.
    pub fn metals(&self) -> Vec<&str> {
        self.elements().filter(|s| elements::is_metal(s)).collect()
    }

    /// Formula string: symbols in sorted order, count suffix omitted when 1.
    pub fn formula(&self) -> String {
        self.counts
            .iter()
            .map(|(symbol, &count)| {
                if count == 1 {
                    symbol.clone()
                } else {
                    format!("{symbol}{count}")
                }
            })
            .collect()
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formula())
    }
}

impl FromStr for Composition {
    type Err = CompositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_formula(s)
    }
}

impl TryFrom<BTreeMap<String, u32>> for Composition {
    type Error = CompositionError;

    fn try_from(map: BTreeMap<String, u32>) -> Result<Self, Self::Error> {
        Self::new(map)
    }
}

impl From<Composition> for BTreeMap<String, u32> {
    fn from(composition: Composition) -> Self {
        composition.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_sorts_symbols_and_omits_unit_counts() {
        let water = Composition::new([("O", 1), ("H", 2)]).unwrap();
        assert_eq!(water.formula(), "H2O");

        let tnt = Composition::new([("N", 3), ("C", 7), ("O", 6), ("H", 5)]).unwrap();
        assert_eq!(tnt.formula(), "C7H5N3O6");
    }

    #[test]
    fn derived_counts_are_computed_from_the_multiset() {
        let ferrocene = Composition::new([("C", 10), ("H", 10), ("Fe", 1)]).unwrap();
        assert_eq!(ferrocene.total_atoms(), 21);
        assert_eq!(ferrocene.unique_elements(), 3);
        assert_eq!(ferrocene.metal_atom_count(), 1);
        assert_eq!(ferrocene.metals(), vec!["Fe"]);
        assert_eq!(ferrocene.count("C"), 10);
        assert_eq!(ferrocene.count("N"), 0);
    }

    #[test]
    fn new_rejects_empty_zero_and_unknown_entries() {
        let empty: Vec<(&str, u32)> = Vec::new();
        assert_eq!(Composition::new(empty), Err(CompositionError::Empty));
        assert_eq!(
            Composition::new([("H", 0)]),
            Err(CompositionError::ZeroCount("H".to_string()))
        );
        assert_eq!(
            Composition::new([("Xx", 1)]),
            Err(CompositionError::UnknownElement("Xx".to_string()))
        );
    }

    #[test]
    fn counts_whose_total_overflows_are_rejected() {
        assert_eq!(
            Composition::from_formula("H4000000000H4000000000"),
            Err(CompositionError::CountOverflow("H".to_string()))
        );
        assert_eq!(
            Composition::from_formula("C4000000000H4000000000"),
            Err(CompositionError::CountOverflow("H".to_string()))
        );
        assert_eq!(
            Composition::new([("H", u32::MAX), ("H", 1)]),
            Err(CompositionError::CountOverflow("H".to_string()))
        );

        let largest = Composition::new([("C", u32::MAX - 1), ("H", 1)]).unwrap();
        assert_eq!(largest.total_atoms(), u32::MAX);
    }

    #[test]
    fn new_accumulates_repeated_symbols() {
        let c = Composition::new([("H", 1), ("H", 1), ("O", 1)]).unwrap();
        assert_eq!(c.count("H"), 2);
    }

    #[test]
    fn from_formula_parses_counts_and_two_letter_symbols() {
        let c = Composition::from_formula("C10H10Fe").unwrap();
        assert_eq!(c.count("C"), 10);
        assert_eq!(c.count("H"), 10);
        assert_eq!(c.count("Fe"), 1);

        let nacl = Composition::from_formula("Na28Cl28").unwrap();
        assert_eq!(nacl.total_atoms(), 56);
    }

    #[test]
    fn from_formula_rejects_malformed_input() {
        assert_eq!(Composition::from_formula("  "), Err(CompositionError::Empty));
        assert!(matches!(
            Composition::from_formula("h2o"),
            Err(CompositionError::MalformedFormula { .. })
        ));
        assert!(matches!(
            Composition::from_formula("H2-O"),
            Err(CompositionError::MalformedFormula { .. })
        ));
        assert!(matches!(
            Composition::from_formula("H0"),
            Err(CompositionError::ZeroCount(_))
        ));
    }

    #[test]
    fn serde_uses_a_plain_symbol_map_and_validates_on_load() {
        let c = Composition::from_formula("CH4").unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"{"C":1,"H":4}"#);

        let back: Composition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);

        let invalid: Result<Composition, _> = serde_json::from_str(r#"{"H":0}"#);
        assert!(invalid.is_err());
    }
}
