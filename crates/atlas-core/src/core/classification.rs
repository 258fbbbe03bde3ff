//! Rule-based molecular classification.
//!
//! Each rule is an independent predicate over a [`Composition`]; every matching rule
//! contributes one [`Classification`]. Rules are evaluated in a fixed priority order
//! (organometallic, perfluorinated, semiconductor, superalloy, super acid, super base,
//! explosive) and the result is stably sorted by bonus, so the priority order only
//! breaks ties.

use crate::core::models::composition::Composition;
use crate::core::models::elements;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLabel {
    Organometallic,
    Perfluorinated,
    Semiconductor,
    MetallicSuperalloy,
    OrganicSuperAcid,
    OrganicSuperBase,
    Explosive,
}

impl ClassLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassLabel::Organometallic => "organometallic",
            ClassLabel::Perfluorinated => "perfluorinated",
            ClassLabel::Semiconductor => "semiconductor",
            ClassLabel::MetallicSuperalloy => "metallic_superalloy",
            ClassLabel::OrganicSuperAcid => "organic_super_acid",
            ClassLabel::OrganicSuperBase => "organic_super_base",
            ClassLabel::Explosive => "explosive",
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One matched rule. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: ClassLabel,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Additive scoring bonus, never negative.
    pub bonus: f64,
    pub reason: String,
}

type Rule = fn(&Composition) -> Option<Classification>;

const RULES: [Rule; 7] = [
    detect_organometallic,
    detect_perfluorinated,
    detect_semiconductor,
    detect_superalloy,
    detect_super_acid,
    detect_super_base,
    detect_explosive,
];

/// Stateless classifier. Holds no configuration; exists so that the scorer can take it
/// as an explicit dependency.
#[derive(Debug, Default, Clone, Copy)]
pub struct Classifier;

impl Classifier {
    pub fn new() -> Self {
        Self
    }

    /// Classifies a composition, returning matches sorted by bonus (descending).
    pub fn classify(&self, composition: &Composition) -> Vec<Classification> {
        let mut classifications: Vec<Classification> =
            RULES.iter().filter_map(|rule| rule(composition)).collect();
        // `sort_by` is stable, so equal bonuses keep rule priority order.
        classifications.sort_by(|a, b| b.bonus.total_cmp(&a.bonus));
        classifications
    }

    /// Labels only, in the same order as [`Classifier::classify`].
    pub fn labels(&self, composition: &Composition) -> Vec<ClassLabel> {
        self.classify(composition)
            .into_iter()
            .map(|c| c.label)
            .collect()
    }
}

fn joined(symbols: &[&str]) -> String {
    symbols.join(", ")
}

fn detect_organometallic(c: &Composition) -> Option<Classification> {
    let metals = c.metals();
    if c.contains("C") && !metals.is_empty() {
        return Some(Classification {
            label: ClassLabel::Organometallic,
            confidence: 1.0,
            bonus: 1.0,
            reason: format!("Contains C + metals ({})", joined(&metals)),
        });
    }
    None
}

fn detect_perfluorinated(c: &Composition) -> Option<Classification> {
    let fluorine = c.count("F");
    if fluorine >= 6 {
        return Some(Classification {
            label: ClassLabel::Perfluorinated,
            confidence: 1.0,
            bonus: 0.8,
            reason: format!("Contains {fluorine} fluorine atoms"),
        });
    }
    None
}

fn detect_semiconductor(c: &Composition) -> Option<Classification> {
    let present: Vec<&str> = c
        .elements()
        .filter(|s| elements::is_semiconductor_element(s))
        .collect();

    let compound = (c.contains("Ga") && c.contains("As"))
        || (c.contains("In") && c.contains("P"))
        || (c.contains("Cd") && c.contains("Te"));
    if compound {
        return Some(Classification {
            label: ClassLabel::Semiconductor,
            confidence: 1.0,
            bonus: 0.7,
            reason: format!("Compound semiconductor ({})", joined(&present)),
        });
    }

    if c.contains("Si") || c.contains("Ge") {
        return Some(Classification {
            label: ClassLabel::Semiconductor,
            confidence: 0.9,
            bonus: 0.7,
            reason: format!("Elemental semiconductor ({})", joined(&present)),
        });
    }
    None
}

fn detect_superalloy(c: &Composition) -> Option<Classification> {
    let metals = c.metals();
    let superalloy: Vec<&str> = metals
        .iter()
        .copied()
        .filter(|s| elements::is_superalloy_metal(s))
        .collect();

    if metals.len() >= 3 && superalloy.len() >= 2 {
        return Some(Classification {
            label: ClassLabel::MetallicSuperalloy,
            confidence: 0.8,
            bonus: 0.6,
            reason: format!("Multi-metal alloy ({})", joined(&superalloy)),
        });
    }
    None
}

fn detect_super_acid(c: &Composition) -> Option<Classification> {
    let acid: Vec<&str> = c
        .elements()
        .filter(|s| elements::is_acid_element(s))
        .collect();

    let organic = c.contains("C") && c.contains("H");
    let strong = c.contains("F") || c.contains("S");
    if organic && !acid.is_empty() && strong {
        return Some(Classification {
            label: ClassLabel::OrganicSuperAcid,
            confidence: 0.7,
            bonus: 0.5,
            reason: format!("Organic + acid elements ({})", joined(&acid)),
        });
    }
    None
}

fn detect_super_base(c: &Composition) -> Option<Classification> {
    let nitrogen = c.count("N");
    let has_metal = c.metal_atom_count() > 0;

    if c.contains("C") && nitrogen > 0 && (nitrogen >= 2 || has_metal) {
        let suffix = if has_metal { ", metal" } else { "" };
        return Some(Classification {
            label: ClassLabel::OrganicSuperBase,
            confidence: 0.7,
            bonus: 0.5,
            reason: format!("Organic + N (count={nitrogen}){suffix}"),
        });
    }
    None
}

fn detect_explosive(c: &Composition) -> Option<Classification> {
    let nitrogen = c.count("N");
    let oxygen = c.count("O");

    if nitrogen >= 3 && oxygen >= 3 {
        let ratio = f64::from(nitrogen) / f64::from(oxygen.max(1));
        if (0.3..=1.5).contains(&ratio) {
            return Some(Classification {
                label: ClassLabel::Explosive,
                confidence: 0.6,
                bonus: 0.3,
                reason: format!("High N+O content (N={nitrogen}, O={oxygen})"),
            });
        }
    }

    if c.contains("Cl") && oxygen >= 4 {
        return Some(Classification {
            label: ClassLabel::Explosive,
            confidence: 0.5,
            bonus: 0.3,
            reason: format!("Perchlorate pattern (Cl + O={oxygen})"),
        });
    }
    None
}
