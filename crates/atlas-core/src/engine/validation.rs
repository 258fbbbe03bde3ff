//! Validation of simulated molecules against an external compound database.
//!
//! The network client lives outside this crate; here we only consume the shape of
//! its answers ([`LookupResponse`]), cache them per formula, and turn them into a
//! [`ValidationResult`].

use super::storage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CACHE_FILE: &str = "molecule_cache.json";
pub const SUMMARY_MATCHES: usize = 3;
/// Confidence of a database match when the simulation disagrees about stability.
const CONTRADICTED_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundRecord {
    pub formula: String,
    pub name: String,
    #[serde(default)]
    pub cid: Option<u64>,
    #[serde(default)]
    pub molecular_weight: Option<f64>,
    #[serde(default)]
    pub smiles: Option<String>,
    #[serde(default)]
    pub inchi: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupResponse {
    Found(Vec<CompoundRecord>),
    NotFound,
    /// Transport failure or unexpected status; never cached.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum CachedLookup {
    Found { records: Vec<CompoundRecord> },
    NotFound,
}

#[derive(Debug, Default)]
pub struct LookupCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CachedLookup>,
    dirty: bool,
}

impl LookupCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads `dir/molecule_cache.json`; a missing file yields an empty cache bound to
    /// that path.
    pub fn load(dir: &Path) -> io::Result<Self> {
        let path = dir.join(CACHE_FILE);
        let entries = storage::read_json(&path)?.unwrap_or_default();
        let cache = Self {
            path: Some(path),
            entries,
            dirty: false,
        };
        debug!(entries = cache.len(), "Loaded lookup cache");
        Ok(cache)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, formula: &str) -> Option<LookupResponse> {
        self.entries.get(formula).map(|entry| match entry {
            CachedLookup::Found { records } => LookupResponse::Found(records.clone()),
            CachedLookup::NotFound => LookupResponse::NotFound,
        })
    }

    /// Stores a definitive answer. Returns `false` for errors, which are not cached.
    pub fn insert(&mut self, formula: &str, response: &LookupResponse) -> bool {
        let entry = match response {
            LookupResponse::Found(records) => CachedLookup::Found {
                records: records.clone(),
            },
            LookupResponse::NotFound => CachedLookup::NotFound,
            LookupResponse::Error(_) => return false,
        };
        self.entries.insert(formula.to_string(), entry);
        self.dirty = true;
        true
    }

    /// Writes the cache if it changed since the last load or flush. Returns whether a
    /// write happened.
    pub fn flush(&mut self) -> io::Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        if !self.dirty {
            return Ok(false);
        }
        storage::write_json_atomic(path, &self.entries)?;
        self.dirty = false;
        info!(entries = self.entries.len(), path = %path.display(), "Flushed lookup cache");
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Known,
    Novel,
    Unknown,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationStatus::Known => "known",
            ValidationStatus::Novel => "novel",
            ValidationStatus::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub is_known: bool,
    pub is_novel: bool,
    pub confidence: f64,
    pub matches: Vec<CompoundRecord>,
    pub notes: String,
}

impl ValidationResult {
    pub fn unknown(notes: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Unknown,
            is_known: false,
            is_novel: false,
            confidence: 0.0,
            matches: Vec::new(),
            notes: notes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub name: String,
    pub cid: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub status: ValidationStatus,
    pub is_known: bool,
    pub is_novel: bool,
    pub confidence: f64,
    pub database_matches: Vec<MatchSummary>,
}

impl From<&ValidationResult> for ValidationSummary {
    fn from(result: &ValidationResult) -> Self {
        Self {
            status: result.status,
            is_known: result.is_known,
            is_novel: result.is_novel,
            confidence: result.confidence,
            database_matches: result
                .matches
                .iter()
                .take(SUMMARY_MATCHES)
                .map(|m| MatchSummary {
                    name: m.name.clone(),
                    cid: m.cid,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, formula: &str, stable: bool, response: &LookupResponse) -> ValidationResult {
        match response {
            LookupResponse::Found(matches) if !matches.is_empty() => {
                let best = &matches[0].name;
                let (confidence, notes) = if stable {
                    (1.0, format!("Matches known molecule: {best}"))
                } else {
                    (
                        CONTRADICTED_CONFIDENCE,
                        format!("Simulation predicts unstable, but {best} is a known compound"),
                    )
                };
                ValidationResult {
                    status: ValidationStatus::Known,
                    is_known: true,
                    is_novel: false,
                    confidence,
                    matches: matches.clone(),
                    notes,
                }
            }
            LookupResponse::Found(_) | LookupResponse::NotFound => {
                let notes = if stable {
                    format!("No database match for {formula}: potentially novel stable molecule")
                } else {
                    format!("No database match for {formula}, and unstable in simulation")
                };
                ValidationResult {
                    status: ValidationStatus::Novel,
                    is_known: false,
                    is_novel: true,
                    confidence: 0.0,
                    matches: Vec::new(),
                    notes,
                }
            }
            LookupResponse::Error(message) => {
                ValidationResult::unknown(format!("Lookup failed for {formula}: {message}"))
            }
        }
    }

    /// Validates using only the cache; a miss is reported as an unknown status.
    pub fn validate_cached(&self, cache: &LookupCache, formula: &str, stable: bool) -> ValidationResult {
        let response = cache
            .get(formula)
            .unwrap_or_else(|| LookupResponse::Error("not in local cache".to_string()));
        self.validate(formula, stable, &response)
    }
}
