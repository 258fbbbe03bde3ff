use crate::config::defaults::DefaultsConfig;
use crate::error::Result;
use mesoatlas::engine::catalog::DISCOVERIES_DIR;
use mesoatlas::engine::validation::{CompoundRecord, LookupCache, LookupResponse};
use reqwest::StatusCode;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Compounds kept from one database answer.
const MAX_RECORDS: usize = 5;
const CACHE_DIR: &str = "chemical_cache";

/// Where the lookup cache of an output root lives.
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(DISCOVERIES_DIR).join(CACHE_DIR)
}

/// Formula search against the PubChem REST interface.
pub struct CompoundClient {
    client: reqwest::Client,
    base_url: String,
}

impl CompoundClient {
    pub fn new() -> Result<Self> {
        let defaults = DefaultsConfig::default();
        Self::with_base_url(
            defaults.lookup_base_url,
            Duration::from_secs(defaults.lookup_timeout_secs),
        )
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Queries by formula. Transport errors and unexpected statuses become
    /// [`LookupResponse::Error`] so the caller can decide whether to proceed.
    pub async fn lookup(&self, formula: &str) -> LookupResponse {
        let url = format!("{}/compound/formula/{}/JSON", self.base_url, formula);
        debug!(%url, "Querying compound database");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return LookupResponse::Error(e.to_string()),
        };

        match response.status() {
            StatusCode::OK => match response.json::<Value>().await {
                Ok(body) => LookupResponse::Found(parse_compounds(&body)),
                Err(e) => LookupResponse::Error(format!("malformed response: {e}")),
            },
            StatusCode::NOT_FOUND => LookupResponse::NotFound,
            status => LookupResponse::Error(format!("database returned {status}")),
        }
    }
}

/// Answers from the cache, falling back to the network unless `client` is `None`.
/// Definitive answers are written back into the cache.
pub async fn resolve(
    cache: &mut LookupCache,
    client: Option<&CompoundClient>,
    formula: &str,
) -> LookupResponse {
    if let Some(cached) = cache.get(formula) {
        debug!(formula, "Lookup cache hit");
        return cached;
    }
    let Some(client) = client else {
        return LookupResponse::Error("offline and not cached".to_string());
    };
    let response = client.lookup(formula).await;
    if let LookupResponse::Error(reason) = &response {
        warn!(formula, %reason, "Compound lookup failed");
    }
    cache.insert(formula, &response);
    response
}

/// Extracts up to five compounds from a `PC_Compounds` document.
pub fn parse_compounds(body: &Value) -> Vec<CompoundRecord> {
    let Some(compounds) = body.get("PC_Compounds").and_then(Value::as_array) else {
        return Vec::new();
    };
    compounds
        .iter()
        .take(MAX_RECORDS)
        .map(parse_compound)
        .collect()
}

fn parse_compound(compound: &Value) -> CompoundRecord {
    let cid = compound
        .pointer("/id/id/cid")
        .and_then(Value::as_u64);

    let mut record = CompoundRecord {
        formula: String::new(),
        name: String::new(),
        cid,
        molecular_weight: None,
        smiles: None,
        inchi: None,
    };
    let mut preferred_name = None;

    let props = compound
        .get("props")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for prop in props {
        let label = prop.pointer("/urn/label").and_then(Value::as_str);
        let kind = prop.pointer("/urn/name").and_then(Value::as_str);
        let sval = prop.pointer("/value/sval").and_then(Value::as_str);
        match label {
            Some("Molecular Formula") => {
                if let Some(s) = sval {
                    record.formula = s.to_string();
                }
            }
            Some("IUPAC Name") => {
                if kind == Some("Preferred") {
                    preferred_name = sval.map(str::to_string);
                } else if record.name.is_empty() {
                    if let Some(s) = sval {
                        record.name = s.to_string();
                    }
                }
            }
            Some("Molecular Weight") => {
                record.molecular_weight = prop
                    .pointer("/value/fval")
                    .and_then(Value::as_f64)
                    .or_else(|| sval.and_then(|s| s.parse().ok()));
            }
            Some("SMILES") => record.smiles = sval.map(str::to_string),
            Some("InChI") => record.inchi = sval.map(str::to_string),
            _ => {}
        }
    }

    if let Some(name) = preferred_name {
        record.name = name;
    }
    if record.name.is_empty() {
        record.name = match cid {
            Some(cid) => format!("CID_{cid}"),
            None => "unnamed".to_string(),
        };
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prop(label: &str, name: Option<&str>, value: Value) -> Value {
        let mut urn = json!({ "label": label });
        if let Some(name) = name {
            urn["name"] = json!(name);
        }
        json!({ "urn": urn, "value": value })
    }

    #[test]
    fn compounds_are_parsed_with_preferred_names() {
        let body = json!({
            "PC_Compounds": [{
                "id": { "id": { "cid": 962 } },
                "props": [
                    prop("IUPAC Name", Some("Systematic"), json!({ "sval": "oxidane" })),
                    prop("IUPAC Name", Some("Preferred"), json!({ "sval": "water" })),
                    prop("Molecular Formula", None, json!({ "sval": "H2O" })),
                    prop("Molecular Weight", None, json!({ "sval": "18.015" })),
                    prop("SMILES", Some("Absolute"), json!({ "sval": "O" })),
                    prop("InChI", Some("Standard"), json!({ "sval": "InChI=1S/H2O/h1H2" })),
                ]
            }]
        });

        let records = parse_compounds(&body);
        assert_eq!(records.len(), 1);
        let water = &records[0];
        assert_eq!(water.cid, Some(962));
        assert_eq!(water.name, "water");
        assert_eq!(water.formula, "H2O");
        assert_eq!(water.molecular_weight, Some(18.015));
        assert_eq!(water.smiles.as_deref(), Some("O"));
        assert_eq!(water.inchi.as_deref(), Some("InChI=1S/H2O/h1H2"));
    }

    #[test]
    fn nameless_compounds_fall_back_to_their_cid_and_the_list_is_capped() {
        let compound = json!({
            "id": { "id": { "cid": 7 } },
            "props": [prop("Molecular Weight", None, json!({ "fval": 44.01 }))]
        });
        let body = json!({ "PC_Compounds": vec![compound; 8] });

        let records = parse_compounds(&body);
        assert_eq!(records.len(), MAX_RECORDS);
        assert_eq!(records[0].name, "CID_7");
        assert_eq!(records[0].molecular_weight, Some(44.01));
    }

    #[test]
    fn documents_without_compounds_yield_nothing() {
        assert!(parse_compounds(&json!({ "Fault": {} })).is_empty());
    }

    #[tokio::test]
    async fn offline_resolution_uses_the_cache_only() {
        let mut cache = LookupCache::in_memory();
        assert!(matches!(
            resolve(&mut cache, None, "H2O").await,
            LookupResponse::Error(_)
        ));

        cache.insert("H2O", &LookupResponse::NotFound);
        assert_eq!(resolve(&mut cache, None, "H2O").await, LookupResponse::NotFound);
    }
}
