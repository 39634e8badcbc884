//! Serialization boundary for state documents.
//!
//! Documents are stored as ordered key/value lists rather than JSON objects:
//!   {"proposals": [{"key": "Osmosis", "value": 812}]}
//!   {"proposals": [{"key": "Osmosis", "value": [{"key": "812", "value": true}]}]}
//! In memory the same data is a plain two-level map (see [`AlertedMap`]).

use super::{AlertedMap, StateError, Watermarks};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WatermarkEntry {
    key: String,
    value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct InnerEntry {
    key: String,
    value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OuterEntry {
    key: String,
    #[serde(default)]
    value: Vec<InnerEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WatermarkDocument {
    #[serde(default)]
    proposals: Vec<WatermarkEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AlertedDocument {
    #[serde(default)]
    proposals: Vec<OuterEntry>,
}

pub fn encode_watermarks(watermarks: &Watermarks) -> Result<String, StateError> {
    let doc = WatermarkDocument {
        proposals: watermarks
            .iter()
            .map(|(key, value)| WatermarkEntry {
                key: key.clone(),
                value: *value,
            })
            .collect(),
    };
    Ok(serde_json::to_string(&doc)?)
}

/// Duplicate keys keep the highest value, so a hand-edited document can
/// never move a watermark backwards.
pub fn decode_watermarks(json: &str) -> Result<Watermarks, StateError> {
    let doc: WatermarkDocument = serde_json::from_str(json)?;
    let mut watermarks = Watermarks::new();
    for entry in doc.proposals {
        let slot = watermarks.entry(entry.key).or_insert(0);
        *slot = (*slot).max(entry.value);
    }
    Ok(watermarks)
}

pub fn encode_alerted(alerted: &AlertedMap) -> Result<String, StateError> {
    let doc = AlertedDocument {
        proposals: alerted
            .iter()
            .map(|(chain, ids)| OuterEntry {
                key: chain.clone(),
                value: ids
                    .iter()
                    .map(|id| InnerEntry {
                        key: id.to_string(),
                        value: true,
                    })
                    .collect(),
            })
            .collect(),
    };
    Ok(serde_json::to_string(&doc)?)
}

/// `false` entries and non-numeric ids are dropped.
pub fn decode_alerted(json: &str) -> Result<AlertedMap, StateError> {
    let doc: AlertedDocument = serde_json::from_str(json)?;
    let mut alerted = AlertedMap::new();
    for outer in doc.proposals {
        let ids: &mut BTreeSet<u64> = alerted.entry(outer.key.clone()).or_default();
        for inner in outer.value.into_iter().filter(|e| e.value) {
            match inner.key.parse::<u64>() {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => {
                    warn!(chain = %outer.key, id = %inner.key, "dropping non-numeric alerted id");
                }
            }
        }
    }
    Ok(alerted)
}
