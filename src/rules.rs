use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::FeatureStore;

/// A value excluded from a column. Untagged so rule documents read naturally:
/// `{"column": "COMID", "values": [904140243, 904140248]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Int(i64),
    Str(String),
}

/// Excluded values for one attribute column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub column: String,
    pub values: Vec<RuleValue>,
}

/// Externally supplied drop-list predicate. Study-specific exclusions
/// (Great Lakes COMIDs, swamp/marsh waterbodies) arrive as a JSON document
/// alongside the data, not as constants in code.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExclusionRules {
    pub exclude: Vec<ColumnRule>,
}

impl ExclusionRules {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading exclusion rules {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing exclusion rules {}", path.display()))
    }

    /// True when the feature matches any rule (and should be dropped).
    /// Rules naming columns the store does not have match nothing.
    pub fn matches(&self, store: &FeatureStore, idx: usize) -> bool {
        self.exclude.iter().any(|rule| {
            let Some(value) = store.attr(idx, &rule.column) else { return false };
            rule.values.iter().any(|excluded| match excluded {
                RuleValue::Int(n) => value.as_i64() == Some(*n),
                RuleValue::Str(s) => value.as_str() == Some(s),
            })
        })
    }

    /// New store without the excluded features.
    pub fn apply(&self, store: &FeatureStore) -> FeatureStore {
        if self.exclude.is_empty() {
            return store.clone();
        }
        let features = store
            .features()
            .iter()
            .enumerate()
            .filter(|(idx, _)| !self.matches(store, *idx))
            .map(|(_, f)| f.clone())
            .collect();
        let filtered =
            FeatureStore::from_parts(store.schema().clone(), store.epsg(), features);
        let dropped = store.len() - filtered.len();
        if dropped > 0 {
            log::info!("exclusion rules dropped {dropped} features");
        }
        filtered
    }
}
