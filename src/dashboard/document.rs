//! The dashboard configuration document.

use crate::consts::dash_consts::DEFAULT_PARTITION;
use crate::index::Interval;
use crate::registry::{FilterEntity, QueryEntity, Registry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

fn default_editable() -> bool {
    true
}

fn default_partition() -> String {
    DEFAULT_PARTITION.to_string()
}

/// How the dashboard maps time windows onto partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub interval: Interval,
    #[serde(default = "default_partition")]
    pub pattern: String,
    /// Partition used whenever no time-sliced one applies.
    #[serde(default = "default_partition")]
    pub default: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            interval: Interval::None,
            pattern: default_partition(),
            default: default_partition(),
        }
    }
}

/// Registry slices owned by the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Services {
    #[serde(default)]
    pub query: Registry<QueryEntity>,
    #[serde(default)]
    pub filter: Registry<FilterEntity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardDocument {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_editable")]
    pub editable: bool,
    /// Panel layout, opaque to this crate.
    #[serde(default)]
    pub rows: Vec<Value>,
    #[serde(default)]
    pub services: Services,
    #[serde(default)]
    pub index: IndexSettings,
    /// Unknown top-level fields, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for DashboardDocument {
    fn default() -> Self {
        Self {
            title: String::new(),
            editable: true,
            rows: Vec::new(),
            services: Services::default(),
            index: IndexSettings::default(),
            extra: Map::new(),
        }
    }
}

/// Top-level defaults every loaded document is completed with.
pub fn baseline() -> Value {
    json!({
        "title": "",
        "editable": true,
        "rows": [],
        "services": {},
        "index": {
            "interval": "none",
            "pattern": DEFAULT_PARTITION,
            "default": DEFAULT_PARTITION,
        },
    })
}

/// Fills the top-level keys `document` lacks from `defaults`. Keys already
/// present are kept whole, nested objects are not merged.
pub fn with_defaults(document: Value, defaults: &Value) -> Value {
    match (document, defaults) {
        (Value::Object(mut fields), Value::Object(defaults)) => {
            for (key, value) in defaults {
                if !fields.contains_key(key) {
                    fields.insert(key.clone(), value.clone());
                }
            }
            Value::Object(fields)
        }
        (document, _) => document,
    }
}

impl DashboardDocument {
    /// Parses `value` after completing it with the [`baseline`] defaults.
    pub fn from_value_with_defaults(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(with_defaults(value, &baseline()))
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
