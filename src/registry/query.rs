//! Query records.

use super::{Entity, EntityId, Registry};
use crate::consts::dash_consts::{MATCH_EVERYTHING, QUERY_COLORS};
use crate::predicate::Predicate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Query type tag. Tags other than `lucene` and `regex` are kept as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QueryKind {
    #[default]
    Lucene,
    Regex,
    Other(String),
}

impl QueryKind {
    pub fn as_str(&self) -> &str {
        match self {
            QueryKind::Lucene => "lucene",
            QueryKind::Regex => "regex",
            QueryKind::Other(name) => name.as_str(),
        }
    }
}

impl From<String> for QueryKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "lucene" => QueryKind::Lucene,
            "regex" => QueryKind::Regex,
            _ => QueryKind::Other(name),
        }
    }
}

impl From<QueryKind> for String {
    fn from(kind: QueryKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEntity {
    pub id: EntityId,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub pin: bool,
    #[serde(rename = "type", default)]
    pub kind: QueryKind,
    /// Fields panels attach that the registry does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fields of a query to create or update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPatch {
    pub query: Option<String>,
    pub alias: Option<String>,
    pub color: Option<String>,
    pub pin: Option<bool>,
    pub kind: Option<QueryKind>,
}

impl QueryPatch {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }
}

/// Palette color for query `id`.
pub fn color_at(id: EntityId) -> &'static str {
    QUERY_COLORS[id as usize % QUERY_COLORS.len()]
}

impl QueryEntity {
    /// Query clause for this record, whatever its type. Empty text matches
    /// everything.
    pub fn to_predicate(&self) -> Predicate {
        if self.query.is_empty() {
            Predicate::query_string(MATCH_EVERYTHING)
        } else {
            Predicate::query_string(self.query.clone())
        }
    }
}

impl Entity for QueryEntity {
    type Patch = QueryPatch;

    fn create(id: EntityId, fields: QueryPatch) -> Option<Self> {
        Some(Self {
            id,
            query: fields
                .query
                .unwrap_or_else(|| MATCH_EVERYTHING.to_string()),
            alias: fields.alias.unwrap_or_default(),
            color: fields.color.unwrap_or_else(|| color_at(id).to_string()),
            pin: fields.pin.unwrap_or(false),
            kind: fields.kind.unwrap_or_default(),
            extra: Map::new(),
        })
    }

    fn merge(&mut self, fields: QueryPatch) {
        if let Some(query) = fields.query {
            self.query = query;
        }
        if let Some(alias) = fields.alias {
            self.alias = alias;
        }
        if let Some(color) = fields.color {
            self.color = color;
        }
        if let Some(pin) = fields.pin {
            self.pin = pin;
        }
        if let Some(kind) = fields.kind {
            self.kind = kind;
        }
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn type_name(&self) -> &str {
        self.kind.as_str()
    }

    fn seed() -> Option<QueryPatch> {
        Some(QueryPatch::default())
    }
}

impl Registry<QueryEntity> {
    /// Query clause for entity `id`.
    pub fn predicate(&self, id: EntityId) -> Option<Predicate> {
        self.get(id).map(QueryEntity::to_predicate)
    }

    /// First query whose text is exactly `query`.
    pub fn find_query(&self, query: &str) -> Option<&QueryEntity> {
        self.iter().find(|q| q.query == query)
    }
}
