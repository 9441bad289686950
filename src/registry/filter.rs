//! Filter records and their combination into one predicate.

use super::{Entity, EntityId, Registry};
use crate::predicate::{BoolPredicate, Predicate};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer, ser};
use serde_json::{Map, Value};

/// Role of a filter in the combined predicate.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Mandate {
    #[default]
    Must,
    MustNot,
    Either,
}

fn default_time_field() -> String {
    "@timestamp".to_string()
}

/// Type tags with a typed representation below. Any other tag loads as
/// [`FilterKind::Other`].
const MODELLED_TYPES: [&str; 6] = ["time", "range", "querystring", "terms", "exists", "missing"];

/// Type tag plus the fields that go with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterKind {
    Time {
        #[serde(default = "default_time_field")]
        field: String,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    Range {
        field: String,
        from: f64,
        to: f64,
    },
    Querystring {
        query: String,
    },
    Terms {
        field: String,
        /// A single term or a list of terms.
        value: Value,
    },
    Exists {
        field: String,
    },
    Missing {
        field: String,
    },
    /// A type this crate cannot translate, kept verbatim.
    #[serde(skip)]
    Other {
        type_name: String,
        fields: Map<String, Value>,
    },
}

impl FilterKind {
    pub fn type_name(&self) -> &str {
        match self {
            FilterKind::Time { .. } => "time",
            FilterKind::Range { .. } => "range",
            FilterKind::Querystring { .. } => "querystring",
            FilterKind::Terms { .. } => "terms",
            FilterKind::Exists { .. } => "exists",
            FilterKind::Missing { .. } => "missing",
            FilterKind::Other { type_name, .. } => type_name.as_str(),
        }
    }

    /// Type-specific fields without the `type` tag.
    fn fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        if let FilterKind::Other { fields, .. } = self {
            return Ok(fields.clone());
        }
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        fields.remove("type");
        Ok(fields)
    }

    pub fn time(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        FilterKind::Time {
            field: default_time_field(),
            from,
            to,
        }
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "FilterRecord")]
pub struct FilterEntity {
    pub id: EntityId,
    pub alias: String,
    pub active: bool,
    pub mandate: Mandate,
    pub kind: FilterKind,
    /// Fields neither the record nor its type knows about.
    pub extra: Map<String, Value>,
}

/// Stored layout of a filter: common fields, the type tag, and everything else.
#[derive(Serialize, Deserialize)]
struct FilterRecord {
    id: EntityId,
    #[serde(default)]
    alias: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    mandate: Mandate,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl TryFrom<FilterRecord> for FilterEntity {
    type Error = serde_json::Error;

    fn try_from(record: FilterRecord) -> Result<Self, Self::Error> {
        let FilterRecord {
            id,
            alias,
            active,
            mandate,
            type_name,
            mut fields,
        } = record;

        let kind = if MODELLED_TYPES.contains(&type_name.as_str()) {
            let mut tagged = fields.clone();
            tagged.insert("type".to_string(), Value::String(type_name));
            let kind: FilterKind = serde_json::from_value(Value::Object(tagged))?;
            let modelled = kind.fields()?;
            fields.retain(|key, _| !modelled.contains_key(key));
            kind
        } else {
            FilterKind::Other {
                type_name,
                fields: std::mem::take(&mut fields),
            }
        };

        Ok(Self {
            id,
            alias,
            active,
            mandate,
            kind,
            extra: fields,
        })
    }
}

impl Serialize for FilterEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut fields = self.extra.clone();
        fields.extend(self.kind.fields().map_err(ser::Error::custom)?);
        FilterRecord {
            id: self.id,
            alias: self.alias.clone(),
            active: self.active,
            mandate: self.mandate,
            type_name: self.kind.type_name().to_string(),
            fields,
        }
        .serialize(serializer)
    }
}

/// Fields of a filter to create or update. `kind` replaces the type and all
/// type-specific fields at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub alias: Option<String>,
    pub active: Option<bool>,
    pub mandate: Option<Mandate>,
    pub kind: Option<FilterKind>,
}

impl FilterPatch {
    pub fn kind(kind: FilterKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_mandate(mut self, mandate: Mandate) -> Self {
        self.mandate = Some(mandate);
        self
    }
}

fn timestamp(instant: &DateTime<Utc>) -> Value {
    Value::String(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl FilterEntity {
    /// Filter clause for this record; `None` while inactive or when the type
    /// has no translation.
    pub fn to_predicate(&self) -> Option<Predicate> {
        if !self.active {
            return None;
        }
        let predicate = match &self.kind {
            FilterKind::Time { field, from, to } => Predicate::Range {
                field: field.clone(),
                from: timestamp(from),
                to: timestamp(to),
            },
            FilterKind::Range { field, from, to } => Predicate::Range {
                field: field.clone(),
                from: Value::from(*from),
                to: Value::from(*to),
            },
            FilterKind::Querystring { query } => {
                Predicate::Query(Box::new(Predicate::query_string(query.clone())))
            }
            FilterKind::Terms { field, value } => Predicate::Terms {
                field: field.clone(),
                values: match value {
                    Value::Array(values) => values.clone(),
                    single => vec![single.clone()],
                },
            },
            FilterKind::Exists { field } => Predicate::Exists {
                field: field.clone(),
            },
            FilterKind::Missing { field } => Predicate::Missing {
                field: field.clone(),
            },
            FilterKind::Other { .. } => return None,
        };
        Some(predicate)
    }
}

impl Entity for FilterEntity {
    type Patch = FilterPatch;

    fn create(id: EntityId, fields: FilterPatch) -> Option<Self> {
        Some(Self {
            id,
            alias: fields.alias.unwrap_or_default(),
            active: true,
            mandate: fields.mandate.unwrap_or_default(),
            kind: fields.kind?,
            extra: Map::new(),
        })
    }

    fn merge(&mut self, fields: FilterPatch) {
        if let Some(alias) = fields.alias {
            self.alias = alias;
        }
        if let Some(active) = fields.active {
            self.active = active;
        }
        if let Some(mandate) = fields.mandate {
            self.mandate = mandate;
        }
        if let Some(kind) = fields.kind {
            self.kind = kind;
        }
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// How `time_range` combines several time filters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RangeMode {
    /// Window every time filter agrees on.
    Min,
    /// Window covering every time filter.
    Max,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Registry<FilterEntity> {
    /// Filter clause for entity `id`.
    pub fn predicate(&self, id: EntityId) -> Option<Predicate> {
        self.get(id).and_then(FilterEntity::to_predicate)
    }

    /// Combines the active filters among `ids`.
    ///
    /// `must` filters conjoin, `mustNot` filters are negated and `either`
    /// filters form one disjunctive group that is itself required. Both the
    /// outer combination and the group start from match-all, so an empty group
    /// excludes nothing.
    pub fn bool_predicate(&self, ids: &[EntityId]) -> Predicate {
        let mut combined = BoolPredicate::match_all();
        let mut either = BoolPredicate::match_all();
        for filter in ids.iter().filter_map(|id| self.get(*id)) {
            let Some(predicate) = filter.to_predicate() else {
                continue;
            };
            match filter.mandate {
                Mandate::MustNot => combined = combined.must_not(predicate),
                Mandate::Either => either = either.should(predicate),
                Mandate::Must => combined = combined.must(predicate),
            }
        }
        Predicate::Bool(combined.must(Predicate::Bool(either)))
    }

    /// [`Self::bool_predicate`] over every filter.
    pub fn combined_predicate(&self) -> Predicate {
        self.bool_predicate(self.ids())
    }

    /// Window derived from the active time filters, `None` if there are none.
    pub fn time_range(&self, mode: RangeMode) -> Option<TimeRange> {
        let bounds: Vec<(DateTime<Utc>, DateTime<Utc>)> = self
            .iter()
            .filter(|f| f.active)
            .filter_map(|f| match f.kind {
                FilterKind::Time { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .collect();

        let froms = bounds.iter().map(|(from, _)| *from);
        let tos = bounds.iter().map(|(_, to)| *to);
        let range = match mode {
            RangeMode::Min => TimeRange {
                from: froms.max()?,
                to: tos.min()?,
            },
            RangeMode::Max => TimeRange {
                from: froms.min()?,
                to: tos.max()?,
            },
        };
        Some(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::str::FromStr;

    fn secs(s: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(s, 0).unwrap()
    }

    fn exists(field: &str, mandate: Mandate) -> FilterPatch {
        FilterPatch::kind(FilterKind::Exists {
            field: field.to_string(),
        })
        .with_mandate(mandate)
    }

    #[test]
    fn test_filter_without_type_is_rejected() {
        let mut filters: Registry<FilterEntity> = Registry::new();
        assert_eq!(filters.set(FilterPatch::default(), None), None);
        assert!(filters.is_empty());
        assert!(filters.free_ids().is_empty());
    }

    #[test]
    // New filters are always active and default to `must`.
    fn test_new_filter_defaults() {
        let mut filters: Registry<FilterEntity> = Registry::new();
        let mut patch = FilterPatch::kind(FilterKind::Exists {
            field: "host".to_string(),
        });
        patch.active = Some(false);
        let id = filters.set(patch, None).unwrap();
        let filter = filters.get(id).unwrap();
        assert!(filter.active);
        assert_eq!(filter.mandate, Mandate::Must);
        assert_eq!(filter.alias, "");
    }

    #[test]
    fn test_time_range_min_and_max() {
        let mut filters: Registry<FilterEntity> = Registry::new();
        assert_eq!(filters.time_range(RangeMode::Min), None);

        filters.set(FilterPatch::kind(FilterKind::time(secs(10), secs(20))), None);
        filters.set(FilterPatch::kind(FilterKind::time(secs(15), secs(25))), None);
        let inactive = filters
            .set(FilterPatch::kind(FilterKind::time(secs(0), secs(100))), None)
            .unwrap();
        filters.set(
            FilterPatch {
                active: Some(false),
                ..FilterPatch::default()
            },
            Some(inactive),
        );

        assert_eq!(
            filters.time_range(RangeMode::Min),
            Some(TimeRange {
                from: secs(15),
                to: secs(20)
            })
        );
        assert_eq!(
            filters.time_range(RangeMode::Max),
            Some(TimeRange {
                from: secs(10),
                to: secs(25)
            })
        );
        assert_eq!(RangeMode::from_str("max").unwrap(), RangeMode::Max);
        assert!(RangeMode::from_str("median").is_err());
    }

    #[test]
    fn test_get_and_remove_by_type() {
        let mut filters: Registry<FilterEntity> = Registry::new();
        let time = filters
            .set(FilterPatch::kind(FilterKind::time(secs(1), secs(2))), None)
            .unwrap();
        let stale = filters
            .set(FilterPatch::kind(FilterKind::time(secs(3), secs(4))), None)
            .unwrap();
        filters.get_mut(stale).unwrap().active = false;
        filters.set(exists("host", Mandate::Must), None);

        assert_eq!(filters.ids_by_type("time", false), vec![time]);
        assert_eq!(filters.ids_by_type("time", true), vec![time, stale]);
        assert_eq!(filters.remove_by_type("time"), vec![time, stale]);
        assert!(filters.get_by_type("time", true).is_empty());
        assert_eq!(filters.len(), 1);
    }

    #[test]
    // must A, mustNot B, either C, either D => A AND NOT B AND (C OR D).
    fn test_bool_predicate_routes_by_mandate() {
        let mut filters: Registry<FilterEntity> = Registry::new();
        filters.set(exists("a", Mandate::Must), None);
        filters.set(exists("b", Mandate::MustNot), None);
        filters.set(exists("c", Mandate::Either), None);
        filters.set(exists("d", Mandate::Either), None);

        let field = |name: &str| Predicate::Exists {
            field: name.to_string(),
        };
        let expected = Predicate::Bool(BoolPredicate {
            must: vec![
                Predicate::MatchAll,
                field("a"),
                Predicate::Bool(BoolPredicate {
                    must: vec![Predicate::MatchAll],
                    must_not: vec![],
                    should: vec![field("c"), field("d")],
                }),
            ],
            must_not: vec![field("b")],
            should: vec![],
        });
        assert_eq!(filters.combined_predicate(), expected);
    }

    #[test]
    // Without `either` filters the disjunctive group is a bare match-all.
    fn test_empty_either_group_excludes_nothing() {
        let mut filters: Registry<FilterEntity> = Registry::new();
        filters.set(exists("a", Mandate::Must), None);
        filters.set(exists("b", Mandate::MustNot), None);
        let inactive = filters.set(exists("z", Mandate::Either), None).unwrap();
        filters.get_mut(inactive).unwrap().active = false;

        let Predicate::Bool(outer) = filters.combined_predicate() else {
            panic!("expected a bool predicate");
        };
        assert_eq!(
            outer.must.last(),
            Some(&Predicate::Bool(BoolPredicate::match_all()))
        );
        assert_eq!(outer.must_not.len(), 1);
    }

    #[test]
    fn test_translation_per_type() {
        let mut filters: Registry<FilterEntity> = Registry::new();
        let terms = filters
            .set(
                FilterPatch::kind(FilterKind::Terms {
                    field: "status".to_string(),
                    value: json!(404),
                }),
                None,
            )
            .unwrap();
        let query = filters
            .set(
                FilterPatch::kind(FilterKind::Querystring {
                    query: "error".to_string(),
                }),
                None,
            )
            .unwrap();
        let time = filters
            .set(FilterPatch::kind(FilterKind::time(secs(0), secs(60))), None)
            .unwrap();

        assert_eq!(
            filters.predicate(terms).unwrap().to_json(),
            json!({ "terms": { "status": [404] } })
        );
        assert_eq!(
            filters.predicate(query).unwrap().to_json(),
            json!({ "fquery": { "query": { "query_string": { "query": "error" } }, "_cache": true } })
        );
        assert_eq!(
            filters.predicate(time).unwrap().to_json(),
            json!({ "range": { "@timestamp": {
                "from": "1970-01-01T00:00:00.000Z",
                "to": "1970-01-01T00:01:00.000Z"
            } } })
        );

        filters.get_mut(time).unwrap().active = false;
        assert_eq!(filters.predicate(time), None);
    }

    #[test]
    fn test_filter_document_layout() {
        let filter: FilterEntity = serde_json::from_value(json!({
            "id": 3,
            "type": "time",
            "field": "@timestamp",
            "from": "2023-01-01T00:00:00Z",
            "to": "2023-01-02T00:00:00Z",
            "mandate": "mustNot",
            "alias": ""
        }))
        .unwrap();
        assert_eq!(filter.mandate, Mandate::MustNot);
        assert!(filter.active);
        assert_eq!(filter.type_name(), "time");

        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value["type"], json!("time"));
        assert_eq!(value["mandate"], json!("mustNot"));
    }
}
