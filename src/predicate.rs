//! Search predicates produced from queries and filters.
//!
//! Each variant maps onto one Elasticsearch filter clause. The registries only
//! decide which records feed in and how they combine; rendering to JSON
//! happens here.

use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    MatchAll,
    QueryString {
        query: String,
    },
    /// Query wrapped for use in filter context, cached.
    Query(Box<Predicate>),
    Range {
        field: String,
        from: Value,
        to: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Exists {
        field: String,
    },
    Missing {
        field: String,
    },
    Bool(BoolPredicate),
}

/// Boolean combination. Every `must` holds, no `must_not` holds, and when
/// `should` is non-empty at least one of it holds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoolPredicate {
    pub must: Vec<Predicate>,
    pub must_not: Vec<Predicate>,
    pub should: Vec<Predicate>,
}

impl BoolPredicate {
    /// A combination that starts out matching everything.
    pub fn match_all() -> Self {
        Self {
            must: vec![Predicate::MatchAll],
            ..Self::default()
        }
    }

    pub fn must(mut self, predicate: Predicate) -> Self {
        self.must.push(predicate);
        self
    }

    pub fn must_not(mut self, predicate: Predicate) -> Self {
        self.must_not.push(predicate);
        self
    }

    pub fn should(mut self, predicate: Predicate) -> Self {
        self.should.push(predicate);
        self
    }
}

impl Predicate {
    pub fn query_string(query: impl Into<String>) -> Self {
        Predicate::QueryString {
            query: query.into(),
        }
    }

    /// Renders the predicate as Elasticsearch filter DSL.
    pub fn to_json(&self) -> Value {
        match self {
            Predicate::MatchAll => json!({ "match_all": {} }),
            Predicate::QueryString { query } => json!({ "query_string": { "query": query } }),
            Predicate::Query(inner) => json!({
                "fquery": { "query": inner.to_json(), "_cache": true }
            }),
            Predicate::Range { field, from, to } => {
                let mut bounds = Map::new();
                bounds.insert(field.clone(), json!({ "from": from, "to": to }));
                json!({ "range": bounds })
            }
            Predicate::Terms { field, values } => {
                let mut terms = Map::new();
                terms.insert(field.clone(), Value::Array(values.clone()));
                json!({ "terms": terms })
            }
            Predicate::Exists { field } => json!({ "exists": { "field": field } }),
            Predicate::Missing { field } => json!({ "missing": { "field": field } }),
            Predicate::Bool(combined) => {
                let mut clauses = Map::new();
                for (key, list) in [
                    ("must", &combined.must),
                    ("must_not", &combined.must_not),
                    ("should", &combined.should),
                ] {
                    if !list.is_empty() {
                        clauses.insert(
                            key.to_string(),
                            Value::Array(list.iter().map(Predicate::to_json).collect()),
                        );
                    }
                }
                json!({ "bool": clauses })
            }
        }
    }
}
