//! Dashboards saved as documents in an Elasticsearch index.

use super::{DashboardStore, DashboardSummary, DocKind, SaveReceipt, StoreError};
use crate::consts::dash_consts::{GUEST, MATCH_EVERYTHING};
use crate::network::{HttpError, JsonClient};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct ElasticStore {
    client: JsonClient,
    index: String,
}

impl ElasticStore {
    pub fn new(client: JsonClient, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
        }
    }

    fn type_path(&self, kind: DocKind) -> String {
        format!("{}/{}", self.index, kind)
    }
}

fn ids_query(id: &str) -> Value {
    json!({ "query": { "ids": { "values": [id] } } })
}

fn list_query(query: &str, count: usize) -> Value {
    let query = if query.trim().is_empty() {
        MATCH_EVERYTHING
    } else {
        query
    };
    json!({
        "query": { "query_string": { "query": query } },
        "size": count,
    })
}

/// Source stored for every dashboard: ownership fields plus the document
/// itself as a JSON string.
fn source_body(title: &str, dashboard: &Value) -> Result<Value, StoreError> {
    Ok(json!({
        "user": GUEST,
        "group": GUEST,
        "title": title,
        "dashboard": serde_json::to_string(dashboard)?,
    }))
}

fn hits(response: &Value) -> &[Value] {
    response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn dashboard_from_hits(response: &Value, kind: DocKind, id: &str) -> Result<Value, StoreError> {
    let hit = hits(response).first().ok_or_else(|| StoreError::NotFound {
        kind: kind.to_string(),
        id: id.to_string(),
    })?;
    let encoded = hit
        .pointer("/_source/dashboard")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode(format!("hit '{}' has no dashboard source", id)))?;
    Ok(serde_json::from_str(encoded)?)
}

fn summaries_from_hits(response: &Value) -> Vec<DashboardSummary> {
    hits(response)
        .iter()
        .filter_map(|hit| {
            let id = hit.get("_id")?.as_str()?.to_string();
            let title = hit
                .pointer("/_source/title")
                .and_then(Value::as_str)
                .unwrap_or(&id)
                .to_string();
            Some(DashboardSummary { id, title })
        })
        .collect()
}

#[async_trait::async_trait]
impl DashboardStore for ElasticStore {
    async fn load(&self, kind: DocKind, id: &str) -> Result<Value, StoreError> {
        let endpoint = format!("{}/_search", self.type_path(kind));
        let response = self.client.post(&endpoint, &ids_query(id)).await?;
        dashboard_from_hits(&response, kind, id)
    }

    async fn save(
        &self,
        kind: DocKind,
        title: &str,
        dashboard: &Value,
        ttl: Option<String>,
    ) -> Result<SaveReceipt, StoreError> {
        let body = source_body(title, dashboard)?;
        let response = match kind {
            DocKind::Dashboard => {
                let endpoint = format!(
                    "{}/{}",
                    self.type_path(kind),
                    urlencoding::encode(title)
                );
                self.client.put(&endpoint, &body).await?
            }
            DocKind::Temp => {
                let mut endpoint = self.type_path(kind);
                if let Some(ttl) = ttl {
                    endpoint.push_str(&format!("?ttl={}", urlencoding::encode(&ttl)));
                }
                self.client.post(&endpoint, &body).await?
            }
        };

        let id = response
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Decode("index response has no _id".to_string()))?;
        log::info!("Saved {} '{}' as {}", kind, title, id);
        Ok(SaveReceipt { id, kind })
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let endpoint = format!(
            "{}/{}",
            self.type_path(DocKind::Dashboard),
            urlencoding::encode(id)
        );
        match self.client.delete(&endpoint).await {
            Ok(_) => Ok(()),
            Err(HttpError::Http { status: 404, .. }) => Err(StoreError::NotFound {
                kind: DocKind::Dashboard.to_string(),
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, query: &str, count: usize) -> Result<Vec<DashboardSummary>, StoreError> {
        let endpoint = format!("{}/_search", self.type_path(DocKind::Dashboard));
        let response = self.client.post(&endpoint, &list_query(query, count)).await?;
        Ok(summaries_from_hits(&response))
    }
}
