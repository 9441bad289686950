//! Source of the partition names that actually exist in the store.

use crate::network::{HttpError, JsonClient};
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait PartitionCatalog: Send + Sync {
    /// Every index name and every alias known to the store.
    async fn list_partitions(&self) -> Result<Vec<String>, HttpError>;
}

/// Catalog backed by `GET /_aliases`.
#[derive(Debug, Clone)]
pub struct ElasticCatalog {
    client: JsonClient,
}

impl ElasticCatalog {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl PartitionCatalog for ElasticCatalog {
    async fn list_partitions(&self) -> Result<Vec<String>, HttpError> {
        let response = self.client.get("_aliases").await?;
        partitions_from_aliases(&response)
    }
}

/// Flattens an `_aliases` response (`{index: {aliases: {alias: {}}}}`) into
/// index names followed by their aliases.
pub fn partitions_from_aliases(response: &Value) -> Result<Vec<String>, HttpError> {
    let indices = response
        .as_object()
        .ok_or_else(|| HttpError::Decode("_aliases response is not an object".to_string()))?;

    let mut partitions = Vec::new();
    for (index, entry) in indices {
        partitions.push(index.clone());
        if let Some(aliases) = entry.get("aliases").and_then(Value::as_object) {
            partitions.extend(aliases.keys().cloned());
        }
    }
    Ok(partitions)
}
