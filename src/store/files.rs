//! Static dashboard documents, served over HTTP or read from a directory.

use super::StoreError;
use crate::network::{HttpError, JsonClient};
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use std::path::PathBuf;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait DashboardFiles: Send + Sync {
    /// The static document called `name`, e.g. `default.json`.
    async fn fetch(&self, name: &str) -> Result<Value, StoreError>;
}

/// Rejects names that would escape the dashboards location.
fn checked_name(name: &str) -> Result<&str, StoreError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Reads `<base>/dashboards/<name>`.
#[derive(Debug, Clone)]
pub struct HttpFiles {
    client: JsonClient,
}

impl HttpFiles {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl DashboardFiles for HttpFiles {
    async fn fetch(&self, name: &str) -> Result<Value, StoreError> {
        let name = checked_name(name)?;
        let endpoint = format!("dashboards/{}", urlencoding::encode(name));
        match self.client.get(&endpoint).await {
            Ok(value) => Ok(value),
            Err(HttpError::Http { status: 404, .. }) => Err(StoreError::NotFound {
                kind: "file".to_string(),
                id: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads `<dir>/<name>` from the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryFiles {
    dir: PathBuf,
}

impl DirectoryFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl DashboardFiles for DirectoryFiles {
    async fn fetch(&self, name: &str) -> Result<Value, StoreError> {
        let name = checked_name(name)?;
        let path = self.dir.join(name);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    kind: "file".to_string(),
                    id: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&contents)?)
    }
}
