//! Persistence collaborators for dashboard documents.
//!
//! Documents cross these boundaries as plain JSON; the controller applies the
//! baseline defaults when turning them back into a document.

pub mod elastic;
pub mod files;
pub mod gist;
pub mod local;

pub use elastic::ElasticStore;
pub use files::{DashboardFiles, DirectoryFiles, HttpFiles};
pub use gist::{GistClient, GistService, gist_id, is_gist};
pub use local::{FileStorage, LocalStorage};

use crate::network::HttpError;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Remote store error: {0}")]
    Http(#[from] HttpError),

    #[error("No {kind} document with id '{id}'")]
    NotFound { kind: String, id: String },

    #[error("Malformed document: {0}")]
    Decode(String),

    #[error("Invalid document name: {0}")]
    InvalidName(String),

    #[error("Local storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}

/// Document type inside the dashboards index.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocKind {
    /// Named, permanent dashboards.
    Dashboard,
    /// Anonymous share snapshots, optionally expiring.
    Temp,
}

/// Acknowledgement of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReceipt {
    pub id: String,
    pub kind: DocKind,
}

/// One entry of a dashboard listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub id: String,
    pub title: String,
}

/// Remote home of saved dashboards.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait DashboardStore: Send + Sync {
    /// The stored dashboard JSON for `id`.
    async fn load(&self, kind: DocKind, id: &str) -> Result<Value, StoreError>;

    /// Stores `dashboard` under its title (`Dashboard`) or a store-assigned id
    /// (`Temp`, optionally expiring after `ttl`).
    async fn save(
        &self,
        kind: DocKind,
        title: &str,
        dashboard: &Value,
        ttl: Option<String>,
    ) -> Result<SaveReceipt, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Dashboards matching a query-string `query`, at most `count` of them.
    async fn list(&self, query: &str, count: usize) -> Result<Vec<DashboardSummary>, StoreError>;
}
