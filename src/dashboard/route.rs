//! Where a dashboard comes from on navigation.

use crate::consts::dash_consts::DEFAULT_DASHBOARD_FILE;
use crate::store::{
    DashboardFiles, DashboardStore, DocKind, GistService, LocalStorage, StoreError,
};
use serde_json::Value;
use std::sync::Arc;

/// Route parameters of a navigation. Both must be present to name a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    pub kind: Option<String>,
    pub id: Option<String>,
}

impl Navigation {
    pub fn to(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            id: Some(id.into()),
        }
    }

    /// Navigation without route parameters.
    pub fn home() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadSource {
    /// Saved document in the remote store.
    Store { kind: DocKind, id: String },
    /// Named static document.
    File(String),
    /// Document already read from local storage.
    Local(Value),
}

impl LoadSource {
    pub fn default_file() -> Self {
        LoadSource::File(DEFAULT_DASHBOARD_FILE.to_string())
    }
}

/// The collaborators dashboards are loaded from and saved to.
#[derive(Clone)]
pub struct DashboardSources {
    pub store: Arc<dyn DashboardStore>,
    pub files: Arc<dyn DashboardFiles>,
    pub local: Arc<dyn LocalStorage>,
    pub gist: Arc<dyn GistService>,
}

impl DashboardSources {
    /// Picks the source for `navigation`.
    ///
    /// Explicit route parameters win; otherwise a non-empty local storage slot
    /// is used, and the default static document is the last resort.
    pub fn select(&self, navigation: &Navigation) -> LoadSource {
        if let (Some(kind), Some(id)) = (&navigation.kind, &navigation.id) {
            return match kind.as_str() {
                "elasticsearch" => LoadSource::Store {
                    kind: DocKind::Dashboard,
                    id: id.clone(),
                },
                "temp" => LoadSource::Store {
                    kind: DocKind::Temp,
                    id: id.clone(),
                },
                "file" => LoadSource::File(id.clone()),
                other => {
                    log::debug!("unknown dashboard type '{}', using default", other);
                    LoadSource::default_file()
                }
            };
        }

        self.stored_default().unwrap_or_else(LoadSource::default_file)
    }

    fn stored_default(&self) -> Option<LoadSource> {
        if !self.local.is_available() {
            return None;
        }
        let contents = match self.local.read() {
            Ok(contents) => contents?,
            Err(e) => {
                log::warn!("Failed to read local dashboard: {}", e);
                return None;
            }
        };
        if contents.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&contents) {
            Ok(document) => Some(LoadSource::Local(document)),
            Err(e) => {
                log::warn!("Ignoring unreadable local dashboard: {}", e);
                None
            }
        }
    }

    /// Retrieves the raw document behind `source`.
    pub async fn fetch(&self, source: &LoadSource) -> Result<Value, StoreError> {
        match source {
            LoadSource::Store { kind, id } => self.store.load(*kind, id).await,
            LoadSource::File(name) => self.files.fetch(name).await,
            LoadSource::Local(document) => Ok(document.clone()),
        }
    }
}
