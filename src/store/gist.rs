//! Dashboards shared as GitHub gists.

use super::StoreError;
use crate::consts::dash_consts::network::GIST_FILE_NAME;
use crate::network::JsonClient;
#[cfg(test)]
use mockall::automock;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

static GIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^\d{5,}$)|(^[a-z0-9]{10,}$)|(gist.github.com(/*.*)/[a-z0-9]{5,}/*$)")
        .expect("valid gist regex")
});

/// Whether `text` looks like a gist id or gist URL.
pub fn is_gist(text: &str) -> bool {
    !text.is_empty() && GIST_RE.is_match(text)
}

/// The gist id inside `text`: the last path segment of a gist URL, or the
/// text itself when it is a bare id.
pub fn gist_id(text: &str) -> Option<String> {
    if !is_gist(text) {
        return None;
    }
    let matched = GIST_RE.find(text)?.as_str().trim_end_matches('/');
    let id = matched.rsplit('/').next().unwrap_or(matched);
    Some(id.to_string())
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait GistService: Send + Sync {
    /// Publishes `dashboard` as a private gist and returns its page URL.
    async fn save(&self, title: &str, dashboard: &Value) -> Result<String, StoreError>;

    /// Every file of gist `id` whose content parses as JSON.
    async fn list(&self, id: &str) -> Result<Vec<Value>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct GistClient {
    client: JsonClient,
}

impl GistClient {
    pub fn new(client: JsonClient) -> Self {
        Self { client }
    }
}

fn gist_body(title: &str, dashboard: &Value) -> Result<Value, StoreError> {
    Ok(json!({
        "description": title,
        "public": false,
        "files": {
            GIST_FILE_NAME: { "content": serde_json::to_string_pretty(dashboard)? }
        }
    }))
}

fn dashboards_in_gist(gist: &Value) -> Vec<Value> {
    let Some(files) = gist.get("files").and_then(Value::as_object) else {
        return Vec::new();
    };
    files
        .values()
        .filter_map(|file| file.get("content")?.as_str())
        .filter_map(|content| serde_json::from_str::<Value>(content).ok())
        .collect()
}

#[async_trait::async_trait]
impl GistService for GistClient {
    async fn save(&self, title: &str, dashboard: &Value) -> Result<String, StoreError> {
        let response = self.client.post("gists", &gist_body(title, dashboard)?).await?;
        response
            .get("html_url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Decode("gist response has no html_url".to_string()))
    }

    async fn list(&self, id: &str) -> Result<Vec<Value>, StoreError> {
        let id = gist_id(id).ok_or_else(|| StoreError::InvalidName(id.to_string()))?;
        let gist = self.client.get(&format!("gists/{}", id)).await?;
        Ok(dashboards_in_gist(&gist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognises_gist_ids_and_urls() {
        assert!(is_gist("12345"));
        assert!(is_gist("a1b2c3d4e5f6"));
        assert!(is_gist("https://gist.github.com/someone/a1b2c3d4e5"));
        assert!(!is_gist(""));
        assert!(!is_gist("1234"));
        assert!(!is_gist("https://example.com/dash"));
    }

    #[test]
    fn test_gist_id_takes_last_segment() {
        assert_eq!(gist_id("6402451").as_deref(), Some("6402451"));
        assert_eq!(
            gist_id("https://gist.github.com/someone/a1b2c3d4e5/").as_deref(),
            Some("a1b2c3d4e5")
        );
        assert_eq!(gist_id("not a gist"), None);
    }

    #[test]
    fn test_gist_body_is_private_with_one_file() {
        let body = gist_body("ops", &json!({"title": "ops"})).unwrap();
        assert_eq!(body["public"], false);
        assert_eq!(body["description"], "ops");
        assert!(body["files"][GIST_FILE_NAME]["content"].is_string());
    }

    #[test]
    // Files that are not JSON are skipped.
    fn test_only_parseable_files_are_listed() {
        let gist = json!({
            "files": {
                "a.json": {"content": "{\"title\":\"a\"}"},
                "notes.txt": {"content": "hello"},
            }
        });
        assert_eq!(dashboards_in_gist(&gist), vec![json!({"title": "a"})]);
    }
}
