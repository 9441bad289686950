use crate::consts::dash_consts::SHARE_FRAGMENT;
use serde::Serialize;

/// Everything needed to present a shareable link to a saved dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLink {
    pub location: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub link: String,
    pub title: String,
}

impl ShareLink {
    pub fn new(location: &str, kind: &str, id: &str, title: &str) -> Self {
        let location = location
            .split_once('#')
            .map_or(location, |(base, _)| base)
            .to_string();
        let link = format!("{}{}/{}/{}", location, SHARE_FRAGMENT, kind, id);
        Self {
            location,
            kind: kind.to_string(),
            id: id.to_string(),
            link,
            title: title.to_string(),
        }
    }
}
