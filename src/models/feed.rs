//! Feed descriptors and the feed list file format.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

/// One feed to harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    pub name: String,
    pub url: String,
}

impl FeedDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Create a descriptor named after its URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            name: url.clone(),
            url,
        }
    }

    /// Stable identifier for records harvested from this feed.
    ///
    /// Uses the `cid` query parameter when the URL carries one (place ids on
    /// map listings), otherwise the URL itself.
    pub fn source_id(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, v)| k == "cid" && !v.is_empty())
                    .map(|(_, v)| v.into_owned())
            })
            .unwrap_or_else(|| self.url.clone())
    }
}

/// Entry in a feed list file: either a bare URL or an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedEntry {
    Url(String),
    Object {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

/// Parse a JSON feed list. Entries without a URL are skipped.
pub fn parse_feeds(json: &str) -> serde_json::Result<Vec<FeedDescriptor>> {
    let entries: Vec<FeedEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            FeedEntry::Url(url) if !url.trim().is_empty() => {
                Some(FeedDescriptor::from_url(url.trim()))
            }
            FeedEntry::Object { name, url: Some(url) } if !url.trim().is_empty() => {
                let url = url.trim().to_string();
                let name = name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| url.clone());
                Some(FeedDescriptor { name, url })
            }
            _ => None,
        })
        .collect())
}

/// Load a JSON feed list from disk.
pub fn load_feeds(path: &Path) -> anyhow::Result<Vec<FeedDescriptor>> {
    use anyhow::Context;

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feed list {}", path.display()))?;
    parse_feeds(&content).with_context(|| format!("Invalid feed list {}", path.display()))
}
