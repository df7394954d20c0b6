//! Normalized data model produced by every source adapter.
//!
//! Values are built fresh on each fetch and never mutated afterwards; any caching belongs
//! to the consumer.

use serde::{Deserialize, Serialize};

/// One novel (fiction/series) as listed or detailed by a source.
///
/// `(id, url)` identifies a novel within one source; `source_id` is needed to re-resolve the
/// adapter because IDs are not unique across sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Novel {
    /// Trailing path segment of `url`, or the title when the URL has none.
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Absolute URL of the detail page.
    pub url: String,
    /// Document order.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

/// One chapter. `url` is the primary key; `content` is only filled by an explicit content fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Owning novel's URL, for display and routing only.
    pub novel_url: String,
}

impl Chapter {
    pub fn new(url: impl Into<String>, title: impl Into<String>, novel_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: None,
            novel_url: novel_url.into(),
        }
    }
}
