use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source-assigned identifier of an item. Integer ids are kept in their
/// decimal rendering so both kinds of source share one dedup key column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalId(pub String);

impl ExternalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ExternalId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ExternalId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ExternalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A stored, enriched item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Autoincrement row id. Release order follows it.
    pub id: i64,
    pub external_id: ExternalId,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to insert a record. `published` always starts false.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub external_id: ExternalId,
    pub title: String,
    pub url: String,
    pub summary: String,
}

/// Named summarization constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleProfile {
    /// Short rewrite of a title.
    Title,
    /// Sentiment-bearing digest of a discussion thread.
    Discussion,
}

impl StyleProfile {
    /// Character bound requested from the text-generation collaborator.
    pub fn max_chars(&self) -> usize {
        match self {
            StyleProfile::Title => 80,
            StyleProfile::Discussion => 125,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StyleProfile::Title => "title",
            StyleProfile::Discussion => "discussion",
        }
    }
}

/// One child entry of an item's discussion thread.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscussionEntry {
    /// Text delivered together with the item detail.
    Inline(String),
    /// Entry that has to be fetched on its own.
    Remote(ExternalId),
}

/// Full detail of a candidate item as returned by a source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemDetail {
    pub external_id: ExternalId,
    pub title: String,
    /// Canonical link back to the item.
    pub url: Option<String>,
    /// The post's own text, if any.
    pub body: Option<String>,
    /// Discussion entries in source order.
    pub discussion: Vec<DiscussionEntry>,
}

impl ItemDetail {
    /// True when the item cannot produce a record: no canonical link, or
    /// neither a discussion thread nor body text to summarize.
    pub fn is_malformed(&self) -> bool {
        let has_url = self.url.as_deref().is_some_and(|u| !u.trim().is_empty());
        let has_body = self.body.as_deref().is_some_and(|b| !b.trim().is_empty());
        !has_url || (self.discussion.is_empty() && !has_body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: i64,
    pub published: i64,
    pub pending: i64,
}
