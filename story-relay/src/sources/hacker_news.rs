use crate::fetcher::Fetcher;
use crate::traits::SourceAdapter;
use crate::types::{DiscussionEntry, ExternalId, ItemDetail, Result, StyleProfile};
use crate::utils::html_to_text;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
const ITEM_PAGE: &str = "https://news.ycombinator.com/item?id=";

/// Hacker News top stories, summarized from their comment threads.
pub struct HackerNewsSource {
    fetcher: Fetcher,
    api_base: String,
    limit: usize,
}

/// Item payload as served by the Firebase API. Every field is optional there.
#[derive(Debug, Deserialize)]
pub struct HnItem {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub kids: Vec<u64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
}

impl HackerNewsSource {
    pub fn new(fetcher: Fetcher, api_base: impl Into<String>, limit: usize) -> Self {
        Self {
            fetcher,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            limit,
        }
    }

    async fn fetch_item(&self, id: &ExternalId) -> Result<Option<HnItem>> {
        let url = format!("{}/item/{}.json", self.api_base, id);
        // The API answers `null` for ids it does not know.
        self.fetcher.get_json::<Option<HnItem>>(&url, None).await
    }
}

/// Map a story payload to item detail. Deleted or dead stories have no detail.
pub fn story_detail(item: HnItem) -> Option<ItemDetail> {
    if item.deleted || item.dead {
        return None;
    }

    let url = item
        .url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| format!("{}{}", ITEM_PAGE, item.id));

    Some(ItemDetail {
        external_id: ExternalId::from(item.id),
        title: item.title.unwrap_or_default(),
        url: Some(url),
        body: item.text.map(|t| html_to_text(&t)).filter(|t| !t.is_empty()),
        discussion: item
            .kids
            .into_iter()
            .map(|kid| DiscussionEntry::Remote(ExternalId::from(kid)))
            .collect(),
    })
}

/// Plain text of a comment payload, if it still has any.
pub fn comment_text(item: HnItem) -> Option<String> {
    if item.deleted || item.dead {
        return None;
    }
    item.text.map(|t| html_to_text(&t)).filter(|t| !t.is_empty())
}

#[async_trait]
impl SourceAdapter for HackerNewsSource {
    fn source_name(&self) -> String {
        "Hacker News".to_string()
    }

    fn style_profile(&self) -> StyleProfile {
        StyleProfile::Discussion
    }

    async fn list_candidates(&self) -> Result<Vec<ExternalId>> {
        let url = format!("{}/topstories.json", self.api_base);
        let ids: Vec<u64> = self.fetcher.get_json(&url, None).await?;

        let candidates: Vec<ExternalId> = ids.into_iter().take(self.limit).map(ExternalId::from).collect();
        info!("Hacker News returned {} candidates", candidates.len());
        Ok(candidates)
    }

    async fn fetch_detail(&self, id: &ExternalId) -> Result<Option<ItemDetail>> {
        match self.fetch_item(id).await? {
            Some(item) => Ok(story_detail(item)),
            None => {
                debug!("Hacker News item {} not found", id);
                Ok(None)
            }
        }
    }

    async fn fetch_discussion_entry(&self, id: &ExternalId) -> Result<Option<String>> {
        Ok(self.fetch_item(id).await?.and_then(comment_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> HnItem {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_story_with_url_and_kids() {
        let item = parse(
            r#"{"id": 102, "title": "Show HN: a thing", "url": "https://thing.dev", "kids": [5, 6], "type": "story"}"#,
        );
        let detail = story_detail(item).unwrap();

        assert_eq!(detail.external_id, ExternalId::from(102));
        assert_eq!(detail.url.as_deref(), Some("https://thing.dev"));
        assert_eq!(
            detail.discussion,
            vec![
                DiscussionEntry::Remote(ExternalId::from(5)),
                DiscussionEntry::Remote(ExternalId::from(6))
            ]
        );
        assert!(!detail.is_malformed());
    }

    #[test]
    fn test_text_post_links_to_item_page() {
        let item = parse(r#"{"id": 7, "title": "Ask HN: why?", "text": "Just <i>wondering</i>"}"#);
        let detail = story_detail(item).unwrap();

        assert_eq!(detail.url.as_deref(), Some("https://news.ycombinator.com/item?id=7"));
        assert_eq!(detail.body.as_deref(), Some("Just wondering"));
        assert!(detail.discussion.is_empty());
        assert!(!detail.is_malformed());
    }

    #[test]
    fn test_story_without_discussion_or_body_is_malformed() {
        let item = parse(r#"{"id": 8, "title": "Link only", "url": "https://a.b"}"#);
        assert!(story_detail(item).unwrap().is_malformed());
    }

    #[test]
    fn test_deleted_comment_has_no_text() {
        let deleted = parse(r#"{"id": 9, "deleted": true}"#);
        assert_eq!(comment_text(deleted), None);

        let live = parse(r#"{"id": 10, "text": "great &amp; fast"}"#);
        assert_eq!(comment_text(live).as_deref(), Some("great & fast"));
    }

    #[test]
    fn test_null_item_decodes_to_none() {
        let item: Option<HnItem> = serde_json::from_str("null").unwrap();
        assert!(item.is_none());
    }
}
