use crate::fetcher::Fetcher;
use crate::traits::SourceAdapter;
use crate::types::{DiscussionEntry, ExternalId, ItemDetail, RelayError, Result, StyleProfile};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_API_BASE: &str = "https://oauth.reddit.com";
const WEB_BASE: &str = "https://www.reddit.com";
const COMMENT_LIMIT: usize = 25;

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub subreddit: String,
    pub limit: usize,
    pub shorten_titles: bool,
    pub auth_url: String,
    pub api_base: String,
}

/// Newest posts of one subreddit, read through the OAuth API with an
/// application-only (client credentials) token.
pub struct RedditSource {
    fetcher: Fetcher,
    config: RedditConfig,
    token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
pub struct ListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct RedditPost {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub selftext: Option<String>,
}

/// Comment listings mix `t1` comments and `more` placeholders; only the
/// former carry a body.
#[derive(Debug, Deserialize)]
pub struct RedditComment {
    #[serde(default)]
    pub body: Option<String>,
}

impl RedditSource {
    pub fn new(fetcher: Fetcher, config: RedditConfig) -> Self {
        Self {
            fetcher,
            config,
            token: RwLock::new(None),
        }
    }

    /// Exchange client credentials for a bearer token. Called once per
    /// listing, so every tick starts with a fresh token.
    async fn refresh_token(&self) -> Result<String> {
        let url = self.config.auth_url.as_str();
        let response = self
            .fetcher
            .send_with_retry(url, || {
                self.fetcher
                    .client()
                    .post(url)
                    .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
                    .form(&[("grant_type", "client_credentials")])
            })
            .await?;

        let token: TokenResponse = serde_json::from_str(&response.text().await?)?;
        *self.token.write().await = Some(token.access_token.clone());
        debug!("Obtained Reddit access token");
        Ok(token.access_token)
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.refresh_token().await
    }
}

/// Map the `/comments/{id}` payload to item detail.
pub fn post_detail(post: Listing<RedditPost>, comments: Listing<RedditComment>) -> Option<ItemDetail> {
    let post = post.data.children.into_iter().find(|thing| thing.kind == "t3")?.data;

    let discussion = comments
        .data
        .children
        .into_iter()
        .filter(|thing| thing.kind == "t1")
        .filter_map(|thing| thing.data.body)
        .filter(|body| !is_removed(body))
        .take(COMMENT_LIMIT)
        .map(DiscussionEntry::Inline)
        .collect();

    Some(ItemDetail {
        external_id: ExternalId::from(post.id),
        title: post.title.unwrap_or_default(),
        url: post
            .permalink
            .filter(|p| !p.trim().is_empty())
            .map(|p| format!("{}{}", WEB_BASE, p)),
        body: post.selftext.filter(|s| !s.trim().is_empty() && !is_removed(s)),
        discussion,
    })
}

fn is_removed(text: &str) -> bool {
    matches!(text.trim(), "" | "[deleted]" | "[removed]")
}

#[async_trait]
impl SourceAdapter for RedditSource {
    fn source_name(&self) -> String {
        format!("Reddit r/{}", self.config.subreddit)
    }

    fn style_profile(&self) -> StyleProfile {
        StyleProfile::Discussion
    }

    fn shortens_titles(&self) -> bool {
        self.config.shorten_titles
    }

    async fn list_candidates(&self) -> Result<Vec<ExternalId>> {
        let token = self.refresh_token().await?;
        let url = format!(
            "{}/r/{}/new?limit={}",
            self.config.api_base.trim_end_matches('/'),
            self.config.subreddit,
            self.config.limit
        );
        let listing: Listing<RedditPost> = self.fetcher.get_json(&url, Some(&token)).await?;

        let candidates: Vec<ExternalId> = listing
            .data
            .children
            .into_iter()
            .filter(|thing| thing.kind == "t3")
            .map(|thing| ExternalId::from(thing.data.id))
            .take(self.config.limit)
            .collect();
        info!("Reddit r/{} returned {} candidates", self.config.subreddit, candidates.len());
        Ok(candidates)
    }

    async fn fetch_detail(&self, id: &ExternalId) -> Result<Option<ItemDetail>> {
        let token = self.token().await?;
        let url = format!(
            "{}/comments/{}?limit={}&depth=1",
            self.config.api_base.trim_end_matches('/'),
            id,
            COMMENT_LIMIT
        );
        let (post, comments): (Listing<RedditPost>, Listing<RedditComment>) =
            self.fetcher.get_json(&url, Some(&token)).await?;
        Ok(post_detail(post, comments))
    }

    async fn fetch_discussion_entry(&self, id: &ExternalId) -> Result<Option<String>> {
        // Comment bodies arrive inline with the post.
        Err(RelayError::Source(format!("Reddit does not serve comment {} by reference", id)))
    }
}
