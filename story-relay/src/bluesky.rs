use crate::fetcher::Fetcher;
use crate::traits::Poster;
use crate::types::{RelayError, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_SERVICE: &str = "https://bsky.social";
const POST_COLLECTION: &str = "app.bsky.feed.post";
const LINK_FEATURE: &str = "app.bsky.richtext.facet#link";

#[derive(Debug, Clone)]
pub struct BlueskyConfig {
    pub service: String,
    pub identifier: String,
    pub password: String,
}

/// Posts to a Bluesky (AT Protocol) account. A session is created for every
/// post and dropped afterwards; nothing is cached between ticks.
pub struct BlueskyPoster {
    fetcher: Fetcher,
    config: BlueskyConfig,
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'a str,
    record: PostRecord<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostRecord<'a> {
    #[serde(rename = "$type")]
    record_type: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    facets: Vec<Facet>,
    created_at: String,
}

/// Rich-text annotation over a UTF-8 byte range of the post text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetFeature {
    #[serde(rename = "$type")]
    pub feature_type: String,
    pub uri: String,
}

/// Link facets for every http(s) URL in `text`. Trailing punctuation is not
/// part of the link.
pub fn link_facets(text: &str) -> Vec<Facet> {
    let mut facets = Vec::new();
    let mut offset = 0;

    for token in text.split_inclusive(char::is_whitespace) {
        let word = token.trim_end();
        if word.starts_with("http://") || word.starts_with("https://") {
            let link = trim_link(word);
            if Url::parse(link).is_ok() {
                facets.push(Facet {
                    index: ByteSlice {
                        byte_start: offset,
                        byte_end: offset + link.len(),
                    },
                    features: vec![FacetFeature {
                        feature_type: LINK_FEATURE.to_string(),
                        uri: link.to_string(),
                    }],
                });
            }
        }
        offset += token.len();
    }

    facets
}

/// Strip trailing punctuation. A closing paren stays when it balances one
/// inside the link, as in `.../Rust_(programming_language)`.
fn trim_link(word: &str) -> &str {
    let mut link = word;
    loop {
        match link.chars().last() {
            Some('.' | ',' | '!' | '?' | ';' | ':' | '"') => link = &link[..link.len() - 1],
            Some(')') if link.matches(')').count() > link.matches('(').count() => {
                link = &link[..link.len() - 1]
            }
            _ => return link,
        }
    }
}

impl BlueskyPoster {
    pub fn new(fetcher: Fetcher, config: BlueskyConfig) -> Self {
        Self { fetcher, config }
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.config.service.trim_end_matches('/'), method)
    }

    async fn create_session(&self) -> Result<Session> {
        let url = self.xrpc("com.atproto.server.createSession");
        let body = CreateSessionRequest {
            identifier: &self.config.identifier,
            password: &self.config.password,
        };

        let response = self
            .fetcher
            .send_with_retry(&url, || self.fetcher.client().post(&url).json(&body))
            .await
            .map_err(|e| match e {
                RelayError::Auth(msg) => RelayError::Auth(format!("{} as {}", msg, self.config.identifier)),
                other => other,
            })?;

        let session: Session = serde_json::from_str(&response.text().await?)?;
        debug!("Opened Bluesky session for {}", session.did);
        Ok(session)
    }
}

#[async_trait]
impl Poster for BlueskyPoster {
    fn poster_name(&self) -> String {
        format!("Bluesky ({})", self.config.identifier)
    }

    async fn post(&self, text: &str) -> Result<()> {
        let session = self.create_session().await?;

        let body = CreateRecordRequest {
            repo: &session.did,
            collection: POST_COLLECTION,
            record: PostRecord {
                record_type: POST_COLLECTION,
                text,
                facets: link_facets(text),
                created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        };

        // Not retried: a post that timed out may still have been created.
        let response = self
            .fetcher
            .client()
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Publish(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RelayError::Publish(format!("HTTP {}: {}", status.as_u16(), detail)));
        }

        info!("Bluesky accepted post from {}", self.config.identifier);
        Ok(())
    }
}
