#![allow(dead_code)]

use async_trait::async_trait;
use interfaces::{NewRecord, RecordStore};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use story_relay::types::*;
use story_relay::{Enricher, MockLlmAdapter, Poster, SourceAdapter};
use tokio::sync::Notify;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

/// In-process source answering from fixed tables.
pub struct ScriptedSource {
    pub name: String,
    pub profile: StyleProfile,
    pub shorten_titles: bool,
    pub candidates: Vec<ExternalId>,
    pub details: HashMap<ExternalId, ItemDetail>,
    pub entries: HashMap<ExternalId, String>,
    /// Detail fetches for these ids fail like a timed out request.
    pub failing_details: HashSet<ExternalId>,
    /// Entry fetches for these ids fail.
    pub failing_entries: HashSet<ExternalId>,
    pub fail_listing: bool,
    /// When set, listing waits for a notification first.
    pub gate: Option<Arc<Notify>>,
    pub detail_calls: Mutex<Vec<ExternalId>>,
}

impl ScriptedSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            profile: StyleProfile::Discussion,
            shorten_titles: false,
            candidates: Vec::new(),
            details: HashMap::new(),
            entries: HashMap::new(),
            failing_details: HashSet::new(),
            failing_entries: HashSet::new(),
            fail_listing: false,
            gate: None,
            detail_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_candidates(mut self, ids: &[u64]) -> Self {
        self.candidates = ids.iter().map(|id| ExternalId::from(*id)).collect();
        self
    }

    /// A linked story whose discussion arrives by reference, one remote
    /// entry per comment, ids `id * 10 + n`.
    pub fn with_story(mut self, id: u64, title: &str, comments: &[&str]) -> Self {
        let mut discussion = Vec::new();
        for (n, text) in comments.iter().enumerate() {
            let entry_id = ExternalId::from(id * 10 + n as u64 + 1);
            self.entries.insert(entry_id.clone(), text.to_string());
            discussion.push(DiscussionEntry::Remote(entry_id));
        }
        self.details.insert(
            ExternalId::from(id),
            ItemDetail {
                external_id: ExternalId::from(id),
                title: title.to_string(),
                url: Some(format!("https://example.com/{}", id)),
                body: None,
                discussion,
            },
        );
        self
    }

    pub fn with_detail(mut self, detail: ItemDetail) -> Self {
        self.details.insert(detail.external_id.clone(), detail);
        self
    }

    pub fn detail_calls(&self) -> Vec<ExternalId> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    fn style_profile(&self) -> StyleProfile {
        self.profile
    }

    fn shortens_titles(&self) -> bool {
        self.shorten_titles
    }

    async fn list_candidates(&self) -> Result<Vec<ExternalId>> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_listing {
            return Err(RelayError::Source("listing unavailable".to_string()));
        }
        Ok(self.candidates.clone())
    }

    async fn fetch_detail(&self, id: &ExternalId) -> Result<Option<ItemDetail>> {
        self.detail_calls.lock().unwrap().push(id.clone());
        if self.failing_details.contains(id) {
            return Err(RelayError::Source(format!("request for item {} timed out", id)));
        }
        Ok(self.details.get(id).cloned())
    }

    async fn fetch_discussion_entry(&self, id: &ExternalId) -> Result<Option<String>> {
        if self.failing_entries.contains(id) {
            return Err(RelayError::Source(format!("entry {} unavailable", id)));
        }
        Ok(self.entries.get(id).cloned())
    }
}

/// Poster that keeps every message it is handed.
#[derive(Default)]
pub struct RecordingPoster {
    pub posts: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingPoster {
    pub fn failing() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Poster for RecordingPoster {
    fn poster_name(&self) -> String {
        "recording".to_string()
    }

    async fn post(&self, text: &str) -> Result<()> {
        self.posts.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(RelayError::Publish("HTTP 502: bad gateway".to_string()));
        }
        Ok(())
    }
}

pub fn mock_enricher() -> (Arc<MockLlmAdapter>, Enricher) {
    let llm = Arc::new(MockLlmAdapter::new("test"));
    let enricher = Enricher::new(llm.clone());
    (llm, enricher)
}

pub async fn seed(store: &RecordStore, id: u64, title: &str) -> anyhow::Result<bool> {
    store
        .insert_if_absent(&NewRecord {
            external_id: ExternalId::from(id),
            title: title.to_string(),
            url: format!("https://example.com/{}", id),
            summary: "Earlier summary 👍".to_string(),
        })
        .await
}
