use crate::dedup::DedupFilter;
use crate::enricher::Enricher;
use crate::traits::SourceAdapter;
use crate::types::{DiscussionEntry, ExternalId, ItemDetail, NewRecord, Result, StyleProfile};
use crate::utils::preview;
use futures::stream::{self, StreamExt};
use interfaces::RecordStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Cap on discussion entries aggregated per item
    pub max_discussion_entries: usize,
    /// Remote discussion entries fetched at once
    pub discussion_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_discussion_entries: 25,
            discussion_concurrency: 5,
        }
    }
}

/// What happened to one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    AlreadyPresent,
    Malformed,
    Persisted,
    /// Lost an insert race; someone else stored it first.
    Duplicate,
}

/// Per-tick ingestion summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub source: String,
    pub candidates: usize,
    pub already_present: usize,
    pub malformed: usize,
    pub duplicates: usize,
    pub persisted: Vec<ExternalId>,
    /// Set when a hard failure ended the tick early.
    pub aborted: Option<String>,
}

impl TickReport {
    fn new(source: String) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    fn record(&mut self, id: ExternalId, outcome: CandidateOutcome) {
        match outcome {
            CandidateOutcome::AlreadyPresent => self.already_present += 1,
            CandidateOutcome::Malformed => self.malformed += 1,
            CandidateOutcome::Duplicate => self.duplicates += 1,
            CandidateOutcome::Persisted => self.persisted.push(id),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

/// Source → dedup → enrich → store, one candidate at a time.
pub struct IngestionPipeline {
    source: Arc<dyn SourceAdapter>,
    dedup: DedupFilter,
    enricher: Enricher,
    store: RecordStore,
    config: PipelineConfig,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn SourceAdapter>,
        store: RecordStore,
        enricher: Enricher,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            dedup: DedupFilter::new(store.clone()),
            enricher,
            store,
            config,
        }
    }

    pub fn source_name(&self) -> String {
        self.source.source_name()
    }

    /// Ingest the source's current candidates in the order it returned them.
    ///
    /// Skips never stop the tick. The first hard failure does: later
    /// candidates wait for the next tick, and records already written stay.
    pub async fn run_tick(&self) -> TickReport {
        let mut report = TickReport::new(self.source.source_name());

        let candidates = match self.source.list_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("Failed to list candidates from {}: {}", report.source, e);
                report.aborted = Some(e.to_string());
                return report;
            }
        };
        report.candidates = candidates.len();

        for id in candidates {
            match self.ingest_candidate(&id).await {
                Ok(outcome) => {
                    debug!("{} candidate {}: {:?}", report.source, id, outcome);
                    report.record(id, outcome);
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!("Ingestion of {} item {} failed, ending tick early: {}", report.source, id, e);
                    } else {
                        error!("Ingestion of {} item {} failed, ending tick early: {}", report.source, id, e);
                    }
                    report.aborted = Some(format!("item {}: {}", id, e));
                    break;
                }
            }
        }

        info!(
            "{} ingestion: {} candidates, {} new, {} already stored, {} skipped, {} duplicates{}",
            report.source,
            report.candidates,
            report.persisted.len(),
            report.already_present,
            report.malformed,
            report.duplicates,
            if report.is_complete() { "" } else { " (aborted)" }
        );
        report
    }

    pub async fn ingest_candidate(&self, id: &ExternalId) -> Result<CandidateOutcome> {
        if self.dedup.has(id).await? {
            return Ok(CandidateOutcome::AlreadyPresent);
        }

        let detail = match self.source.fetch_detail(id).await? {
            Some(detail) if !detail.is_malformed() => detail,
            _ => {
                debug!("Skipping {} item {}: missing url or discussion", self.source.source_name(), id);
                return Ok(CandidateOutcome::Malformed);
            }
        };

        let profile = self.source.style_profile();
        let source_text = match profile {
            StyleProfile::Title => detail.title.clone(),
            StyleProfile::Discussion => self.discussion_text(&detail).await,
        };
        let summary = self.enricher.summarize(&source_text, profile).await?;

        let title = if self.source.shortens_titles() {
            self.enricher.summarize(&detail.title, StyleProfile::Title).await?
        } else {
            detail.title.clone()
        };

        let record = NewRecord {
            external_id: id.clone(),
            title,
            url: detail.url.clone().unwrap_or_default(),
            summary,
        };

        if self.store.insert_if_absent(&record).await? {
            info!("Stored {} item {}: {}", self.source.source_name(), id, preview(&record.title, 60));
            Ok(CandidateOutcome::Persisted)
        } else {
            warn!("{} item {} was stored concurrently; keeping the existing record", self.source.source_name(), id);
            Ok(CandidateOutcome::Duplicate)
        }
    }

    /// Newline-joined discussion text, in source order. Entries that fail or
    /// come back empty are left out; with no discussion text at all the
    /// post's body, then its title, stands in.
    pub async fn discussion_text(&self, detail: &ItemDetail) -> String {
        let pending: Vec<_> = detail
            .discussion
            .iter()
            .take(self.config.max_discussion_entries)
            .map(|entry| self.resolve_entry(entry))
            .collect();
        let resolved: Vec<Option<String>> = stream::iter(pending)
            .buffered(self.config.discussion_concurrency.max(1))
            .collect()
            .await;
        let texts: Vec<String> = resolved.into_iter().flatten().collect();

        if !texts.is_empty() {
            return texts.join("\n");
        }
        detail
            .body
            .clone()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| detail.title.clone())
    }

    async fn resolve_entry(&self, entry: &DiscussionEntry) -> Option<String> {
        let text = match entry {
            DiscussionEntry::Inline(text) => Some(text.clone()),
            DiscussionEntry::Remote(id) => match self.source.fetch_discussion_entry(id).await {
                Ok(text) => text,
                Err(e) => {
                    debug!("Omitting discussion entry {}: {}", id, e);
                    None
                }
            },
        };
        text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
    }
}
