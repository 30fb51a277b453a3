pub mod bluesky;
pub mod config;
pub mod dedup;
pub mod enricher;
pub mod fetcher;
pub mod llm_adapter;
pub mod pipeline;
pub mod publisher;
pub mod release;
pub mod scheduler;
pub mod sources;
pub mod traits;
pub mod types;
pub mod utils;

pub use types::*;
pub use bluesky::BlueskyPoster;
pub use dedup::DedupFilter;
pub use enricher::Enricher;
pub use fetcher::Fetcher;
pub use llm_adapter::{LlmAdapter, MockLlmAdapter, OpenAiAdapter};
pub use pipeline::{CandidateOutcome, IngestionPipeline, PipelineConfig, TickReport};
pub use publisher::{LogPoster, Publisher};
pub use release::ReleaseQueue;
pub use scheduler::{RelayInstance, Scheduler, TickSummary};
pub use traits::{Poster, SourceAdapter};
