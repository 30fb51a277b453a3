use std::time::Duration;

pub use interfaces::defs::{DiscussionEntry, ExternalId, ItemDetail, NewRecord, Record, StoreStats, StyleProfile};

/// HTTP plumbing shared by every outbound collaborator.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_millis: u64,
    /// Minimum spacing between two requests to the same host.
    pub min_host_interval_millis: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "story-relay/0.1".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_millis: 500,
            min_host_interval_millis: 100,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Summarizer error: {0}")]
    Summarizer(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited for {seconds} seconds")]
    RateLimited { seconds: u64 },

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Errors the next scheduled tick is expected to clear on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RelayError::Http(_)
                | RelayError::Source(_)
                | RelayError::Summarizer(_)
                | RelayError::Publish(_)
                | RelayError::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
