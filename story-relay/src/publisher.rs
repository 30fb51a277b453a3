use crate::traits::Poster;
use crate::types::{Record, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Marker placed in front of the discussion summary.
pub const DISCUSSION_MARKER: &str = "💬";

/// Final message text: title, blank line, marked summary, blank line, link.
pub fn format_message(record: &Record) -> String {
    format!(
        "{}\n\n{} {}\n\n{}",
        record.title.trim(),
        DISCUSSION_MARKER,
        record.summary.trim(),
        record.url.trim()
    )
}

pub struct Publisher {
    poster: Arc<dyn Poster>,
}

impl Publisher {
    pub fn new(poster: Arc<dyn Poster>) -> Self {
        Self { poster }
    }

    pub async fn publish(&self, record: &Record) -> Result<()> {
        let text = format_message(record);
        self.poster.post(&text).await?;
        info!("Published record {} via {}", record.external_id, self.poster.poster_name());
        Ok(())
    }
}

/// Poster that only logs the message. Used for dry runs.
pub struct LogPoster;

#[async_trait]
impl Poster for LogPoster {
    fn poster_name(&self) -> String {
        "log".to_string()
    }

    async fn post(&self, text: &str) -> Result<()> {
        info!("Dry run, would post:\n{}", text);
        Ok(())
    }
}
