use crate::types::{ExternalId, ItemDetail, Result, StyleProfile};
use async_trait::async_trait;

/// Trait for pulling candidate items from one external content source
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Human-readable name, used in logs
    fn source_name(&self) -> String;

    /// Profile used for the record summary
    fn style_profile(&self) -> StyleProfile {
        StyleProfile::Discussion
    }

    /// Whether titles are rewritten with the title profile before storing
    fn shortens_titles(&self) -> bool {
        false
    }

    /// Bounded list of candidate identifiers, in the order the source returns them
    async fn list_candidates(&self) -> Result<Vec<ExternalId>>;

    /// Full detail for one candidate; `None` when the source has nothing for it
    async fn fetch_detail(&self, id: &ExternalId) -> Result<Option<ItemDetail>>;

    /// Text of a discussion entry delivered by reference. `None` when the
    /// entry is gone or has no text.
    async fn fetch_discussion_entry(&self, id: &ExternalId) -> Result<Option<String>>;
}

/// Trait for the external posting surface
#[async_trait]
pub trait Poster: Send + Sync {
    fn poster_name(&self) -> String;

    /// Submit final message text. Authentication and rich-text detection are
    /// the poster's business.
    async fn post(&self, text: &str) -> Result<()>;
}
