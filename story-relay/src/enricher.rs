use crate::llm_adapter::{ChatPrompt, LlmAdapter};
use crate::types::{Result, StyleProfile};
use std::sync::Arc;
use tracing::debug;

/// Turns raw item text into a bounded-length summary.
///
/// The length bound is a request to the model, declared in the system
/// instruction. Output is only trimmed, never truncated.
#[derive(Clone)]
pub struct Enricher {
    llm: Arc<dyn LlmAdapter>,
}

impl Enricher {
    pub fn new(llm: Arc<dyn LlmAdapter>) -> Self {
        Self { llm }
    }

    /// The request sent for `source_text` under `profile`.
    pub fn build_prompt(source_text: &str, profile: StyleProfile) -> ChatPrompt {
        let limit = profile.max_chars();
        let system = match profile {
            StyleProfile::Title => format!(
                "You are a terse news editor. Rewrite the headline you are given so it reads \
                 naturally on social media. Respond with the headline only, in at most {} characters.",
                limit
            ),
            StyleProfile::Discussion => format!(
                "You are a witty observer of online discussions. Summarize what the commenters are \
                 saying in at most {} characters, then end with exactly one emoji that captures the \
                 overall sentiment of the thread. Respond with the summary only.",
                limit
            ),
        };
        let user = match profile {
            StyleProfile::Title => format!("Headline:\n{}", source_text),
            StyleProfile::Discussion => format!("Discussion:\n{}", source_text),
        };
        ChatPrompt { system, user }
    }

    pub async fn summarize(&self, source_text: &str, profile: StyleProfile) -> Result<String> {
        let prompt = Self::build_prompt(source_text, profile);
        let summary = self.llm.complete(&prompt).await?.trim().to_string();

        let chars = summary.chars().count();
        if chars > profile.max_chars() {
            debug!(
                "{} {} summary is {} chars, over the requested {}; storing as-is",
                self.llm.adapter_name(),
                profile.name(),
                chars,
                profile.max_chars()
            );
        }
        Ok(summary)
    }
}
