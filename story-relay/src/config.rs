use crate::bluesky::{self, BlueskyConfig, BlueskyPoster};
use crate::enricher::Enricher;
use crate::fetcher::Fetcher;
use crate::llm_adapter::{self, LlmAdapter, OpenAiAdapter, OpenAiConfig};
use crate::pipeline::{IngestionPipeline, PipelineConfig};
use crate::publisher::{LogPoster, Publisher};
use crate::release::ReleaseQueue;
use crate::scheduler::RelayInstance;
use crate::sources::{hacker_news, reddit, HackerNewsSource, RedditConfig, RedditSource};
use crate::traits::{Poster, SourceAdapter};
use crate::types::{FetchConfig, RelayError, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use interfaces::RecordStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Summarize new stories and their discussions, then post them one per tick.
#[derive(Debug, Parser)]
#[command(name = "story-relay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Which relay instances to operate on
    #[arg(long, value_enum, env = "RELAY_SOURCE", default_value_t = SourceSelection::All)]
    pub source: SourceSelection,

    #[command(flatten)]
    pub relay: RelayArgs,

    #[command(flatten)]
    pub llm: LlmArgs,

    #[command(flatten)]
    pub hacker_news: HackerNewsArgs,

    #[command(flatten)]
    pub reddit: RedditArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Tick immediately, then on every interval (default)
    Run,
    /// Run one tick per instance and exit
    Tick,
    /// Print published/pending counts per store
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceSelection {
    HackerNews,
    Reddit,
    All,
}

impl SourceSelection {
    pub fn includes_hacker_news(&self) -> bool {
        matches!(self, SourceSelection::HackerNews | SourceSelection::All)
    }

    pub fn includes_reddit(&self) -> bool {
        matches!(self, SourceSelection::Reddit | SourceSelection::All)
    }
}

#[derive(Debug, Clone, Args)]
pub struct RelayArgs {
    /// Seconds between ticks
    #[arg(long, env = "RELAY_INTERVAL_SECS", default_value_t = 300)]
    pub interval_secs: u64,

    /// Timeout for every outbound request
    #[arg(long, env = "RELAY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Retries for transient request failures
    #[arg(long, env = "RELAY_MAX_RETRIES", default_value_t = 2)]
    pub max_retries: u32,

    /// Discussion entries aggregated per item
    #[arg(long, env = "RELAY_MAX_DISCUSSION_ENTRIES", default_value_t = 25)]
    pub max_discussion_entries: usize,

    /// Discussion entries fetched concurrently
    #[arg(long, env = "RELAY_DISCUSSION_CONCURRENCY", default_value_t = 5)]
    pub discussion_concurrency: usize,

    /// Log messages instead of posting them
    #[arg(long, env = "RELAY_DRY_RUN")]
    pub dry_run: bool,

    /// Posting service base URL
    #[arg(long, env = "BSKY_SERVICE", default_value = bluesky::DEFAULT_SERVICE)]
    pub bsky_service: String,
}

impl RelayArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: format!("story-relay/{}", env!("CARGO_PKG_VERSION")),
            timeout_seconds: self.request_timeout_secs,
            max_retries: self.max_retries,
            ..FetchConfig::default()
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_discussion_entries: self.max_discussion_entries,
            discussion_concurrency: self.discussion_concurrency,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct LlmArgs {
    #[arg(long = "openai-api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long = "openai-endpoint", env = "OPENAI_ENDPOINT", default_value = llm_adapter::DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long = "openai-model", env = "OPENAI_MODEL", default_value = llm_adapter::DEFAULT_MODEL)]
    pub model: String,
}

#[derive(Debug, Clone, Args)]
pub struct HackerNewsArgs {
    #[arg(id = "hn_api_base", long = "hn-api-base", env = "HN_API_BASE", default_value = hacker_news::DEFAULT_API_BASE)]
    pub api_base: String,

    /// Top stories considered per tick
    #[arg(id = "hn_top_limit", long = "hn-top-limit", env = "HN_TOP_LIMIT", default_value_t = 15)]
    pub limit: usize,

    #[arg(id = "hn_db_path", long = "hn-db-path", env = "HN_DB_PATH", default_value = "data/hacker_news.db")]
    pub db_path: PathBuf,

    #[arg(id = "hn_bsky_identifier", long = "hn-bsky-identifier", env = "HN_BSKY_IDENTIFIER")]
    pub bsky_identifier: Option<String>,

    #[arg(id = "hn_bsky_password", long = "hn-bsky-password", env = "HN_BSKY_PASSWORD", hide_env_values = true)]
    pub bsky_password: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RedditArgs {
    #[arg(long = "reddit-client-id", env = "REDDIT_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long = "reddit-client-secret", env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Reddit requires a descriptive user agent
    #[arg(long = "reddit-user-agent", env = "REDDIT_USER_AGENT")]
    pub user_agent: Option<String>,

    #[arg(long = "reddit-subreddit", env = "REDDIT_SUBREDDIT", default_value = "technology")]
    pub subreddit: String,

    /// Newest posts considered per tick
    #[arg(id = "reddit_limit", long = "reddit-limit", env = "REDDIT_LIMIT", default_value_t = 7)]
    pub limit: usize,

    /// Rewrite titles with the short title profile
    #[arg(long = "reddit-shorten-titles", env = "REDDIT_SHORTEN_TITLES", default_value_t = true, action = ArgAction::Set)]
    pub shorten_titles: bool,

    #[arg(long = "reddit-auth-url", env = "REDDIT_AUTH_URL", default_value = reddit::DEFAULT_AUTH_URL)]
    pub auth_url: String,

    #[arg(id = "reddit_api_base", long = "reddit-api-base", env = "REDDIT_API_BASE", default_value = reddit::DEFAULT_API_BASE)]
    pub api_base: String,

    #[arg(id = "reddit_db_path", long = "reddit-db-path", env = "REDDIT_DB_PATH", default_value = "data/reddit.db")]
    pub db_path: PathBuf,

    #[arg(id = "reddit_bsky_identifier", long = "reddit-bsky-identifier", env = "REDDIT_BSKY_IDENTIFIER")]
    pub bsky_identifier: Option<String>,

    #[arg(id = "reddit_bsky_password", long = "reddit-bsky-password", env = "REDDIT_BSKY_PASSWORD", hide_env_values = true)]
    pub bsky_password: Option<String>,
}

impl RedditArgs {
    fn has_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Store locations of the selected instances, by instance name.
pub fn store_paths(cli: &Cli) -> Vec<(&'static str, PathBuf)> {
    let mut paths = Vec::new();
    if cli.source.includes_hacker_news() {
        paths.push(("Hacker News", cli.hacker_news.db_path.clone()));
    }
    if cli.source.includes_reddit() {
        paths.push(("Reddit", cli.reddit.db_path.clone()));
    }
    paths
}

/// Wire up every selected instance with its own store, source and poster.
pub async fn build_instances(cli: &Cli) -> Result<Vec<RelayInstance>> {
    let relay = &cli.relay;
    let base_fetch = relay.fetch_config();
    let fetcher = Fetcher::new(base_fetch.clone())?;

    let api_key = cli
        .llm
        .api_key
        .clone()
        .ok_or_else(|| RelayError::Config("OPENAI_API_KEY is required".to_string()))?;
    let llm: Arc<dyn LlmAdapter> = Arc::new(OpenAiAdapter::new(
        fetcher.clone(),
        OpenAiConfig {
            endpoint: cli.llm.endpoint.clone(),
            model: cli.llm.model.clone(),
            ..OpenAiConfig::new(api_key)
        },
    ));
    let enricher = Enricher::new(llm);

    let mut instances = Vec::new();

    if cli.source.includes_hacker_news() {
        let source: Arc<dyn SourceAdapter> = Arc::new(HackerNewsSource::new(
            fetcher.clone(),
            cli.hacker_news.api_base.clone(),
            cli.hacker_news.limit,
        ));
        let poster = build_poster(
            relay,
            &fetcher,
            "HN",
            cli.hacker_news.bsky_identifier.clone(),
            cli.hacker_news.bsky_password.clone(),
        )?;
        let store = RecordStore::open(&cli.hacker_news.db_path).await?;
        instances.push(assemble(source, store, enricher.clone(), poster, relay));
    }

    if cli.source.includes_reddit() {
        if cli.reddit.has_credentials() {
            let reddit_fetcher = match &cli.reddit.user_agent {
                Some(user_agent) => Fetcher::new(FetchConfig {
                    user_agent: user_agent.clone(),
                    ..base_fetch.clone()
                })?,
                None => fetcher.clone(),
            };
            let source: Arc<dyn SourceAdapter> = Arc::new(RedditSource::new(
                reddit_fetcher,
                RedditConfig {
                    client_id: cli.reddit.client_id.clone().unwrap_or_default(),
                    client_secret: cli.reddit.client_secret.clone().unwrap_or_default(),
                    subreddit: cli.reddit.subreddit.clone(),
                    limit: cli.reddit.limit,
                    shorten_titles: cli.reddit.shorten_titles,
                    auth_url: cli.reddit.auth_url.clone(),
                    api_base: cli.reddit.api_base.clone(),
                },
            ));
            let poster = build_poster(
                relay,
                &fetcher,
                "REDDIT",
                cli.reddit.bsky_identifier.clone(),
                cli.reddit.bsky_password.clone(),
            )?;
            let store = RecordStore::open(&cli.reddit.db_path).await?;
            instances.push(assemble(source, store, enricher.clone(), poster, relay));
        } else if cli.source == SourceSelection::Reddit {
            return Err(RelayError::Config(
                "REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET are required for the Reddit relay".to_string(),
            ));
        } else {
            warn!("Reddit credentials not configured, Reddit relay disabled");
        }
    }

    if instances.is_empty() {
        return Err(RelayError::Config("no relay instance is enabled".to_string()));
    }
    Ok(instances)
}

fn build_poster(
    relay: &RelayArgs,
    fetcher: &Fetcher,
    env_prefix: &str,
    identifier: Option<String>,
    password: Option<String>,
) -> Result<Arc<dyn Poster>> {
    if relay.dry_run {
        return Ok(Arc::new(LogPoster));
    }
    match (identifier, password) {
        (Some(identifier), Some(password)) => Ok(Arc::new(BlueskyPoster::new(
            fetcher.clone(),
            BlueskyConfig {
                service: relay.bsky_service.clone(),
                identifier,
                password,
            },
        ))),
        _ => Err(RelayError::Config(format!(
            "{0}_BSKY_IDENTIFIER and {0}_BSKY_PASSWORD are required unless --dry-run is set",
            env_prefix
        ))),
    }
}

fn assemble(
    source: Arc<dyn SourceAdapter>,
    store: RecordStore,
    enricher: Enricher,
    poster: Arc<dyn Poster>,
    relay: &RelayArgs,
) -> RelayInstance {
    info!("Configured relay for {} via {}", source.source_name(), poster.poster_name());
    let pipeline = IngestionPipeline::new(source, store.clone(), enricher, relay.pipeline_config());
    RelayInstance::new(pipeline, ReleaseQueue::new(store), Publisher::new(poster))
}
