pub mod hacker_news;
pub mod reddit;

pub use hacker_news::HackerNewsSource;
pub use reddit::{RedditConfig, RedditSource};
