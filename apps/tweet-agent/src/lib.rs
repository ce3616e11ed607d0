//! Posting assistant: feeds and topics in, one normalized post out.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod mcp;
pub mod normalize;
pub mod pipeline;
pub mod server;
pub mod topics;

pub use config::{AgentConfig, ConfigError};
pub use error::AgentError;
pub use fetcher::{FeedError, FeedItem, FeedReader, FeedSettings};
pub use normalize::{normalize, Post, MAX_POST_CHARS};
pub use pipeline::Pipeline;
pub use topics::{Topic, TopicChoice, TopicSelector};
