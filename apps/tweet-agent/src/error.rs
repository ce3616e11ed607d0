use gemini_engine::GenerationError;
use thiserror::Error;
use x_client::PostingError;

use crate::config::ConfigError;
use crate::fetcher::FeedError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Posting(#[from] PostingError),

    #[error("Generated post is empty")]
    EmptyPost,
}
