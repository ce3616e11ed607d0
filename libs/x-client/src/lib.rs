use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

mod oauth;

pub use oauth::{authorization_header, sign, XCredentials};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";
const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum PostingError {
    #[error("Tweet text cannot be empty")]
    EmptyText,

    #[error("Authentication failed ({status}). Please check your Twitter API credentials.")]
    Auth { status: u16, body: String },

    #[error("X API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("X API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected X API response: {0}")]
    Decode(String),

    #[error("Invalid X API base '{0}'")]
    InvalidBase(String),

    #[error("Failed to sign X API request: {0}")]
    Signing(String),
}

impl PostingError {
    /// Raw response body, when the API sent one.
    pub fn details(&self) -> Option<&str> {
        match self {
            PostingError::Auth { body, .. } | PostingError::Api { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// A post accepted by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: String,
    pub text: String,
}

impl PublishedPost {
    pub fn url(&self) -> String {
        format!("https://twitter.com/user/status/{}", self.id)
    }
}

/// Anything that can publish a finished post.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn post(&self, text: &str, reply_to: Option<&str>) -> Result<PublishedPost, PostingError>;
}

#[derive(Serialize, Debug)]
struct CreateTweet<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplySettings<'a>>,
}

#[derive(Serialize, Debug)]
struct ReplySettings<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Deserialize, Debug)]
struct CreateTweetResponse {
    data: PublishedPost,
}

/// X API v2 client for creating posts with user-context OAuth 1.0a.
#[derive(Debug, Clone)]
pub struct XClient {
    client: reqwest::Client,
    credentials: XCredentials,
    endpoint: Url,
}

impl XClient {
    pub fn new(credentials: XCredentials) -> Result<Self, PostingError> {
        Self::with_base(credentials, DEFAULT_API_BASE)
    }

    pub fn with_base(credentials: XCredentials, api_base: &str) -> Result<Self, PostingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        let base = api_base.trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/2/tweets"))
            .map_err(|_| PostingError::InvalidBase(api_base.to_string()))?;
        Ok(Self { client, credentials, endpoint })
    }
}

#[async_trait]
impl Publisher for XClient {
    #[instrument(skip(self, text), fields(text_len = text.chars().count()))]
    async fn post(&self, text: &str, reply_to: Option<&str>) -> Result<PublishedPost, PostingError> {
        if text.trim().is_empty() {
            return Err(PostingError::EmptyText);
        }

        let body = CreateTweet {
            text,
            reply: reply_to.map(|id| ReplySettings { in_reply_to_tweet_id: id }),
        };
        let auth = authorization_header(&self.credentials, "POST", &self.endpoint)?;

        debug!("Sending post to X API");
        let res = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PostingError::Auth { status: status.as_u16(), body: text });
        }
        if !status.is_success() {
            return Err(PostingError::Api { status: status.as_u16(), body: text });
        }

        let created: CreateTweetResponse =
            serde_json::from_str(&text).map_err(|e| PostingError::Decode(e.to_string()))?;
        info!(id = %created.data.id, "Post published");
        Ok(created.data)
    }
}
