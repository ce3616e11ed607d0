//! Process configuration, read once from the environment at startup.

use std::fmt;
use std::time::Duration;

use gemini_engine::{GeminiConfig, DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS};
use thiserror::Error;
use x_client::XCredentials;

use crate::fetcher::{FeedSettings, DEFAULT_FEEDS, FETCH_TIMEOUT_SECS, RETRY_WINDOW_SECS};

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct AgentConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_api_base: String,
    pub gemini_timeout: Duration,
    pub twitter_api_key: Option<String>,
    pub twitter_api_secret: Option<String>,
    pub twitter_access_token: Option<String>,
    pub twitter_access_secret: Option<String>,
    pub x_api_base: String,
    pub feeds: FeedSettings,
    pub topic_seed: Option<u64>,
    pub cron_secret: Option<String>,
    pub port: u16,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let feed_urls: Vec<String> = match get("FEED_URLS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_FEEDS.iter().map(|url| url.to_string()).collect(),
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL"),
            gemini_api_base: get("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            gemini_timeout: Duration::from_secs(
                parse_number(&get, "GEMINI_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            twitter_api_key: get("TWITTER_API_KEY"),
            twitter_api_secret: get("TWITTER_API_SECRET"),
            twitter_access_token: get("TWITTER_ACCESS_TOKEN"),
            twitter_access_secret: get("TWITTER_ACCESS_SECRET"),
            x_api_base: get("X_API_BASE")
                .unwrap_or_else(|| x_client::DEFAULT_API_BASE.to_string()),
            feeds: FeedSettings {
                urls: feed_urls,
                timeout: Duration::from_secs(
                    parse_number(&get, "FEED_TIMEOUT_SECS")?.unwrap_or(FETCH_TIMEOUT_SECS),
                ),
                retry_window: Duration::from_secs(
                    parse_number(&get, "FEED_RETRY_SECS")?.unwrap_or(RETRY_WINDOW_SECS),
                ),
            },
            topic_seed: parse_number(&get, "TOPIC_SEED")?,
            cron_secret: get("CRON_SECRET"),
            port: parse_number(&get, "PORT")?.unwrap_or(DEFAULT_PORT),
        })
    }

    pub fn gemini(&self) -> Result<GeminiConfig, ConfigError> {
        let api_key = self
            .gemini_api_key
            .clone()
            .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;
        Ok(GeminiConfig::new(api_key)
            .with_model(self.gemini_model.clone())
            .with_api_base(self.gemini_api_base.clone())
            .with_timeout(self.gemini_timeout))
    }

    pub fn x_credentials(&self) -> Result<XCredentials, ConfigError> {
        let require = |value: &Option<String>, var: &'static str| {
            value.clone().ok_or(ConfigError::Missing(var))
        };
        Ok(XCredentials {
            api_key: require(&self.twitter_api_key, "TWITTER_API_KEY")?,
            api_secret: require(&self.twitter_api_secret, "TWITTER_API_SECRET")?,
            access_token: require(&self.twitter_access_token, "TWITTER_ACCESS_TOKEN")?,
            access_secret: require(&self.twitter_access_secret, "TWITTER_ACCESS_SECRET")?,
        })
    }
}

fn parse_number<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|value| {
            value.parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = |value: &Option<String>| if value.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("AgentConfig")
            .field("gemini_api_key", &set(&self.gemini_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("gemini_api_base", &self.gemini_api_base)
            .field("gemini_timeout", &self.gemini_timeout)
            .field("twitter_api_key", &set(&self.twitter_api_key))
            .field("twitter_api_secret", &set(&self.twitter_api_secret))
            .field("twitter_access_token", &set(&self.twitter_access_token))
            .field("twitter_access_secret", &set(&self.twitter_access_secret))
            .field("x_api_base", &self.x_api_base)
            .field("feeds", &self.feeds)
            .field("topic_seed", &self.topic_seed)
            .field("cron_secret", &set(&self.cron_secret))
            .field("port", &self.port)
            .finish()
    }
}
