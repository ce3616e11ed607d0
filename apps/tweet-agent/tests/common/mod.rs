#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tweet_agent::AgentConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use x_client::{PostingError, PublishedPost, Publisher};

pub const DEV_NEWS_RSS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/dev_news.xml"));
pub const ARCH_BLOG_ATOM: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/arch_blog.xml"));

pub const GENERATE_PATH: &str = "/v1beta/models/test-model:generateContent";

/// Records every post instead of sending it.
#[derive(Default)]
pub struct RecordingPublisher {
    pub posts: Mutex<Vec<(String, Option<String>)>>,
    pub fail_auth: bool,
}

impl RecordingPublisher {
    pub fn failing_auth() -> Self {
        Self { fail_auth: true, ..Default::default() }
    }

    pub fn posted(&self) -> Vec<(String, Option<String>)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn post(&self, text: &str, reply_to: Option<&str>) -> Result<PublishedPost, PostingError> {
        if self.fail_auth {
            return Err(PostingError::Auth { status: 401, body: r#"{"title":"Unauthorized"}"#.to_string() });
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push((text.to_string(), reply_to.map(str::to_string)));
        Ok(PublishedPost { id: format!("{}", 1000 + posts.len()), text: text.to_string() })
    }
}

/// Config pointing Gemini and the feed list at `server`.
pub fn config_for(server: &MockServer) -> AgentConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("GEMINI_API_KEY", "test-key".to_string()),
        ("GEMINI_MODEL", "test-model".to_string()),
        ("GEMINI_API_BASE", server.uri()),
        ("GEMINI_TIMEOUT_SECS", "5".to_string()),
        ("FEED_URLS", format!("{}/dev-news.xml", server.uri())),
        ("FEED_TIMEOUT_SECS", "5".to_string()),
        ("FEED_RETRY_SECS", "0".to_string()),
        ("TOPIC_SEED", "7".to_string()),
    ]);
    AgentConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn gemini_text(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
}

pub async fn mount_feed(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}
