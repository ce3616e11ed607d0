//! Ordered fallback over Gemini model identifiers and API versions.
//!
//! Available models differ per account and over time, so a generation call
//! walks a prioritized plan of (model, version) pairs. A 404 moves on to the
//! next pair, 401/403 aborts the whole search, anything else is remembered as
//! the last error and the search continues.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{AttemptError, GenerationError};
use crate::{GeminiModelList, GeminiRequest, GeminiResponse};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Versioned API surfaces, tried in this order for every model.
pub const API_VERSIONS: [&str; 2] = ["v1beta", "v1"];

/// Built-in preference list used after any configured model.
pub const FALLBACK_MODELS: [&str; 5] = [
    "gemini-flash-latest",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-pro",
    "gemini-1.0-pro",
];

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Preferred model, tried before the fallback list.
    pub model: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Preferred model first, then the fallback list, without duplicates.
    pub fn candidate_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.model.iter().cloned().collect();
        for model in FALLBACK_MODELS {
            if !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }
        models
    }
}

// The key ends up in URLs; keep it out of Debug output too.
impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// One prompt plus the ordered candidates to try it against.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub models: Vec<String>,
    pub api_versions: Vec<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            models,
            api_versions: API_VERSIONS.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn plan(&self) -> AttemptPlan {
        AttemptPlan::new(&self.models, &self.api_versions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub model: String,
    pub version: String,
}

/// Every (model, version) pair in priority order: models outer, versions inner.
#[derive(Debug, Clone)]
pub struct AttemptPlan {
    attempts: VecDeque<Attempt>,
}

impl AttemptPlan {
    pub fn new(models: &[String], versions: &[String]) -> Self {
        let attempts = models
            .iter()
            .flat_map(|model| {
                versions.iter().map(move |version| Attempt {
                    model: model.clone(),
                    version: version.clone(),
                })
            })
            .collect();
        Self { attempts }
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

impl Iterator for AttemptPlan {
    type Item = Attempt;

    fn next(&mut self) -> Option<Attempt> {
        self.attempts.pop_front()
    }
}

enum SearchState {
    Trying,
    Succeeded(String),
    FatalFailed(GenerationError),
    Exhausted,
}

/// Consumes an [`AttemptPlan`] until success, a fatal failure, or exhaustion.
struct Search {
    plan: AttemptPlan,
    state: SearchState,
    attempts: usize,
    last_error: Option<AttemptError>,
    // A 404 only becomes the reported cause when nothing else went wrong
    last_not_found: Option<AttemptError>,
}

impl Search {
    fn new(plan: AttemptPlan) -> Self {
        Self {
            plan,
            state: SearchState::Trying,
            attempts: 0,
            last_error: None,
            last_not_found: None,
        }
    }

    fn next_attempt(&mut self) -> Option<Attempt> {
        if !matches!(self.state, SearchState::Trying) {
            return None;
        }
        let next = self.plan.next();
        if next.is_none() {
            self.state = SearchState::Exhausted;
        }
        next
    }

    fn record(&mut self, attempt: &Attempt, outcome: Result<String, AttemptError>) {
        self.attempts += 1;
        match outcome {
            Ok(text) => {
                info!(model = %attempt.model, version = %attempt.version, "Gemini generation succeeded");
                self.state = SearchState::Succeeded(text);
            }
            // Bad credentials fail for every model, so the search stops.
            Err(AttemptError::Unauthorized { status, details }) => {
                warn!(model = %attempt.model, status, details = %details, "Gemini rejected credentials, aborting");
                self.state = SearchState::FatalFailed(GenerationError::Auth { status });
            }
            Err(e) if e.is_not_found() => {
                debug!(model = %attempt.model, version = %attempt.version, "Model not available on this API version");
                self.last_not_found = Some(e);
            }
            Err(e) => {
                warn!(model = %attempt.model, version = %attempt.version, error = %e, "Gemini attempt failed, trying next candidate");
                self.last_error = Some(e);
            }
        }
    }

    fn finish(self) -> Result<String, GenerationError> {
        match self.state {
            SearchState::Succeeded(text) => Ok(text),
            SearchState::FatalFailed(e) => Err(e),
            SearchState::Trying | SearchState::Exhausted => {
                match self.last_error.or(self.last_not_found) {
                    Some(last) => Err(GenerationError::Exhausted {
                        attempts: self.attempts,
                        last,
                    }),
                    None => Err(GenerationError::NoContent),
                }
            }
        }
    }
}

/// Gemini client that applies the model/version fallback to every call.
#[derive(Debug, Clone)]
pub struct ModelGateway {
    client: reqwest::Client,
    config: GeminiConfig,
    base: Url,
}

impl ModelGateway {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Self::with_client(client, config)
    }

    /// Reuse an existing client; the configured timeout still applies per request.
    pub fn with_client(client: reqwest::Client, config: GeminiConfig) -> Result<Self, GenerationError> {
        let base = Url::parse(&config.api_base).map_err(|e| GenerationError::InvalidBase {
            base: config.api_base.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(GenerationError::InvalidBase {
                base: config.api_base.clone(),
                reason: "not a hierarchical URL".to_string(),
            });
        }
        Ok(Self { client, config, base })
    }

    /// Generate text for `prompt` using the configured candidate models.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerationRequest::new(prompt, self.config.candidate_models());
        self.execute(&request).await
    }

    #[instrument(skip(self, request), fields(prompt_len = request.prompt.len(), models = request.models.len()))]
    pub async fn execute(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = GeminiRequest::from_prompt(&request.prompt);
        let mut search = Search::new(request.plan());

        while let Some(attempt) = search.next_attempt() {
            let outcome = self.attempt(&attempt, &body).await;
            search.record(&attempt, outcome);
        }

        search.finish()
    }

    async fn attempt(&self, attempt: &Attempt, body: &GeminiRequest) -> Result<String, AttemptError> {
        let method = format!("{}:generateContent", attempt.model);
        let url = self.endpoint(&[&attempt.version, "models", &method]);

        debug!(model = %attempt.model, version = %attempt.version, "Sending request to Gemini API");

        let res = self
            .client
            .post(url)
            .timeout(self.config.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError::from_reqwest(e, self.config.timeout))?;

        let status = res.status();
        debug!(status = %status, "Gemini API response received");

        let text = res
            .text()
            .await
            .map_err(|e| AttemptError::from_reqwest(e, self.config.timeout))?;

        if !status.is_success() {
            return Err(AttemptError::from_status(status.as_u16(), error_details(text)));
        }

        let resp: GeminiResponse =
            serde_json::from_str(&text).map_err(|e| AttemptError::Decode(e.to_string()))?;

        if let Some(error) = resp.error.as_ref() {
            return Err(AttemptError::Api(error.message.clone()));
        }

        resp.first_text()
            .map(str::to_string)
            .ok_or(AttemptError::EmptyContent)
    }

    /// Model names visible to this key, from the first API version that answers.
    #[instrument(skip(self))]
    pub async fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        for version in API_VERSIONS {
            let url = self.endpoint(&[version, "models"]);
            let res = self
                .client
                .get(url)
                .timeout(self.config.timeout)
                .send()
                .await
                .map_err(|e| GenerationError::Listing(AttemptError::from_reqwest(e, self.config.timeout)))?;

            let status = res.status();
            let text = res
                .text()
                .await
                .map_err(|e| GenerationError::Listing(AttemptError::from_reqwest(e, self.config.timeout)))?;

            if !status.is_success() {
                match AttemptError::from_status(status.as_u16(), error_details(text)) {
                    e if e.is_not_found() => {
                        debug!(version, "Model listing not available on this API version");
                        continue;
                    }
                    AttemptError::Unauthorized { status, .. } => {
                        return Err(GenerationError::Auth { status })
                    }
                    e => return Err(GenerationError::Listing(e)),
                }
            }

            let list: GeminiModelList = serde_json::from_str(&text)
                .map_err(|e| GenerationError::Listing(AttemptError::Decode(e.to_string())))?;
            return Ok(list.models.into_iter().map(|m| m.name).collect());
        }

        Ok(Vec::new())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        // The api key is a query parameter; never log the resulting URL
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        url
    }
}

/// Error body as text, re-serialized compactly when it is JSON.
fn error_details(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .map(|v| v.to_string())
        .unwrap_or(body)
}
