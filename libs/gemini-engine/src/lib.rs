use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

mod error;
mod gateway;

pub use error::{AttemptError, GenerationError};
pub use gateway::{
    Attempt, AttemptPlan, GeminiConfig, GenerationRequest, ModelGateway, API_VERSIONS,
    DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS, FALLBACK_MODELS,
};

// --- Shared Utilities ---

/// Extract the domain/host from a URL string safely.
/// Returns "unknown" if the URL cannot be parsed.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

// --- Shared Logging ---

/// Initialize structured logging with JSON format in production (when RUST_LOG is set),
/// or pretty format for local development.
pub fn init_logging() {
    init_logging_with(std::io::stdout);
}

/// Same as [`init_logging`] but writes to stderr, for processes whose stdout
/// carries a protocol stream.
pub fn init_logging_to_stderr() {
    init_logging_with(std::io::stderr);
}

fn init_logging_with<W>(writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let is_production = std::env::var("RUST_LOG").is_ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if is_production {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .json()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(false)
            .try_init();
    }
}

// --- Gemini Structs ---
#[derive(Serialize, Deserialize, Debug)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
}

impl GeminiRequest {
    /// Single-turn request carrying one text part.
    pub fn from_prompt(text: &str) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: text.to_string() }],
            }],
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct GeminiCandidate {
    // Absent when the candidate was blocked by safety filters
    pub content: Option<GeminiContent>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
    pub error: Option<GeminiError>,
}

impl GeminiResponse {
    /// `candidates[0].content.parts[0].text`, if present and not blank.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .first()
            .map(|part| part.text.as_str())
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Deserialize, Debug)]
pub struct GeminiError {
    pub message: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct GeminiModelList {
    #[serde(default)]
    pub models: Vec<GeminiModelInfo>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiModelInfo {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://hnrss.org/frontpage"), "hnrss.org");
        assert_eq!(extract_domain("not a url"), "unknown");
    }

    #[test]
    fn test_gemini_request_serialization() {
        let request = GeminiRequest::from_prompt("Hello, Gemini!");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contents": [{"parts": [{"text": "Hello, Gemini!"}]}]})
        );
    }

    #[test]
    fn test_gemini_response_deserialization_success() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "Hello from Gemini!"}]
                }
            }]
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.first_text(), Some("Hello from Gemini!"));
    }

    #[test]
    fn test_gemini_response_deserialization_error() {
        let json = r#"{
            "error": {
                "message": "API key invalid"
            }
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(response.candidates.is_none());
        assert_eq!(response.error.unwrap().message, "API key invalid");
    }

    #[test]
    fn test_first_text_missing_pieces() {
        let empty: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.first_text(), None);

        let blocked: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert_eq!(blocked.first_text(), None);

        let blank: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "  \n"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(blank.first_text(), None);

        let no_parts: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"content": {}}]}"#).unwrap();
        assert_eq!(no_parts.first_text(), None);
    }

    #[test]
    fn test_model_list_deserialization() {
        let list: GeminiModelList = serde_json::from_str(
            r#"{"models": [{"name": "models/gemini-pro", "displayName": "Gemini Pro"}]}"#,
        )
        .unwrap();
        assert_eq!(list.models.len(), 1);
        assert_eq!(list.models[0].name, "models/gemini-pro");
    }
}
