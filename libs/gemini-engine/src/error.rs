use std::time::Duration;

use thiserror::Error;

/// Why a single (model, version) attempt did not produce text.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The model is not served on this API version.
    #[error("Gemini API 404 Not Found: {details}")]
    NotFound { details: String },

    #[error("Gemini API {status}: {details}")]
    Unauthorized { status: u16, details: String },

    #[error("Gemini API {status}: {details}")]
    Status { status: u16, details: String },

    #[error("Gemini request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Gemini request failed: {0}")]
    Transport(String),

    #[error("Gemini API Error: {0}")]
    Api(String),

    #[error("failed to decode Gemini response: {0}")]
    Decode(String),

    #[error("No content returned from Gemini")]
    EmptyContent,
}

impl AttemptError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AttemptError::NotFound { .. })
    }

    pub(crate) fn from_status(status: u16, details: String) -> Self {
        match status {
            404 => AttemptError::NotFound { details },
            401 | 403 => AttemptError::Unauthorized { status, details },
            _ => AttemptError::Status { status, details },
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            AttemptError::Timeout(timeout)
        } else {
            AttemptError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Gemini authentication/permission error ({status}). Check API key and access.")]
    Auth { status: u16 },

    #[error("Gemini API error: {last}. You can set a working model via GEMINI_MODEL in .env")]
    Exhausted {
        attempts: usize,
        #[source]
        last: AttemptError,
    },

    #[error("Gemini API returned no content. Set GEMINI_MODEL to a supported model (e.g., gemini-1.5-flash).")]
    NoContent,

    #[error("Listing Gemini models failed: {0}")]
    Listing(#[source] AttemptError),

    #[error("Invalid Gemini API base '{base}': {reason}")]
    InvalidBase { base: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(AttemptError::from_status(404, String::new()).is_not_found());
        assert!(matches!(
            AttemptError::from_status(401, String::new()),
            AttemptError::Unauthorized { status: 401, .. }
        ));
        assert!(matches!(
            AttemptError::from_status(403, String::new()),
            AttemptError::Unauthorized { status: 403, .. }
        ));

        let server = AttemptError::from_status(500, "boom".into());
        assert!(!server.is_not_found());
        assert_eq!(server.to_string(), "Gemini API 500: boom");

        let quota = AttemptError::from_status(429, String::new());
        assert!(matches!(quota, AttemptError::Status { status: 429, .. }));
    }

    #[test]
    fn test_exhausted_message_mentions_override() {
        let err = GenerationError::Exhausted {
            attempts: 4,
            last: AttemptError::Status { status: 500, details: "internal".into() },
        };
        let msg = err.to_string();
        assert!(msg.contains("Gemini API 500: internal"));
        assert!(msg.contains("GEMINI_MODEL"));
    }
}
