//! Provider error taxonomy, mirrored onto `codesm_core::ErrorKind` at the
//! orchestrator boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP transport error: {0}")]
    Http(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("provider returned an error: {0}")]
    Provider(String),
    #[error("response format error: {message} (raw: {raw_response})")]
    ResponseFormat { message: String, raw_response: String },
    #[error("JSON error: {0}")]
    Json(String),
    #[error("unsupported: {0}")]
    NotImplemented(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_status() && err.status().map(|s| s.as_u16()) == Some(401) {
            ProviderError::Auth(err.to_string())
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Json(err.to_string())
    }
}

impl ProviderError {
    /// Maps a provider error onto the five ambient error kinds used for
    /// rendering errors back to the model or the user.
    pub fn kind(&self) -> codesm_core::ErrorKind {
        use codesm_core::ErrorKind;
        match self {
            ProviderError::Http(_) | ProviderError::Provider(_) => ErrorKind::ExternalService,
            ProviderError::Auth(_) => ErrorKind::ExternalService,
            ProviderError::InvalidRequest(_) => ErrorKind::UserInput,
            ProviderError::ResponseFormat { .. } | ProviderError::Json(_) => ErrorKind::Integrity,
            ProviderError::NotImplemented(_) => ErrorKind::Fatal,
        }
    }
}
