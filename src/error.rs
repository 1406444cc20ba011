//! Error types for the store, the LLM API and user actions.
//!
//! Every [`ActionError`] is recovered at the dispatcher: it ends the action and
//! its `Display` text becomes the error toast.

use thiserror::Error;

/// Key-value store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the remote language API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API key not found. Set it with `chordlate set-key <KEY>`.")]
    MissingKey,

    /// Non-2xx answer; carries the message extracted from the error body.
    #[error("API request failed: {0}")]
    Status(String),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected API response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Please select text first")]
    NoSelection,

    /// Grammar actions on text that is not English.
    #[error("{0} only works for English text")]
    WrongLanguage(&'static str),

    #[error("Please set your DeepSeek API key first (chordlate set-key <KEY>)")]
    MissingApiKey,

    #[error("{0} failed: {1}")]
    Api(&'static str, #[source] ApiError),

    #[error("{0} failed. Empty response received.")]
    EmptyResult(&'static str),

    /// The cursor-translation target was edited while the request was out.
    #[error("Text changed while translating; nothing was replaced")]
    TextChanged,

    #[error("Could not read settings: {0}")]
    Storage(#[from] StoreError),
}

impl ActionError {
    /// Wraps an API failure for `action`, surfacing a missing key as such.
    pub fn api(action: &'static str, err: ApiError) -> Self {
        match err {
            ApiError::MissingKey => ActionError::MissingApiKey,
            other => ActionError::Api(action, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_from_api_is_reported_as_missing_key() {
        let err = ActionError::api("Translation", ApiError::MissingKey);
        assert!(matches!(err, ActionError::MissingApiKey));
        assert!(err.to_string().starts_with("Please set your DeepSeek API key"));
    }

    #[test]
    fn api_failure_message_is_carried_into_the_toast_text() {
        let err = ActionError::api("Grammar analysis", ApiError::Status("Insufficient Balance".into()));
        assert_eq!(
            err.to_string(),
            "Grammar analysis failed: API request failed: Insufficient Balance"
        );
    }
}
