use reqwest::StatusCode;

/// Errors raised while talking to the chat endpoint or touching local state.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("stream interrupted: {0}")]
    Stream(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    /// True when the server answered but with a status meaning "nothing here".
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChatError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// A setting or option name that matches none of the known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl UnknownName {
    pub(crate) fn new(kind: &'static str, value: &str, expected: &'static str) -> Self {
        Self {
            kind,
            value: value.to_string(),
            expected,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
