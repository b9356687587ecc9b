use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Input rejected locally; nothing was sent to the backend.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid backend url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend rejected request with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Decode failures mean the backend sent a shape or enum value this client
    /// does not know; they are logged louder than network hiccups.
    pub fn is_decode(&self) -> bool {
        matches!(self, ClientError::Decode(_))
    }
}
