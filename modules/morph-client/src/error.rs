use thiserror::Error;

pub type Result<T> = std::result::Result<T, MorphError>;

#[derive(Debug, Error)]
pub enum MorphError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for MorphError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MorphError::Parse(err.to_string())
        } else {
            MorphError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MorphError {
    fn from(err: serde_json::Error) -> Self {
        MorphError::Parse(err.to_string())
    }
}
