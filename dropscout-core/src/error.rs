// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Twitch error: {0}")]
    Twitch(String),

    #[error("Twitch auth error: {0}")]
    TwitchAuth(String),

    #[error("Discord error: {0}")]
    Discord(String),

    /// Distinct condition for the game catalog being unusable, so command
    /// handlers can translate it into a "try again shortly" reply instead of
    /// surfacing a generic error.
    #[error("Game catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
