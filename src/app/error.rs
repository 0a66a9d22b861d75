use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url} after retries")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No content returned for {0}")]
    MissingContent(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("{0}")]
    Other(String),
}

impl From<url::ParseError> for WatcherError {
    fn from(err: url::ParseError) -> Self {
        WatcherError::InvalidUrl(err.to_string())
    }
}

impl From<crate::config::ConfigError> for WatcherError {
    fn from(err: crate::config::ConfigError) -> Self {
        WatcherError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WatcherError>;
