use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    HttpRequestError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("Other error: {0}")]
    Other(String),
}
