use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Missing required configuration key '{0}'")]
    MissingConfig(&'static str),
    #[error("Mask not found: {0}")]
    MaskNotFound(String),
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("JSON error: {0}")]
    Json(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Storage quota exceeded")]
    QuotaExceeded,
    #[error("Malformed response: {message}")]
    Malformed { message: String },
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

pub type Result<T> = std::result::Result<T, ControlError>;

// Helper conversions
impl From<serde_json::Error> for ControlError {
    fn from(e: serde_json::Error) -> Self { Self::Json(e.to_string()) }
}
impl From<rusqlite::Error> for ControlError {
    fn from(e: rusqlite::Error) -> Self { Self::Storage(e.to_string()) }
}
impl From<config::ConfigError> for ControlError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
