use thiserror::Error;

/// Top-level error type for the zmai system.
///
/// Storage backends and configuration loading report through this type.
/// Higher layers (`zmai-chat`, `zmai-api`) wrap it in their own error enums
/// so the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ZmaiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("API error: {0}")]
    Api(String),
}

impl From<toml::de::Error> for ZmaiError {
    fn from(err: toml::de::Error) -> Self {
        ZmaiError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ZmaiError {
    fn from(err: serde_json::Error) -> Self {
        ZmaiError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for zmai operations.
pub type Result<T> = std::result::Result<T, ZmaiError>;
