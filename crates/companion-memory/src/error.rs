//! Error types for companion-memory.

use thiserror::Error;

use crate::config::ConfigValidationError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the memory lifecycle components
#[derive(Error, Debug)]
pub enum Error {
    /// A memory, turn or archive entry is absent
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Bad configuration, too few merge ids, out-of-range factors, wrong entry point
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A collaborator (memory store, vector index) failed
    #[error("store failure: {message}")]
    StoreFailure { message: String },

    /// A single item of a batch operation was skipped
    #[error("skipped {id}: {reason}")]
    Skipped { id: String, reason: String },

    // Database errors
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors surfaced by third-party collaborator implementations
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a store failure error
    pub fn store_failure(message: impl Into<String>) -> Self {
        Self::StoreFailure {
            message: message.into(),
        }
    }

    /// Create a skipped-item error
    pub fn skipped(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Skipped {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// True for collaborator failures, including backend-specific ones
    pub fn is_store_failure(&self) -> bool {
        match self {
            Self::StoreFailure { .. } | Self::Other(_) => true,
            #[cfg(feature = "sqlite")]
            Self::Database(_) => true,
            _ => false,
        }
    }
}

impl From<ConfigValidationError> for Error {
    fn from(err: ConfigValidationError) -> Self {
        Self::invalid_argument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::not_found("Memory", "m-1");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Memory"));
        assert!(err.to_string().contains("m-1"));

        let err = Error::invalid_argument("need at least 2 ids");
        assert!(err.is_invalid_argument());
        assert!(!err.is_not_found());

        let err = Error::store_failure("disk full");
        assert!(err.is_store_failure());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_config_error_becomes_invalid_argument() {
        let err: Error = ConfigValidationError::InvalidValue {
            field: "cleanup.batch_size".into(),
            message: "must be greater than 0".into(),
        }
        .into();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("cleanup.batch_size"));
    }

    #[test]
    fn test_anyhow_is_store_failure() {
        let err: Error = anyhow::anyhow!("remote index unavailable").into();
        assert!(err.is_store_failure());
    }
}
