//! Error types for RelayLog
//!
//! This module defines the error taxonomy used throughout the pipeline.
//! Configuration and programmer errors (unknown levels, missing registry)
//! surface synchronously; transport failures are wrapped per transport and
//! aggregated when a bulk lifecycle operation touches several of them.

use crate::transports::traits::TransportError;
use thiserror::Error;

/// A single transport failure, tagged with the transport that produced it.
#[derive(Error, Debug)]
#[error("transport '{transport}' failed: {source}")]
pub struct TransportFailure {
    /// Diagnostic name of the transport
    pub transport: String,
    /// Underlying failure
    #[source]
    pub source: TransportError,
}

impl TransportFailure {
    pub fn new<S: Into<String>>(transport: S, source: TransportError) -> Self {
        Self {
            transport: transport.into(),
            source,
        }
    }
}

/// Main error type for RelayLog operations
#[derive(Error, Debug)]
pub enum RelayLogError {
    /// A level name or rank that the active registry does not define
    #[error("Unknown level: {0}")]
    UnknownLevel(String),

    /// Invalid level set or conflicting configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Threshold or show options mutated before a registry exists
    #[error("Log manager is not initialized")]
    NotInitialized,

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigFileMissing(String),

    /// Failure reported by one transport
    #[error(transparent)]
    TransportIo(#[from] TransportFailure),

    /// Failures collected across several transports during a bulk operation
    #[error("{} transport(s) failed: {}", .0.len(), join_failures(.0))]
    TransportFailures(Vec<TransportFailure>),

    /// I/O errors
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML parsing error: {source}")]
    TomlError {
        #[from]
        source: toml::de::Error,
    },

    /// Generic internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

fn join_failures(failures: &[TransportFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for RelayLog operations
pub type Result<T> = std::result::Result<T, RelayLogError>;

impl RelayLogError {
    /// Create a new unknown level error
    pub fn unknown_level<S: Into<String>>(level: S) -> Self {
        Self::UnknownLevel(level.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(transport: S, source: TransportError) -> Self {
        Self::TransportIo(TransportFailure::new(transport, source))
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Collapse collected failures: `Ok` when empty, a single failure as-is,
    /// several as an aggregate.
    pub fn from_failures(mut failures: Vec<TransportFailure>) -> Result<()> {
        match failures.len() {
            0 => Ok(()),
            1 => Err(Self::TransportIo(failures.remove(0))),
            _ => Err(Self::TransportFailures(failures)),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::IoError { .. } => true,
            Self::TransportIo(_) | Self::TransportFailures(_) => true,
            Self::UnknownLevel(_) => false,
            Self::ConfigurationError(_) => false,
            Self::NotInitialized => false,
            _ => false,
        }
    }

    /// Get the error category for logging purposes
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownLevel(_) => "level",
            Self::ConfigurationError(_) | Self::ConfigFileMissing(_) => "config",
            Self::NotInitialized => "initialization",
            Self::TransportIo(_) | Self::TransportFailures(_) => "transport",
            Self::IoError { .. } => "io",
            Self::SerializationError { .. } => "serialization",
            Self::TomlError { .. } => "toml",
            Self::InternalError(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation() {
        let config_err = RelayLogError::config("no default level");
        assert!(matches!(config_err, RelayLogError::ConfigurationError(_)));
        assert_eq!(
            config_err.to_string(),
            "Configuration error: no default level"
        );

        let level_err = RelayLogError::unknown_level("VERBOSE");
        assert_eq!(level_err.to_string(), "Unknown level: VERBOSE");
    }

    #[test]
    fn test_error_from_conversions() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let err: RelayLogError = io_error.into();
        assert!(matches!(err, RelayLogError::IoError { .. }));

        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json").unwrap_err();
        let err: RelayLogError = json_error.into();
        assert!(matches!(err, RelayLogError::SerializationError { .. }));
    }

    #[test]
    fn test_from_failures() {
        assert!(RelayLogError::from_failures(Vec::new()).is_ok());

        let single = RelayLogError::from_failures(vec![TransportFailure::new(
            "file",
            TransportError::Closed,
        )])
        .unwrap_err();
        assert!(matches!(single, RelayLogError::TransportIo(_)));
        assert!(single.to_string().contains("file"));

        let many = RelayLogError::from_failures(vec![
            TransportFailure::new("a", TransportError::Closed),
            TransportFailure::new("b", TransportError::Generic("boom".to_string())),
        ])
        .unwrap_err();
        match &many {
            RelayLogError::TransportFailures(failures) => assert_eq!(failures.len(), 2),
            other => panic!("Expected aggregate, got {:?}", other),
        }
        let text = many.to_string();
        assert!(text.starts_with("2 transport(s) failed"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn test_error_recoverability() {
        assert!(RelayLogError::transport("net", TransportError::Closed).is_recoverable());
        assert!(!RelayLogError::config("bad").is_recoverable());
        assert!(!RelayLogError::unknown_level("X").is_recoverable());
        assert!(!RelayLogError::NotInitialized.is_recoverable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(RelayLogError::config("test").category(), "config");
        assert_eq!(RelayLogError::unknown_level("test").category(), "level");
        assert_eq!(RelayLogError::NotInitialized.category(), "initialization");
        assert_eq!(
            RelayLogError::transport("t", TransportError::Closed).category(),
            "transport"
        );
        assert_eq!(RelayLogError::internal("test").category(), "internal");
    }

    #[test]
    fn test_error_chain() {
        use std::error::Error as _;

        let err = RelayLogError::transport(
            "file",
            TransportError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "Access denied")),
        );
        assert!(err.to_string().contains("Access denied"));
        assert!(err.source().is_some());
    }
}
