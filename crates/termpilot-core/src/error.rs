//! Error types for termpilot.

use thiserror::Error;

/// Main error type for termpilot operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A bounded wait expired before its condition held
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Name of the operation that gave up
        operation: String,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Text wait expired without the pattern appearing on screen
    #[error("wait_for_text timed out after {timeout_ms}ms: pattern {pattern:?} not found")]
    PatternNotFound {
        /// Pattern that was searched for
        pattern: String,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Transport was used before `spawn()`
    #[error("Transport is not spawned")]
    TransportNotSpawned,

    /// `spawn()` was called twice
    #[error("Transport is already spawned")]
    TransportAlreadySpawned,

    /// Transport was used after `dispose()`
    #[error("Transport is disposed")]
    TransportDisposed,

    /// PTY-related errors
    #[error("PTY error: {0}")]
    PtyError(String),

    /// Script injection requested for a shell without a known encoding
    #[error("Unsupported shell: {0}")]
    UnsupportedShell(String),

    /// Strict shell-integration enablement could not be verified
    #[error("Shell integration failed: {0}")]
    ShellIntegration(String),

    /// Invalid key string
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid terminal dimensions
    #[error("Invalid dimensions: {rows}x{cols}")]
    InvalidDimensions {
        /// Number of rows
        rows: u16,
        /// Number of columns
        cols: u16,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Build a timeout error for a named operation.
    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// True for every error produced by an expired wait.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::PatternNotFound { .. })
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
