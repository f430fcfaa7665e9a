use onchain_firewall::{BundleError, ConfigError};

/// Error types for fwctl commands
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Failed to read or write a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON input
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid private key
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// Bundle could not be signed or verified
    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    /// Scenario deployment could not be applied
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type for fwctl commands
pub type Result<T> = std::result::Result<T, CliError>;
