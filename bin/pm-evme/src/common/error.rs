use alloy_primitives::hex::FromHexError;
use paymaster_evm::{EnvelopeError, SignatureError};

/// Error types for the pm-evme commands
#[derive(Debug, thiserror::Error)]
pub enum PmEvmeError {
    /// Failed to read a file
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Invalid hex string
    #[error("Invalid hex string: {0}")]
    InvalidHex(#[from] FromHexError),

    /// Invalid JSON
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed transaction envelope
    #[error("Invalid transaction: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Sender could not be recovered
    #[error("Invalid signature: {0}")]
    Signature(#[from] SignatureError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Logging could not be set up
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Result type for the pm-evme commands
pub type Result<T> = std::result::Result<T, PmEvmeError>;
