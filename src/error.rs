//! Error types for StarNotary

use std::fmt;

#[derive(Debug, Clone)]
pub enum NotaryError {
    Store(String),
    ChainCorruption(String),
    InvalidSignature,
    ValidationNotFound,
    Crypto(String),
    Encoding(String),
    IoError(String),
}

impl fmt::Display for NotaryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotaryError::Store(msg) => write!(f, "Store error: {}", msg),
            NotaryError::ChainCorruption(msg) => write!(f, "Chain corruption: {}", msg),
            NotaryError::InvalidSignature => write!(f, "Invalid signature"),
            NotaryError::ValidationNotFound => write!(f, "No active validation request"),
            NotaryError::Crypto(msg) => write!(f, "Cryptographic error: {}", msg),
            NotaryError::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            NotaryError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for NotaryError {}

impl From<std::io::Error> for NotaryError {
    fn from(err: std::io::Error) -> Self {
        NotaryError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for NotaryError {
    fn from(err: serde_json::Error) -> Self {
        NotaryError::Encoding(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, NotaryError>;
