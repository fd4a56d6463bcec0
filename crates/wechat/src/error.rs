//! Error types for WeChat media recovery.

use crate::decrypt::DecryptionError;
use thiserror::Error;

/// Main error type for WeChat media operations.
///
/// Codec problems never appear here: a blob that decrypts and parses always
/// yields bytes, falling back to the undecoded stream.
#[derive(Error, Debug)]
pub enum WeChatError {
    /// I/O error (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad magic, truncated header, or no locatable partition
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Decryption failure
    #[error("Decryption failed: {0}")]
    Decryption(#[from] DecryptionError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Other errors wrapped in anyhow
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<wxmedia_core::Error> for WeChatError {
    fn from(err: wxmedia_core::Error) -> Self {
        match err {
            wxmedia_core::Error::Io(e) => WeChatError::Io(e),
            other => WeChatError::Config(other.to_string()),
        }
    }
}

/// Result alias for WeChat media operations.
pub type WeChatResult<T> = Result<T, WeChatError>;
