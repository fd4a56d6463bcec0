//! Error types for wxmedia core functionality.

use thiserror::Error;

/// Main error type for wxmedia core.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed input data.
    #[error("Data parsing error: {0}")]
    Parse(String),
}

/// Result type for wxmedia core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

/// Convenience trait for converting errors to core Error type
pub trait IntoCoreError<T> {
    /// Convert to core error with context
    fn with_context(self, context: &str) -> Result<T>;
}

impl<T, E> IntoCoreError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context(self, context: &str) -> Result<T> {
        self.map_err(|e| Error::parse(format!("{}: {}", context, e)))
    }
}
