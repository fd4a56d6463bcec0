//! Core types, errors, and configuration for wxmedia
//!
//! This crate provides the foundational pieces shared by the media recovery
//! pipeline: format constants, the output type handed to callers, logging
//! configuration, and the error type used by the ambient layers.

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod types;

// Re-exports for convenience
pub use config::{LogFormat, LogLevel, LoggingConfig};
pub use error::{Error, Result};
pub use types::*;
