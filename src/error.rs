//! Error types for the Veil sync engine.
//!
//! This module provides a unified error type [`VeilError`] for all Veil
//! operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Connectivity**: the store cannot be reached at startup; fatal.
//! - **Feed**: the change feed was disrupted; transient and retryable.
//! - **Write**: a batched target write failed; logged, batch dropped.
//! - **Event**: a change event with an unsupported shape; rejected per event.
//! - **Configuration**: invalid settings or missing configuration.
//!
//! # Example
//!
//! ```rust
//! use veil::error::{Result, VeilError};
//!
//! fn handle_error(err: &VeilError) {
//!     if err.is_retryable() {
//!         println!("Retrying after backoff...");
//!     } else {
//!         println!("Fatal error: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Main error type for Veil operations.
#[derive(Error, Debug)]
pub enum VeilError {
    // Connectivity errors (fatal at startup)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // Change feed errors (transient, retried with fixed backoff)
    #[error("Change feed error: {0}")]
    Feed(String),

    // Target write errors
    #[error("Bulk write failed: {0}")]
    WriteFailed(String),

    // Event errors
    #[error("Unsupported change event: {0}")]
    UnsupportedEvent(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VeilError {
    /// Check if error is retryable.
    ///
    /// Feed disruptions are the only retryable class: the listener
    /// re-subscribes after a fixed backoff, indefinitely, until stopped.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VeilError::Feed(_))
    }
}

impl From<serde_json::Error> for VeilError {
    fn from(e: serde_json::Error) -> Self {
        VeilError::Serialization(e.to_string())
    }
}

/// Result type alias for Veil operations.
pub type Result<T> = std::result::Result<T, VeilError>;
