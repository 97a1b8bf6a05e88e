//! Error types for shark-fin
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors that are part of the API;
//! the binary converts to `anyhow` at its boundary.
//!
//! A denial is not an error: `is_granted` answers `Ok(false)`. Errors are
//! reserved for misconfiguration and for a graph store that could not answer,
//! so a caller can always tell "denied" apart from "could not determine".

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Graph store error: {0}")]
    Store(#[from] StoreError),

    #[error("Access denied: {0}")]
    AccessDenied(#[from] AccessDeniedError),
}

/// Configuration-related errors, fatal at construction
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Action '{action}' is ranked 0, which is reserved for no access")]
    ZeroRank { action: String },

    #[error("Action '{action}' has no rank (referenced by {context})")]
    UnrankedAction { action: String, context: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn unranked(action: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnrankedAction {
            action: action.into(),
            context: context.into(),
        }
    }
}

/// Graph relation store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Graph store error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unauthorized: graph store rejected the credentials")]
    Unauthorized,

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Request timeout after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Invalid response from graph store: {0}")]
    InvalidResponse(String),

    #[error("Graph store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Create an appropriate error from an HTTP status code and response body
    pub fn from_response(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => StoreError::Unauthorized,
            404 => StoreError::NotFound {
                resource: "requested command".into(),
            },
            503 => StoreError::Unavailable(if body.is_empty() {
                "service unavailable".to_string()
            } else {
                body.to_string()
            }),
            _ => StoreError::Api {
                status,
                message: if body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.to_string()
                },
            },
        }
    }
}

/// Raised by `SharkFin::require` when a check is denied
#[derive(Error, Debug)]
#[error("user '{user}' may not '{action}' on '{target}': {reason}")]
pub struct AccessDeniedError {
    pub user: String,
    pub action: String,
    pub target: String,
    pub reason: String,
}

impl AccessDeniedError {
    pub fn new(
        user: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            action: action.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for graph store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
