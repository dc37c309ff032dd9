//! Tracker error types
//!
//! Every operation reports failure synchronously through [`TrackerError`].
//! Nothing is retried internally; a failed call leaves the store untouched.

use crate::lifecycle::GrantStatus;
use thiserror::Error;

/// Error category for structured logging and caller-side dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input (non-positive amount, bad date, blank name)
    ValidationError,
    /// Lifecycle precondition violated
    InvalidTransitionError,
    /// Referenced grant does not exist
    NotFoundError,
    /// `tracker.toml` or env misconfigured
    ConfigError,
    /// Errors opening, migrating or querying the SQLite store
    StoreError,
    /// Unexpected logic bugs
    InternalError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidTransitionError => "INVALID_TRANSITION",
            Self::NotFoundError => "NOT_FOUND",
            Self::ConfigError => "CONFIG_ERROR",
            Self::StoreError => "STORE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller can fix the failure by changing its input
    pub fn is_caller_error(self) -> bool {
        matches!(
            self,
            Self::ValidationError | Self::InvalidTransitionError | Self::NotFoundError
        )
    }
}

/// Tracker error with category and context
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("invalid transition for grant {grant_id}: {from} -> {to}")]
    InvalidTransition {
        grant_id: String,
        from: GrantStatus,
        to: GrantStatus,
    },

    #[error("grant not found: {id}")]
    NotFound { id: String },

    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl TrackerError {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::ValidationError,
            Self::InvalidTransition { .. } => ErrorCategory::InvalidTransitionError,
            Self::NotFound { .. } => ErrorCategory::NotFoundError,
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::Store { .. } => ErrorCategory::StoreError,
            Self::Internal { .. } => ErrorCategory::InternalError,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(
        grant_id: impl Into<String>,
        from: GrantStatus,
        to: GrantStatus,
    ) -> Self {
        Self::InvalidTransition {
            grant_id: grant_id.into(),
            from,
            to,
        }
    }

    /// Create a not-found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Create a store error with source
    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;
