//! Unified error types for the Berth workspace.
//!
//! Every failure a lifecycle command or registry read can produce is one of
//! these variants. None of them is process-fatal: each is scoped to the
//! single operation that raised it and is surfaced to the caller as-is.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BerthError {
    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The container is running and the operation requires it stopped.
    #[error("container {id} is running; stop it first")]
    InUse {
        /// Identifier of the running container.
        id: String,
    },

    /// A run specification or request body is malformed.
    #[error("invalid spec: {message}")]
    InvalidSpec {
        /// Description of what is wrong with the input.
        message: String,
    },

    /// Another mutating operation holds the container's lock.
    #[error("container {id} is busy with another operation")]
    Busy {
        /// Identifier of the contended container.
        id: String,
    },

    /// The container runtime failed or did not answer in time.
    #[error("runtime {operation} failed: {message}")]
    Runtime {
        /// Runtime operation that failed.
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The container runtime cannot be reached for reads.
    #[error("runtime unavailable: {message}")]
    Unavailable {
        /// Description of why the runtime is unreachable.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl BerthError {
    /// Shorthand for a missing container.
    pub fn container_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "container",
            id: id.into(),
        }
    }

    /// Shorthand for an invalid spec.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    /// Shorthand for a runtime failure.
    pub fn runtime(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Runtime {
            operation,
            message: message.into(),
        }
    }

    /// Stable machine-readable name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InUse { .. } => "in_use",
            Self::InvalidSpec { .. } => "invalid_spec",
            Self::Busy { .. } => "busy",
            Self::Runtime { .. } => "runtime",
            Self::Unavailable { .. } => "unavailable",
            Self::Io { .. } => "io",
            Self::Config { .. } => "config",
            Self::Serialization { .. } => "serialization",
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BerthError>;
