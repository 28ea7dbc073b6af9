//! # AppError
//!
//! Centralized error handling for skillfeed.
//! Every remote port and every engine operation reports failures through
//! this taxonomy so the view layer can pick a toast without inspecting strings.

use crate::models::EntityKind;
use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all sf-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Transport failure (connection refused, timeout, DNS)
    #[error("network error: {0}")]
    Network(String),

    /// Missing or rejected credential. Never retried.
    #[error("unauthorized: {0}")]
    Auth(String),

    /// The server (or a local pre-check) rejected the payload
    #[error("validation error: {0}")]
    Validation(String),

    /// Stale id, e.g. an entity deleted by another client
    #[error("{0} not found with ID {1}")]
    NotFound(EntityKind, Uuid),

    /// Anything the adapters cannot classify (undecodable body, bad config)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Severity routing for the transient message shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

impl AppError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound(kind, id)
    }

    /// Severity the view layer should use when surfacing this error.
    #[must_use]
    pub fn toast_level(&self) -> ToastLevel {
        match self {
            Self::Validation(_) => ToastLevel::Info,
            Self::Network(_) | Self::NotFound(..) => ToastLevel::Warning,
            Self::Auth(_) | Self::Internal(_) => ToastLevel::Error,
        }
    }

    /// Short message suitable for a toast.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Check your network connection and retry".to_string(),
            Self::Auth(_) => "Please log in again to continue".to_string(),
            Self::Validation(reason) => reason.clone(),
            Self::NotFound(kind, _) => format!("This {kind} no longer exists"),
            Self::Internal(_) => "An unexpected error occurred".to_string(),
        }
    }
}

/// A specialized Result type for skillfeed logic.
pub type Result<T> = std::result::Result<T, AppError>;
