//! Error types for the Huddle conversation core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for every Huddle crate.
///
/// Variants follow the failure taxonomy of the feed: transient history
/// failures are recovered locally, send failures on the fallback path are
/// surfaced, durable-store failures abort a mute toggle as a whole, and
/// stale results are rejected at the session boundary.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChatError {
    /// Older-page or first-page request failed
    #[error("History fetch failed: {0}")]
    Fetch(String),

    /// The request/response fallback could not deliver a message
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The live push path is not usable
    #[error("Push channel unavailable: {0}")]
    PushUnavailable(String),

    /// Durable store write failed
    #[error("Durable store write failed: {0}")]
    DurableWrite(String),

    /// Durable store read failed
    #[error("Durable store read failed: {0}")]
    DurableRead(String),

    /// A page or arrival belongs to a conversation that is no longer active
    #[error("Stale result for conversation '{actual}' (active: '{expected}')")]
    StaleConversation { expected: String, actual: String },

    /// An operation needs an open conversation
    #[error("No active conversation")]
    NoActiveConversation,

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Fetch error
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    /// Creates a SendFailed error
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::SendFailed(message.into())
    }

    /// Creates a PushUnavailable error
    pub fn push_unavailable(message: impl Into<String>) -> Self {
        Self::PushUnavailable(message.into())
    }

    /// Creates a DurableWrite error
    pub fn durable_write(message: impl Into<String>) -> Self {
        Self::DurableWrite(message.into())
    }

    /// Creates a DurableRead error
    pub fn durable_read(message: impl Into<String>) -> Self {
        Self::DurableRead(message.into())
    }

    /// Creates a StaleConversation error
    pub fn stale(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::StaleConversation {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a stale-conversation rejection
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleConversation { .. })
    }

    /// Check if this error comes from the durable store
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::DurableWrite(_) | Self::DurableRead(_))
    }

    /// Whether the failure should be shown to the user.
    ///
    /// Transient fetch failures, push-path failures and stale results are
    /// handled internally; everything else is reported by the UI collaborator.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            Self::Fetch(_) | Self::PushUnavailable(_) | Self::StaleConversation { .. }
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ChatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ChatError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, ChatError>`.
pub type Result<T> = std::result::Result<T, ChatError>;
