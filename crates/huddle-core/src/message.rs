//! Conversation message types.
//!
//! This module contains the message and page types shared by the history
//! source, the live channel and the feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix used for client-generated ids of optimistic messages.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Role of the sender inside the team.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Player,
    Coach,
    Manager,
    Admin,
    Parent,
    Other(String),
}

/// Whether a message has been acknowledged by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Authoritative copy from the server or the push channel.
    #[default]
    Confirmed,
    /// Locally composed, waiting for acknowledgment.
    Pending,
}

/// A single message in a team conversation.
///
/// `id` is unique within a conversation across every delivery path; two
/// deliveries of the same logical message carry the same `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable unique identifier.
    pub id: String,
    /// Team (conversation) the message belongs to.
    pub team_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: SenderRole,
    /// Text content.
    pub body: String,
    /// When the server accepted the message.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: DeliveryStatus,
}

impl Message {
    /// Returns true if the id was generated locally for an optimistic send.
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }

    pub fn is_pending(&self) -> bool {
        self.status == DeliveryStatus::Pending
    }
}

/// One newest-first batch of historical messages plus a continuation cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Messages ordered newest-first.
    pub results: Vec<Message>,
    /// Opaque token for the next older page, `None` when history is exhausted.
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn new(results: Vec<Message>, next_cursor: Option<String>) -> Self {
        Self {
            results,
            next_cursor,
        }
    }

    /// Checks that timestamps are non-increasing.
    pub fn is_newest_first(&self) -> bool {
        self.results
            .windows(2)
            .all(|pair| pair[0].timestamp >= pair[1].timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
