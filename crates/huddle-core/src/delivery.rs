//! Live delivery and side-channel traits.

use crate::error::Result;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Which path delivered an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPath {
    Push,
    Fallback,
}

/// Live push channel keyed by `(conversation, viewer)`.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Opens the live connection for a conversation on behalf of a viewer.
    async fn connect(&self, conversation_id: &str, viewer_id: &str) -> Result<()>;

    /// Whether the connection can currently carry a send.
    fn is_ready(&self) -> bool;

    /// Sends a message and returns the server-confirmed copy.
    async fn send(&self, conversation_id: &str, body: &str) -> Result<Message>;

    /// Subscribes to messages pushed for a conversation.
    fn subscribe(&self, conversation_id: &str) -> broadcast::Receiver<Message>;
}

/// Request/response send used when the push path is not ready or fails.
#[async_trait]
pub trait FallbackSender: Send + Sync {
    async fn send(&self, conversation_id: &str, body: &str) -> Result<Message>;
}

/// "Mark as read" side-channel.
#[async_trait]
pub trait ReadMarker: Send + Sync {
    async fn mark_read(&self, conversation_id: &str) -> Result<()>;
}
