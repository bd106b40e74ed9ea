use huddle_core::delivery::DeliveryPath;
use huddle_core::scroll::ScrollCommand;
use huddle_core::{Message, SenderRole};
use serde::{Deserialize, Serialize};

/// The person using the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: String,
    pub name: String,
    pub role: SenderRole,
}

impl Viewer {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: SenderRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

/// What the renderer needs to draw the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub conversation: Option<String>,
    /// Oldest first.
    pub messages: Vec<Message>,
    pub loading_initial: bool,
    pub fetching_older: bool,
    pub has_more: bool,
}

/// Result of [`super::ConversationSession::send_message`].
#[derive(Debug, Clone, PartialEq)]
pub struct SendReceipt {
    /// Server-confirmed copy.
    pub message: Message,
    pub path: DeliveryPath,
    /// Scroll the renderer should apply, if any.
    pub scroll: Option<ScrollCommand>,
}
