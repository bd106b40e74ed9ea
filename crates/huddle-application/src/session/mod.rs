//! Conversation session.
//!
//! This module wires one active conversation to its collaborators: the
//! history source, the realtime channel, the mute registry and the read
//! marker.

mod conversation;
mod snapshot;

pub use conversation::{ConversationSession, SessionCollaborators};
pub use snapshot::{FeedSnapshot, SendReceipt, Viewer};
