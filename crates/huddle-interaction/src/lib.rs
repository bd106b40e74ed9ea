//! Live message delivery for Huddle conversations.
//!
//! [`RealtimeChannel`] sends over the push path when it is ready and falls
//! back to request/response otherwise. Incoming messages are deduplicated by
//! id before they reach the registered arrival handlers.

pub mod channel;
pub mod local_push;

pub use channel::{ArrivalHandler, RealtimeChannel, SentMessage};
pub use local_push::LocalPushChannel;
