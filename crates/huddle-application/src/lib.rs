//! Use cases of the Huddle conversation feed.
//!
//! - `mute`: process-wide mute registry and the delivery agent's view of it
//! - `read_receipt`: debounced "mark as read"
//! - `session`: one active conversation wired to its collaborators

pub mod mute;
pub mod read_receipt;
pub mod session;

pub use mute::{MuteRegistry, NotificationGate, MUTED_CONVERSATIONS_KEY};
pub use read_receipt::ReadReceiptDebouncer;
pub use session::{ConversationSession, FeedSnapshot, SendReceipt, SessionCollaborators, Viewer};
