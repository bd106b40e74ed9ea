//! Domain layer for the Huddle team conversation feed.
//!
//! This crate holds the pure feed logic (page merging, scroll anchoring,
//! presentation rules) and the traits the outer layers implement.

pub mod config;
pub mod delivery;
pub mod error;
pub mod feed;
pub mod message;
pub mod presentation;
pub mod scroll;
pub mod storage;

// Re-export common error type
pub use error::{ChatError, Result};
pub use message::{DeliveryStatus, Message, Page, SenderRole};
