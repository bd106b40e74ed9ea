//! Feed domain module.
//!
//! # Module Structure
//!
//! - `page_store`: Merges paginated history and live arrivals (`PageStore`)
//! - `source`: Repository-style trait for paginated history (`HistorySource`)

mod page_store;
mod source;

pub use page_store::{FeedTail, PageStore, Reconciliation};
pub use source::HistorySource;
