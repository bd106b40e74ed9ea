//! History source trait.
//!
//! Defines the interface for paginated history retrieval.

use crate::error::Result;
use crate::message::Page;
use async_trait::async_trait;

/// An abstract source of historical messages for a conversation.
///
/// Implementations wrap the application's REST-style endpoint. Pages are
/// newest-first both within a page and across sequential fetches.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetches one page of history.
    ///
    /// # Arguments
    ///
    /// * `conversation_id` - The team conversation to read
    /// * `cursor` - `None` for the most recent page, otherwise the
    ///   `next_cursor` of the previously fetched page
    ///
    /// # Returns
    ///
    /// - `Ok(Page)`: Page fetched
    /// - `Err(ChatError::Fetch)`: Transient failure; callers retry on the next
    ///   qualifying interaction
    async fn fetch_page(&self, conversation_id: &str, cursor: Option<&str>) -> Result<Page>;
}
