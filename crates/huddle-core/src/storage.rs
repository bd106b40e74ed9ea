//! Durable key-value store trait.

use crate::error::Result;
use async_trait::async_trait;

/// A key-value store that outlives the interactive process.
///
/// Both the interactive session and the background delivery agent read it,
/// so implementations must not keep state the other process cannot see.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Reads a value.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: Key present
    /// - `Ok(None)`: Key never written
    /// - `Err(ChatError::DurableRead)`: Store unreachable or unreadable
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    ///
    /// Returns `Err(ChatError::DurableWrite)` if the value was not persisted.
    async fn put(&self, key: &str, value: String) -> Result<()>;
}
