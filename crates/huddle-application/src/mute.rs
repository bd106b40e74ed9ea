//! Per-conversation notification muting.
//!
//! The muted set lives in two places: a fast in-process cache read by the UI
//! and a durable store read by the background delivery agent. Writes go to
//! the durable store first; the cache only ever holds a set that was
//! successfully persisted.

use huddle_core::storage::DurableStore;
use huddle_core::{ChatError, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Durable key holding the muted conversation ids as a JSON array.
pub const MUTED_CONVERSATIONS_KEY: &str = "muted_conversations";

async fn read_durable_set(store: &dyn DurableStore) -> Result<BTreeSet<String>> {
    match store.get(MUTED_CONVERSATIONS_KEY).await? {
        None => Ok(BTreeSet::new()),
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            ChatError::durable_read(format!("{} is not a JSON array: {}", MUTED_CONVERSATIONS_KEY, e))
        }),
    }
}

/// Process-wide mute registry, shared by `Arc` across sessions.
pub struct MuteRegistry {
    store: Arc<dyn DurableStore>,
    cache: RwLock<BTreeSet<String>>,
    /// Serializes read-modify-write cycles on the durable set.
    toggle_lock: Mutex<()>,
}

impl MuteRegistry {
    /// Creates a registry with an empty cache. Call [`Self::hydrate`] to load
    /// the persisted set.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(BTreeSet::new()),
            toggle_lock: Mutex::new(()),
        }
    }

    /// Replaces the cache with the durable set.
    pub async fn hydrate(&self) -> Result<()> {
        let persisted = read_durable_set(self.store.as_ref()).await?;
        tracing::debug!("[MuteRegistry] hydrated {} muted conversations", persisted.len());
        *self.cache.write().await = persisted;
        Ok(())
    }

    /// Reads the cache only.
    pub async fn is_muted(&self, conversation_id: &str) -> bool {
        self.cache.read().await.contains(conversation_id)
    }

    pub async fn muted(&self) -> BTreeSet<String> {
        self.cache.read().await.clone()
    }

    /// Flips the mute state of `conversation_id` and returns the new set.
    ///
    /// The durable set is read, toggled and written; the cache is replaced
    /// with the written set only after the write succeeded. Any durable
    /// failure fails the whole toggle and leaves the cache untouched.
    pub async fn toggle_mute(&self, conversation_id: &str) -> Result<BTreeSet<String>> {
        let _guard = self.toggle_lock.lock().await;

        let mut next = read_durable_set(self.store.as_ref()).await.map_err(|e| {
            tracing::error!("[MuteRegistry] cannot read durable set: {}", e);
            e
        })?;
        let now_muted = if next.remove(conversation_id) {
            false
        } else {
            next.insert(conversation_id.to_string());
            true
        };

        let encoded = serde_json::to_string(&next)?;
        self.store
            .put(MUTED_CONVERSATIONS_KEY, encoded)
            .await
            .map_err(|e| {
                tracing::error!(
                    "[MuteRegistry] durable write for {} failed, cache unchanged: {}",
                    conversation_id,
                    e
                );
                e
            })?;

        *self.cache.write().await = next.clone();
        tracing::debug!(
            "[MuteRegistry] {} is now {}",
            conversation_id,
            if now_muted { "muted" } else { "unmuted" }
        );
        Ok(next)
    }
}

/// The background delivery agent's view of the mute set.
///
/// Reads the durable store on every call and never consults an in-process
/// cache.
#[derive(Clone)]
pub struct NotificationGate {
    store: Arc<dyn DurableStore>,
}

impl NotificationGate {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// Whether a notification should be shown for `conversation_id`.
    ///
    /// An unreadable store notifies.
    pub async fn should_notify(&self, conversation_id: &str) -> bool {
        match read_durable_set(self.store.as_ref()).await {
            Ok(muted) => !muted.contains(conversation_id),
            Err(e) => {
                tracing::warn!("[NotificationGate] durable read failed, notifying: {}", e);
                true
            }
        }
    }
}
