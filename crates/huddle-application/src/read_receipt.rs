use huddle_core::delivery::ReadMarker;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Coalesces "mark as read" requests.
///
/// Each request restarts the window; only the last conversation requested
/// within a window is marked. Failures are logged and not retried.
pub struct ReadReceiptDebouncer {
    marker: Arc<dyn ReadMarker>,
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ReadReceiptDebouncer {
    pub fn new(marker: Arc<dyn ReadMarker>, window: Duration) -> Self {
        Self {
            marker,
            window,
            pending: Mutex::new(None),
        }
    }

    /// Schedules a mark for `conversation_id`, replacing any pending one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&self, conversation_id: &str) {
        let marker = self.marker.clone();
        let window = self.window;
        let conversation_id = conversation_id.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            match marker.mark_read(&conversation_id).await {
                Ok(()) => tracing::debug!("[ReadReceipt] marked {} as read", conversation_id),
                Err(e) => tracing::warn!(
                    "[ReadReceipt] mark_read for {} failed: {}",
                    conversation_id,
                    e
                ),
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Drops a pending mark, if any.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }
}

impl Drop for ReadReceiptDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
