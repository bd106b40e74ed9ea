use serde::{Deserialize, Serialize};

/// Lifecycle of the scroll anchor for one conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollPhase {
    /// Nothing rendered yet.
    #[default]
    Uninitialized,
    /// First scroll-to-bottom issued, waiting for it to land.
    Settling,
    Steady,
    /// An older page is being fetched or its height correction is pending.
    Fetching,
}

/// Per-conversation scroll bookkeeping.
///
/// Only the controller mutates these fields; everything outside the
/// `scroll` module reads them through accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollState {
    pub(super) settled: bool,
    pub(super) was_at_bottom: bool,
    pub(super) last_message_count: usize,
    pub(super) last_message_id: Option<String>,
    pub(super) fetch_in_flight: bool,
    pub(super) last_scroll_top: Option<f64>,
    pub(super) last_trigger_offset: Option<f64>,
}

impl ScrollState {
    /// Initial scroll-to-bottom has completed.
    pub fn settled(&self) -> bool {
        self.settled
    }

    /// Viewer sat at the bottom right before the last feed mutation.
    pub fn was_at_bottom(&self) -> bool {
        self.was_at_bottom
    }

    pub fn last_message_count(&self) -> usize {
        self.last_message_count
    }

    pub fn last_message_id(&self) -> Option<&str> {
        self.last_message_id.as_deref()
    }

    /// Busy flag for older-page fetches.
    pub fn fetch_in_flight(&self) -> bool {
        self.fetch_in_flight
    }

    pub fn last_scroll_top(&self) -> Option<f64> {
        self.last_scroll_top
    }

    pub fn last_trigger_offset(&self) -> Option<f64> {
        self.last_trigger_offset
    }
}
