//! Tunable thresholds for the feed.
//!
//! Every section defaults to the production values so a missing or partial
//! `huddle.toml` is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct HuddleConfig {
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub presentation: PresentationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Scroll anchoring and pagination trigger thresholds, in pixels and
/// milliseconds.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScrollConfig {
    /// Quiet time after the last scroll event before the trigger policy runs.
    pub debounce_ms: u64,
    /// Time after a prepend correction during which scroll events are ignored.
    pub cooldown_ms: u64,
    /// Upper bound of the top trigger zone.
    pub trigger_max_px: f64,
    /// Top trigger zone as a fraction of the viewport height.
    pub trigger_viewport_ratio: f64,
    pub min_upward_delta_px: f64,
    /// Distance from the top that triggers regardless of scroll speed.
    pub top_snap_px: f64,
    /// Minimum travel from the last trigger position before triggering again.
    pub retrigger_distance_px: f64,
    /// Slack used to decide whether the viewer sits at the bottom.
    pub bottom_threshold_px: f64,
    /// Layout commits to wait for the prepended content to be measured.
    pub max_layout_polls: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            cooldown_ms: 50,
            trigger_max_px: 150.0,
            trigger_viewport_ratio: 0.2,
            min_upward_delta_px: 30.0,
            top_snap_px: 10.0,
            retrigger_distance_px: 100.0,
            bottom_threshold_px: 50.0,
            max_layout_polls: 5,
        }
    }
}

impl ScrollConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PresentationConfig {
    /// Minimum gap between two messages sent today for a separator.
    pub separator_gap_minutes: i64,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            separator_gap_minutes: 25,
        }
    }
}

impl PresentationConfig {
    pub fn separator_gap(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.separator_gap_minutes)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Window in which repeated opens of one conversation mark it read once.
    pub read_receipt_debounce_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_receipt_debounce_ms: 1000,
        }
    }
}

impl SessionConfig {
    pub fn read_receipt_debounce(&self) -> Duration {
        Duration::from_millis(self.read_receipt_debounce_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// File shared with the background delivery agent. Defaults to the
    /// platform config directory when absent.
    #[serde(default)]
    pub durable_store_path: Option<std::path::PathBuf>,
}
