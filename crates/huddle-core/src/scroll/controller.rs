use super::state::{ScrollPhase, ScrollState};
use super::viewport::{ScrollCommand, Viewport};
use crate::config::ScrollConfig;
use crate::feed::FeedTail;
use std::time::Instant;

/// Geometry captured right before older messages are prepended.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingAnchor {
    prev_scroll_height: f64,
    prev_scroll_top: f64,
    polls: u32,
}

#[derive(Debug, Clone, Copy)]
struct ScrollSample {
    viewport: Viewport,
    at: Instant,
}

/// Owns the scroll position policy of one conversation feed.
///
/// The controller never touches the view itself. The rendering layer reports
/// layout commits and scroll events, and applies the returned
/// [`ScrollCommand`]s. Time is always passed in, so the debounce window and
/// the post-correction cooldown are deterministic under test.
///
/// Transitions:
///
/// ```text
/// Uninitialized --first non-empty layout--> Settling --next layout--> Steady
/// Steady --trigger policy / begin_fetch--> Fetching
/// Fetching --prepend measured / empty page / failure--> Steady
/// ```
#[derive(Debug, Clone)]
pub struct ScrollAnchorController {
    config: ScrollConfig,
    phase: ScrollPhase,
    state: ScrollState,
    viewport: Option<Viewport>,
    pending_sample: Option<ScrollSample>,
    cooldown_until: Option<Instant>,
    anchor: Option<PendingAnchor>,
    /// Trigger offset as it was when the current fetch started.
    offset_before_fetch: Option<f64>,
}

impl ScrollAnchorController {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            phase: ScrollPhase::Uninitialized,
            state: ScrollState::default(),
            viewport: None,
            pending_sample: None,
            cooldown_until: None,
            anchor: None,
            offset_before_fetch: None,
        }
    }

    pub fn phase(&self) -> ScrollPhase {
        self.phase
    }

    pub fn state(&self) -> &ScrollState {
        &self.state
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    /// Last geometry reported by the rendering layer.
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn is_fetching(&self) -> bool {
        self.state.fetch_in_flight
    }

    /// Returns to `Uninitialized` and clears every tracked field.
    pub fn reset(&mut self) {
        tracing::debug!("[ScrollAnchor] reset from {:?}", self.phase);
        *self = Self::new(self.config.clone());
    }

    // ============================================================================
    // Layout
    // ============================================================================

    /// Handles a completed layout pass.
    ///
    /// `feed_len` is the number of messages rendered in this pass.
    pub fn on_layout(
        &mut self,
        viewport: Viewport,
        feed_len: usize,
        now: Instant,
    ) -> Option<ScrollCommand> {
        self.viewport = Some(viewport);

        match self.phase {
            ScrollPhase::Uninitialized => {
                if feed_len == 0 {
                    return None;
                }
                tracing::debug!("[ScrollAnchor] first render of {} messages", feed_len);
                self.phase = ScrollPhase::Settling;
                Some(ScrollCommand::ScrollToBottom { animated: false })
            }
            ScrollPhase::Settling => {
                self.phase = ScrollPhase::Steady;
                self.state.settled = true;
                self.state.last_scroll_top = Some(viewport.scroll_top);
                None
            }
            ScrollPhase::Fetching => self.apply_anchor(viewport, now),
            ScrollPhase::Steady => None,
        }
    }

    fn apply_anchor(&mut self, viewport: Viewport, now: Instant) -> Option<ScrollCommand> {
        let mut anchor = self.anchor.take()?;

        let added_height = viewport.scroll_height - anchor.prev_scroll_height;
        if added_height <= 0.0 {
            anchor.polls += 1;
            if anchor.polls >= self.config.max_layout_polls {
                tracing::warn!(
                    "[ScrollAnchor] prepended content not measured after {} layouts; giving up",
                    anchor.polls
                );
                self.finish_fetch(Some(now));
            } else {
                self.anchor = Some(anchor);
            }
            return None;
        }

        let target = anchor.prev_scroll_top + added_height;
        tracing::debug!(
            "[ScrollAnchor] prepend added {}px, scroll_top {} -> {}",
            added_height,
            anchor.prev_scroll_top,
            target
        );

        // The top edge moved, so the recorded trigger position no longer exists.
        self.state.last_trigger_offset = None;
        self.state.last_scroll_top = Some(target);
        self.viewport = Some(Viewport {
            scroll_top: target,
            ..viewport
        });
        self.finish_fetch(Some(now));

        Some(ScrollCommand::SetScrollTop(target))
    }

    fn finish_fetch(&mut self, cooldown_from: Option<Instant>) {
        self.phase = ScrollPhase::Steady;
        self.state.fetch_in_flight = false;
        self.anchor = None;
        self.offset_before_fetch = None;
        self.pending_sample = None;
        self.cooldown_until = cooldown_from.map(|now| now + self.config.cooldown());
    }

    // ============================================================================
    // Scroll events and the pagination trigger
    // ============================================================================

    /// Records a raw scroll event. Evaluation happens in [`Self::poll`].
    pub fn on_scroll(&mut self, viewport: Viewport, now: Instant) {
        self.viewport = Some(viewport);

        if self.phase != ScrollPhase::Steady {
            return;
        }

        if let Some(until) = self.cooldown_until {
            if now < until {
                // the correction's own scroll event becomes the new baseline
                self.state.last_scroll_top = Some(viewport.scroll_top);
                return;
            }
            self.cooldown_until = None;
        }

        self.pending_sample = Some(ScrollSample { viewport, at: now });
    }

    /// Evaluates the latest scroll sample once the debounce window is quiet.
    ///
    /// Returns [`ScrollCommand::FetchOlder`] when the trigger policy fires;
    /// the caller must then fetch exactly one older page.
    pub fn poll(&mut self, now: Instant, has_more: bool) -> Option<ScrollCommand> {
        let sample = self.pending_sample?;
        if now.duration_since(sample.at) < self.config.debounce() {
            return None;
        }
        self.pending_sample = None;

        if self.phase != ScrollPhase::Steady {
            return None;
        }
        self.evaluate(sample.viewport, has_more)
    }

    fn evaluate(&mut self, viewport: Viewport, has_more: bool) -> Option<ScrollCommand> {
        let cfg = &self.config;
        let scroll_top = viewport.scroll_top;
        let previous = self.state.last_scroll_top.replace(scroll_top);
        let delta = previous.map_or(0.0, |prev| scroll_top - prev);

        let zone = cfg
            .trigger_max_px
            .min(cfg.trigger_viewport_ratio * viewport.client_height);
        let distance = viewport.distance_from_top();

        let near_top = distance <= zone;
        let scrolling_up = delta < 0.0;
        let decisive = -delta > cfg.min_upward_delta_px || distance <= cfg.top_snap_px;
        let moved_since_trigger = self
            .state
            .last_trigger_offset
            .is_none_or(|offset| (scroll_top - offset).abs() > cfg.retrigger_distance_px);

        if !(near_top && scrolling_up && decisive && moved_since_trigger) {
            return None;
        }
        if self.state.fetch_in_flight || !has_more {
            tracing::debug!(
                "[ScrollAnchor] trigger suppressed (in_flight={}, has_more={})",
                self.state.fetch_in_flight,
                has_more
            );
            return None;
        }

        tracing::debug!("[ScrollAnchor] pagination triggered at scroll_top={}", scroll_top);
        self.offset_before_fetch = self.state.last_trigger_offset.replace(scroll_top);
        self.phase = ScrollPhase::Fetching;
        self.state.fetch_in_flight = true;
        Some(ScrollCommand::FetchOlder)
    }

    /// Claims the busy flag for a fetch that was not started by scrolling.
    ///
    /// Returns false if a fetch is already in flight or the feed has not
    /// settled yet.
    pub fn begin_fetch(&mut self) -> bool {
        if self.state.fetch_in_flight || self.phase != ScrollPhase::Steady {
            return false;
        }
        self.phase = ScrollPhase::Fetching;
        self.state.fetch_in_flight = true;
        self.offset_before_fetch = self.state.last_trigger_offset;
        self.pending_sample = None;
        true
    }

    /// Records that an older page has been merged into the feed.
    ///
    /// Must be called before the next layout is reported, so the stored
    /// geometry is still the one measured before the prepend.
    pub fn on_page_prepended(&mut self, tail: &FeedTail, added: usize) {
        self.state.last_message_count = tail.len;

        if self.phase != ScrollPhase::Fetching {
            tracing::warn!(
                "[ScrollAnchor] page prepended outside of a fetch (phase {:?})",
                self.phase
            );
        }
        if added == 0 {
            self.finish_fetch(None);
            return;
        }

        let before = self.viewport.unwrap_or_default();
        self.phase = ScrollPhase::Fetching;
        self.anchor = Some(PendingAnchor {
            prev_scroll_height: before.scroll_height,
            prev_scroll_top: before.scroll_top,
            polls: 0,
        });
    }

    /// Releases the busy flag after a failed fetch.
    ///
    /// The trigger offset goes back to its value from before the attempt,
    /// so the next qualifying scroll retries.
    pub fn on_fetch_failed(&mut self) {
        tracing::debug!("[ScrollAnchor] fetch failed; back to steady");
        self.state.last_trigger_offset = self.offset_before_fetch;
        self.finish_fetch(None);
    }

    // ============================================================================
    // Arrivals
    // ============================================================================

    /// Captures whether the viewer is at the bottom. Call right before the
    /// feed is mutated by an arrival or a send.
    pub fn before_feed_mutation(&mut self) {
        let threshold = self.config.bottom_threshold_px;
        self.state.was_at_bottom = self
            .viewport
            .is_none_or(|viewport| viewport.is_at_bottom(threshold));
    }

    /// Applies the auto-scroll policy after the feed changed.
    ///
    /// Scrolls to the bottom (animated) only if the trailing message id
    /// changed and the viewer was at the bottom or sent the message.
    pub fn on_feed_changed(&mut self, tail: &FeedTail, viewer_id: &str) -> Option<ScrollCommand> {
        let previous_id = self.state.last_message_id.take();
        self.state.last_message_count = tail.len;
        self.state.last_message_id = tail.last_id.clone();

        let changed = tail.last_id.is_some() && tail.last_id != previous_id;
        if !changed || self.state.fetch_in_flight || self.phase != ScrollPhase::Steady {
            return None;
        }

        let is_own = tail.last_sender_id.as_deref() == Some(viewer_id);
        if self.state.was_at_bottom || is_own {
            Some(ScrollCommand::ScrollToBottom { animated: true })
        } else {
            None
        }
    }
}
