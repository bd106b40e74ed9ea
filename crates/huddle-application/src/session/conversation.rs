use super::snapshot::{FeedSnapshot, SendReceipt, Viewer};
use crate::mute::MuteRegistry;
use crate::read_receipt::ReadReceiptDebouncer;
use chrono::{DateTime, Local, TimeZone, Utc};
use huddle_core::config::HuddleConfig;
use huddle_core::delivery::ReadMarker;
use huddle_core::feed::{HistorySource, PageStore};
use huddle_core::message::LOCAL_ID_PREFIX;
use huddle_core::presentation::{Formatter, TimestampReveal};
use huddle_core::scroll::{ScrollAnchorController, ScrollCommand, ScrollPhase, ScrollState, Viewport};
use huddle_core::{ChatError, DeliveryStatus, Message, Result};
use huddle_interaction::RealtimeChannel;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct SessionCollaborators {
    pub history: Arc<dyn HistorySource>,
    pub channel: Arc<RealtimeChannel>,
    pub mutes: Arc<MuteRegistry>,
    pub read_marker: Arc<dyn ReadMarker>,
}

struct SessionState {
    /// Bumped on every `open`; async results started under an older value
    /// are discarded.
    generation: u64,
    conversation_id: Option<String>,
    store: PageStore,
    scroll: ScrollAnchorController,
    reveal: TimestampReveal,
    loading_initial: bool,
}

impl SessionState {
    fn active(&self) -> Result<(String, u64)> {
        self.conversation_id
            .clone()
            .map(|conversation_id| (conversation_id, self.generation))
            .ok_or(ChatError::NoActiveConversation)
    }
}

/// The active conversation of one viewer.
///
/// Owns the feed and its scroll state. The state lock is never held across
/// an await on a collaborator, so arrivals can be applied while a page
/// fetch or a send is outstanding.
pub struct ConversationSession {
    viewer: Viewer,
    formatter: Formatter,
    history: Arc<dyn HistorySource>,
    channel: Arc<RealtimeChannel>,
    mutes: Arc<MuteRegistry>,
    read_receipts: ReadReceiptDebouncer,
    state: Mutex<SessionState>,
}

impl ConversationSession {
    pub fn new(viewer: Viewer, config: &HuddleConfig, collaborators: SessionCollaborators) -> Self {
        let SessionCollaborators {
            history,
            channel,
            mutes,
            read_marker,
        } = collaborators;

        Self {
            viewer,
            formatter: Formatter::new(config.presentation.clone()),
            history,
            channel,
            mutes,
            read_receipts: ReadReceiptDebouncer::new(
                read_marker,
                config.session.read_receipt_debounce(),
            ),
            state: Mutex::new(SessionState {
                generation: 0,
                conversation_id: None,
                store: PageStore::default(),
                scroll: ScrollAnchorController::new(config.scroll.clone()),
                reveal: TimestampReveal::default(),
                loading_initial: false,
            }),
        }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub async fn conversation_id(&self) -> Option<String> {
        self.state.lock().await.conversation_id.clone()
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    /// Switches to `conversation_id` and loads its most recent page.
    ///
    /// A failed first fetch is returned. If another `open` started while
    /// this one was fetching, its page is dropped and `Ok(())` is returned.
    pub async fn open(&self, conversation_id: &str) -> Result<()> {
        let generation = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            state.conversation_id = Some(conversation_id.to_string());
            state.store.reset(Some(conversation_id));
            state.scroll.reset();
            state.reveal.clear();
            state.loading_initial = true;
            state.generation
        };
        tracing::debug!(
            "[ConversationSession] opening {} (generation {})",
            conversation_id,
            generation
        );

        self.channel.forget_seen().await;
        self.channel.connect(conversation_id, &self.viewer.id).await;
        self.read_receipts.request(conversation_id);

        let fetched = self.history.fetch_page(conversation_id, None).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(
                "[ConversationSession] discarding first page of {}: generation {} superseded by {}",
                conversation_id,
                generation,
                state.generation
            );
            return Ok(());
        }
        state.loading_initial = false;

        let page = fetched.map_err(|e| {
            tracing::error!(
                "[ConversationSession] first page of {} failed: {}",
                conversation_id,
                e
            );
            e
        })?;
        state.store.append_older_page(conversation_id, page)?;

        let tail = state.store.tail();
        state.scroll.on_feed_changed(&tail, &self.viewer.id);
        Ok(())
    }

    // ============================================================================
    // Scrolling and pagination
    // ============================================================================

    /// Reports a completed layout pass.
    pub async fn on_layout(&self, viewport: Viewport, now: Instant) -> Option<ScrollCommand> {
        let mut state = self.state.lock().await;
        let feed_len = state.store.len();
        state.scroll.on_layout(viewport, feed_len, now)
    }

    /// Reports a scroll event.
    pub async fn on_scroll(&self, viewport: Viewport, now: Instant) {
        self.state.lock().await.scroll.on_scroll(viewport, now);
    }

    /// Runs the debounced pagination trigger.
    ///
    /// When the trigger fires, the older page is fetched and merged before
    /// this returns `Some(ScrollCommand::FetchOlder)`; the renderer should
    /// then lay out and report the new geometry through [`Self::on_layout`].
    pub async fn poll(&self, now: Instant) -> Option<ScrollCommand> {
        let command = {
            let mut state = self.state.lock().await;
            let has_more = state.store.has_more();
            state.scroll.poll(now, has_more)
        };

        if command == Some(ScrollCommand::FetchOlder) {
            self.fetch_older().await;
        }
        command
    }

    /// Fetches one older page outside of the scroll trigger.
    ///
    /// Returns the number of messages added. Ignored while another fetch is
    /// in flight or when history is exhausted. Failures are logged and
    /// reported as zero.
    pub async fn load_older(&self) -> usize {
        {
            let mut state = self.state.lock().await;
            if state.conversation_id.is_none() || !state.store.has_more() {
                return 0;
            }
            if state.scroll.is_fetching() {
                tracing::debug!("[ConversationSession] load_older ignored: fetch in flight");
                return 0;
            }
            if !state.scroll.begin_fetch() {
                tracing::debug!(
                    "[ConversationSession] load_older ignored: feed not settled ({:?})",
                    state.scroll.phase()
                );
                return 0;
            }
        }
        self.fetch_older().await
    }

    /// Performs the fetch for a busy flag that is already claimed.
    async fn fetch_older(&self) -> usize {
        let (conversation_id, generation, cursor) = {
            let mut state = self.state.lock().await;
            let Ok((conversation_id, generation)) = state.active() else {
                state.scroll.on_fetch_failed();
                return 0;
            };
            let cursor = state.store.next_cursor().map(str::to_string);
            (conversation_id, generation, cursor)
        };

        let fetched = self
            .history
            .fetch_page(&conversation_id, cursor.as_deref())
            .await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(
                "[ConversationSession] discarding older page of {}: conversation changed",
                conversation_id
            );
            return 0;
        }

        let merged = fetched.and_then(|page| state.store.append_older_page(&conversation_id, page));
        match merged {
            Ok(added) => {
                let tail = state.store.tail();
                state.scroll.on_page_prepended(&tail, added);
                added
            }
            Err(e) => {
                tracing::warn!(
                    "[ConversationSession] older page of {} failed: {}",
                    conversation_id,
                    e
                );
                state.scroll.on_fetch_failed();
                0
            }
        }
    }

    // ============================================================================
    // Arrivals and sending
    // ============================================================================

    /// Applies one incoming message and decides on auto-scroll.
    ///
    /// Messages for another conversation and ids already in the feed are
    /// ignored.
    pub async fn handle_arrival(&self, message: Message) -> Option<ScrollCommand> {
        let mut state = self.state.lock().await;

        if state.conversation_id.as_deref() != Some(message.team_id.as_str()) {
            tracing::debug!(
                "[ConversationSession] discarding arrival {} for {}: not active",
                message.id,
                message.team_id
            );
            return None;
        }
        if state.store.contains(&message.id) {
            return None;
        }

        state.scroll.before_feed_mutation();
        match state.store.apply_arrival(message) {
            Ok(true) => {
                let tail = state.store.tail();
                state.scroll.on_feed_changed(&tail, &self.viewer.id)
            }
            Ok(false) => None,
            Err(e) => {
                tracing::debug!("[ConversationSession] arrival rejected: {}", e);
                None
            }
        }
    }

    /// Drains the realtime channel into the feed.
    ///
    /// Returns the last scroll command produced, if any.
    pub async fn receive_pending(&self) -> Option<ScrollCommand> {
        let mut command = None;
        for message in self.channel.pump().await {
            if let Some(next) = self.handle_arrival(message).await {
                command = Some(next);
            }
        }
        command
    }

    /// Sends `body` with an optimistic entry in the feed.
    ///
    /// The entry is replaced by the confirmed message on success and removed
    /// on failure. A fallback failure is returned as `ChatError::SendFailed`.
    pub async fn send_message(&self, body: &str) -> Result<SendReceipt> {
        let (conversation_id, generation, temp_id, optimistic_scroll) = {
            let mut state = self.state.lock().await;
            let (conversation_id, generation) = state.active()?;
            let temp_id = format!("{}{}", LOCAL_ID_PREFIX, uuid::Uuid::new_v4());

            let pending = Message {
                id: temp_id.clone(),
                team_id: conversation_id.clone(),
                sender_id: self.viewer.id.clone(),
                sender_name: self.viewer.name.clone(),
                sender_role: self.viewer.role.clone(),
                body: body.to_string(),
                timestamp: Utc::now(),
                status: DeliveryStatus::Pending,
            };

            state.scroll.before_feed_mutation();
            state.store.insert_pending(pending)?;
            let tail = state.store.tail();
            let scroll = state.scroll.on_feed_changed(&tail, &self.viewer.id);
            (conversation_id, generation, temp_id, scroll)
        };

        let sent = self.channel.send(&conversation_id, body).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(
                "[ConversationSession] send to {} finished after conversation changed",
                conversation_id
            );
            return sent.map(|sent| SendReceipt {
                message: sent.message,
                path: sent.path,
                scroll: None,
            });
        }

        state.scroll.before_feed_mutation();
        match sent {
            Ok(sent) => {
                let outcome = state
                    .store
                    .confirm_pending(&temp_id, sent.message.clone())?;
                tracing::debug!(
                    "[ConversationSession] {} confirmed as {} ({:?})",
                    temp_id,
                    sent.message.id,
                    outcome
                );
                let tail = state.store.tail();
                let scroll = state.scroll.on_feed_changed(&tail, &self.viewer.id);
                Ok(SendReceipt {
                    message: sent.message,
                    path: sent.path,
                    scroll: scroll.or(optimistic_scroll),
                })
            }
            Err(e) => {
                state.store.discard_pending(&temp_id);
                let tail = state.store.tail();
                state.scroll.on_feed_changed(&tail, &self.viewer.id);
                tracing::error!(
                    "[ConversationSession] send to {} failed: {}",
                    conversation_id,
                    e
                );
                Err(e)
            }
        }
    }

    // ============================================================================
    // Queries
    // ============================================================================

    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.lock().await;
        FeedSnapshot {
            conversation: state.conversation_id.clone(),
            messages: state.store.feed(),
            loading_initial: state.loading_initial,
            fetching_older: state.scroll.is_fetching(),
            has_more: state.store.has_more(),
        }
    }

    pub async fn scroll_phase(&self) -> ScrollPhase {
        self.state.lock().await.scroll.phase()
    }

    pub async fn scroll_state(&self) -> ScrollState {
        self.state.lock().await.scroll.state().clone()
    }

    // ============================================================================
    // Mute
    // ============================================================================

    /// Whether the active conversation is muted. False when none is open.
    pub async fn is_muted(&self) -> bool {
        match self.conversation_id().await {
            Some(conversation_id) => self.mutes.is_muted(&conversation_id).await,
            None => false,
        }
    }

    /// Toggles mute for the active conversation and returns the new state.
    pub async fn toggle_mute(&self) -> Result<bool> {
        let conversation_id = self
            .conversation_id()
            .await
            .ok_or(ChatError::NoActiveConversation)?;
        let muted = self.mutes.toggle_mute(&conversation_id).await?;
        Ok(muted.contains(&conversation_id))
    }

    // ============================================================================
    // Rendering helpers
    // ============================================================================

    /// Whether a date separator goes above the message at `index`.
    pub async fn show_date_separator(&self, index: usize) -> bool {
        self.show_date_separator_at(index, &Local::now()).await
    }

    pub async fn show_date_separator_at<Tz: TimeZone>(
        &self,
        index: usize,
        now: &DateTime<Tz>,
    ) -> bool {
        let state = self.state.lock().await;
        let Some(current) = state.store.get(index) else {
            return false;
        };
        let previous = index.checked_sub(1).and_then(|i| state.store.get(i));
        self.formatter.should_show_date_separator(
            &current.timestamp,
            previous.map(|m| &m.timestamp),
            now,
        )
    }

    /// Label for the message at `index`, in local time.
    pub async fn date_label(&self, index: usize) -> Option<String> {
        self.date_label_at(index, &Local::now()).await
    }

    pub async fn date_label_at<Tz>(&self, index: usize, now: &DateTime<Tz>) -> Option<String>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let state = self.state.lock().await;
        let message = state.store.get(index)?;
        Some(self.formatter.format_date_label(&message.timestamp, now))
    }

    /// Reveals the timestamp of `message_id`, or hides it if it was shown.
    /// Returns the id now revealed.
    pub async fn toggle_timestamp(&self, message_id: &str) -> Option<String> {
        let mut state = self.state.lock().await;
        state.reveal.toggle(message_id).map(str::to_string)
    }

    pub async fn revealed_timestamp(&self) -> Option<String> {
        self.state.lock().await.reveal.selected().map(str::to_string)
    }

    /// Whether the row for `message_id` should show its timestamp.
    pub async fn is_timestamp_revealed(&self, message_id: &str) -> bool {
        self.state.lock().await.reveal.is_revealed(message_id)
    }
}
