use crate::error::{ChatError, Result};
use crate::message::{DeliveryStatus, Message, Page};
use std::collections::{HashSet, VecDeque};

/// Trailing edge of the feed, used to decide on auto-scroll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedTail {
    pub len: usize,
    pub last_id: Option<String>,
    pub last_sender_id: Option<String>,
}

/// Outcome of reconciling an optimistic message with its confirmed copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The pending entry now carries the confirmed id.
    Replaced,
    /// The confirmed copy was already delivered; the pending entry was dropped.
    AlreadyPresent,
    /// No pending entry was found; the confirmed copy was appended.
    Inserted,
}

/// Accumulates fetched pages and live arrivals into one chronological feed.
///
/// The feed is kept ascending by timestamp after every mutation and holds
/// each message id at most once, regardless of which path delivered it.
#[derive(Debug, Default)]
pub struct PageStore {
    conversation_id: Option<String>,
    messages: VecDeque<Message>,
    ids: HashSet<String>,
    has_more: bool,
    next_cursor: Option<String>,
    pages_loaded: usize,
}

impl PageStore {
    /// Creates an empty store bound to a conversation.
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            ..Self::default()
        }
    }

    /// Clears every message and rebinds the store.
    pub fn reset(&mut self, conversation_id: Option<&str>) {
        tracing::debug!(
            "[PageStore] reset: {:?} -> {:?} ({} messages dropped)",
            self.conversation_id,
            conversation_id,
            self.messages.len()
        );
        *self = Self {
            conversation_id: conversation_id.map(str::to_string),
            ..Self::default()
        };
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    fn ensure_current(&self, conversation_id: &str) -> Result<()> {
        match self.conversation_id.as_deref() {
            Some(current) if current == conversation_id => Ok(()),
            Some(current) => Err(ChatError::stale(current, conversation_id)),
            None => Err(ChatError::NoActiveConversation),
        }
    }

    /// Prepends a page of older history.
    ///
    /// `conversation_id` is the conversation the page was requested for; a
    /// page for any other conversation is rejected. Messages already present
    /// are skipped. Returns the number of messages added.
    pub fn append_older_page(&mut self, conversation_id: &str, page: Page) -> Result<usize> {
        self.ensure_current(conversation_id)?;

        let ordered = page.is_newest_first();
        let Page {
            mut results,
            next_cursor,
        } = page;

        if !ordered {
            tracing::warn!(
                "[PageStore] page for {} is not newest-first; sorting {} messages",
                conversation_id,
                results.len()
            );
            results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }

        self.has_more = next_cursor.is_some();
        self.next_cursor = next_cursor;
        self.pages_loaded += 1;

        let mut added = 0;
        for message in results {
            if !self.ids.insert(message.id.clone()) {
                continue;
            }
            self.messages.push_front(message);
            added += 1;
        }

        self.restore_order();
        tracing::debug!(
            "[PageStore] page {} for {}: +{} messages (total {}, has_more={})",
            self.pages_loaded,
            conversation_id,
            added,
            self.messages.len(),
            self.has_more
        );
        Ok(added)
    }

    /// Adds one live message unless its id is already in the feed.
    ///
    /// Returns `Ok(true)` if the message was added.
    pub fn apply_arrival(&mut self, message: Message) -> Result<bool> {
        self.ensure_current(&message.team_id)?;

        if self.ids.contains(&message.id) {
            tracing::debug!("[PageStore] duplicate arrival {} ignored", message.id);
            return Ok(false);
        }

        self.ids.insert(message.id.clone());
        self.insert_chronologically(message);
        Ok(true)
    }

    /// Adds a locally composed message ahead of its acknowledgment.
    pub fn insert_pending(&mut self, mut message: Message) -> Result<()> {
        message.status = DeliveryStatus::Pending;
        self.apply_arrival(message).map(|_| ())
    }

    /// Replaces a pending message with its server-confirmed copy.
    pub fn confirm_pending(
        &mut self,
        temp_id: &str,
        mut confirmed: Message,
    ) -> Result<Reconciliation> {
        self.ensure_current(&confirmed.team_id)?;
        confirmed.status = DeliveryStatus::Confirmed;

        if self.ids.contains(&confirmed.id) {
            self.discard_pending(temp_id);
            return Ok(Reconciliation::AlreadyPresent);
        }

        match self.position_of(temp_id) {
            Some(index) => {
                self.ids.remove(temp_id);
                self.ids.insert(confirmed.id.clone());
                self.messages[index] = confirmed;
                self.restore_order();
                Ok(Reconciliation::Replaced)
            }
            None => {
                self.apply_arrival(confirmed)?;
                Ok(Reconciliation::Inserted)
            }
        }
    }

    /// Drops a pending message after a failed send.
    pub fn discard_pending(&mut self, temp_id: &str) -> bool {
        match self.position_of(temp_id) {
            Some(index) => {
                self.messages.remove(index);
                self.ids.remove(temp_id);
                true
            }
            None => false,
        }
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.messages.iter().rposition(|m| m.id == id)
    }

    fn insert_chronologically(&mut self, message: Message) {
        let index = self
            .messages
            .iter()
            .rposition(|m| m.timestamp <= message.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.messages.insert(index, message);
    }

    fn restore_order(&mut self) {
        let ascending = self
            .messages
            .iter()
            .zip(self.messages.iter().skip(1))
            .all(|(a, b)| a.timestamp <= b.timestamp);
        if !ascending {
            tracing::warn!("[PageStore] feed out of order after merge; re-sorting");
            self.messages
                .make_contiguous()
                .sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        }
    }

    /// Snapshot of the feed, oldest first.
    pub fn feed(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True while the most recently fetched page carried a cursor.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn tail(&self) -> FeedTail {
        let last = self.messages.back();
        FeedTail {
            len: self.messages.len(),
            last_id: last.map(|m| m.id.clone()),
            last_sender_id: last.map(|m| m.sender_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::fixtures::{message, page};

    fn ids(store: &PageStore) -> Vec<String> {
        store.messages().map(|m| m.id.clone()).collect()
    }

    fn expected(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
        range.map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_first_page_is_reversed_into_ascending_feed() {
        let mut store = PageStore::new("team-42");
        let added = store
            .append_older_page("team-42", page(100, 81, Some("c1")))
            .unwrap();

        assert_eq!(added, 20);
        assert_eq!(ids(&store), expected(81..=100));
        assert!(store.has_more());
        assert_eq!(store.next_cursor(), Some("c1"));
        assert_eq!(store.tail().last_id.as_deref(), Some("100"));
    }

    #[test]
    fn test_sequential_pages_stay_ascending() {
        let mut store = PageStore::new("team-42");
        store
            .append_older_page("team-42", page(100, 81, Some("c1")))
            .unwrap();
        store
            .append_older_page("team-42", page(80, 61, Some("c2")))
            .unwrap();
        store.append_older_page("team-42", page(60, 55, None)).unwrap();

        assert_eq!(ids(&store), expected(55..=100));
        assert!(!store.has_more());
        assert_eq!(store.next_cursor(), None);

        let feed = store.feed();
        assert!(feed.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_has_more_is_false_before_any_page() {
        let store = PageStore::new("team-42");
        assert!(!store.has_more());
        assert!(store.is_empty());
    }

    #[test]
    fn test_arrival_dedup_on_id() {
        let mut store = PageStore::new("team-42");
        store
            .append_older_page("team-42", page(100, 81, Some("c1")))
            .unwrap();

        assert!(store.apply_arrival(message(101, "bo")).unwrap());
        assert!(!store.apply_arrival(message(101, "bo")).unwrap());
        assert!(!store.apply_arrival(message(90, "ana")).unwrap());

        assert_eq!(store.len(), 21);
        assert_eq!(store.tail().last_id.as_deref(), Some("101"));
        assert_eq!(store.tail().last_sender_id.as_deref(), Some("bo"));
    }

    #[test]
    fn test_page_overlapping_live_arrivals_is_deduplicated() {
        let mut store = PageStore::new("team-42");
        store.apply_arrival(message(100, "ana")).unwrap();

        let added = store
            .append_older_page("team-42", page(100, 91, Some("c1")))
            .unwrap();

        assert_eq!(added, 9);
        assert_eq!(ids(&store), expected(91..=100));
    }

    #[test]
    fn test_late_arrival_is_inserted_in_order() {
        let mut store = PageStore::new("team-42");
        store.apply_arrival(message(10, "ana")).unwrap();
        store.apply_arrival(message(12, "ana")).unwrap();
        store.apply_arrival(message(11, "bo")).unwrap();

        assert_eq!(ids(&store), vec!["10", "11", "12"]);
    }

    #[test]
    fn test_unordered_page_is_sorted_before_merge() {
        let mut store = PageStore::new("team-42");
        let mut shuffled = page(10, 1, None);
        shuffled.results.swap(0, 5);

        store.append_older_page("team-42", shuffled).unwrap();
        assert_eq!(ids(&store), expected(1..=10));
    }

    #[test]
    fn test_page_for_other_conversation_is_rejected() {
        let mut store = PageStore::new("team-42");
        let err = store
            .append_older_page("team-7", page(10, 1, None))
            .unwrap_err();

        assert!(err.is_stale());
        assert!(store.is_empty());
        assert!(!store.has_more());
    }

    #[test]
    fn test_arrival_for_other_conversation_is_rejected() {
        let mut store = PageStore::new("team-42");
        let mut foreign = message(5, "ana");
        foreign.team_id = "team-7".to_string();

        assert!(store.apply_arrival(foreign).unwrap_err().is_stale());
    }

    #[test]
    fn test_unbound_store_rejects_everything() {
        let mut store = PageStore::default();
        assert_eq!(
            store.apply_arrival(message(1, "ana")).unwrap_err(),
            ChatError::NoActiveConversation
        );
    }

    #[test]
    fn test_reset_rebinds_and_clears() {
        let mut store = PageStore::new("team-42");
        store
            .append_older_page("team-42", page(10, 1, Some("c1")))
            .unwrap();

        store.reset(Some("team-7"));

        assert!(store.is_empty());
        assert!(!store.has_more());
        assert_eq!(store.next_cursor(), None);
        assert_eq!(store.conversation_id(), Some("team-7"));
        assert!(!store.contains("1"));
    }

    #[test]
    fn test_pending_replaced_by_confirmed_id() {
        let mut store = PageStore::new("team-42");
        store.apply_arrival(message(100, "ana")).unwrap();

        let mut draft = message(101, "me");
        draft.id = "local-1".to_string();
        store.insert_pending(draft).unwrap();
        assert!(store.get(1).unwrap().is_pending());

        let outcome = store.confirm_pending("local-1", message(102, "me")).unwrap();

        assert_eq!(outcome, Reconciliation::Replaced);
        assert_eq!(ids(&store), vec!["100", "102"]);
        assert!(!store.contains("local-1"));
        assert!(!store.get(1).unwrap().is_pending());
    }

    #[test]
    fn test_echo_before_ack_drops_pending_copy() {
        let mut store = PageStore::new("team-42");
        let mut draft = message(101, "me");
        draft.id = "local-1".to_string();
        store.insert_pending(draft).unwrap();

        // push echo of the same logical message lands first
        store.apply_arrival(message(102, "me")).unwrap();
        let outcome = store.confirm_pending("local-1", message(102, "me")).unwrap();

        assert_eq!(outcome, Reconciliation::AlreadyPresent);
        assert_eq!(ids(&store), vec!["102"]);
    }

    #[test]
    fn test_confirm_without_pending_inserts() {
        let mut store = PageStore::new("team-42");
        let outcome = store.confirm_pending("local-9", message(3, "me")).unwrap();
        assert_eq!(outcome, Reconciliation::Inserted);
        assert_eq!(ids(&store), vec!["3"]);
    }

    #[test]
    fn test_discard_pending() {
        let mut store = PageStore::new("team-42");
        let mut draft = message(1, "me");
        draft.id = "local-1".to_string();
        store.insert_pending(draft).unwrap();

        assert!(store.discard_pending("local-1"));
        assert!(!store.discard_pending("local-1"));
        assert!(store.is_empty());
    }
}
