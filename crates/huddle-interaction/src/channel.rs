use huddle_core::delivery::{DeliveryPath, FallbackSender, PushChannel};
use huddle_core::{ChatError, Message, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, Mutex, RwLock};

/// Callback invoked once per unique incoming message.
pub type ArrivalHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// A confirmed send and the path that carried it.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub message: Message,
    pub path: DeliveryPath,
}

#[derive(Default)]
struct ChannelState {
    conversation_id: Option<String>,
    push_connected: bool,
    subscription: Option<broadcast::Receiver<Message>>,
    seen: HashSet<String>,
}

/// Push-first message delivery with a request/response fallback.
///
/// The push path is best effort: connect and send failures on it are
/// logged and never reach the caller. Only a failure of the fallback path
/// is returned, as `ChatError::SendFailed`.
pub struct RealtimeChannel {
    push: Arc<dyn PushChannel>,
    fallback: Arc<dyn FallbackSender>,
    state: Mutex<ChannelState>,
    handlers: RwLock<Vec<ArrivalHandler>>,
}

impl RealtimeChannel {
    pub fn new(push: Arc<dyn PushChannel>, fallback: Arc<dyn FallbackSender>) -> Self {
        Self {
            push,
            fallback,
            state: Mutex::new(ChannelState::default()),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Connects the push path for `(conversation, viewer)`.
    ///
    /// Replaces any previous connection. On failure the channel stays usable
    /// in fallback-only mode.
    pub async fn connect(&self, conversation_id: &str, viewer_id: &str) {
        {
            let mut state = self.state.lock().await;
            state.conversation_id = Some(conversation_id.to_string());
            state.push_connected = false;
            state.subscription = None;
        }

        match self.push.connect(conversation_id, viewer_id).await {
            Ok(()) => {
                let subscription = self.push.subscribe(conversation_id);
                let mut state = self.state.lock().await;
                // a newer connect may have started while this one was awaiting
                if state.conversation_id.as_deref() == Some(conversation_id) {
                    state.push_connected = true;
                    state.subscription = Some(subscription);
                }
                tracing::debug!("[RealtimeChannel] push connected to {}", conversation_id);
            }
            Err(e) => {
                tracing::warn!(
                    "[RealtimeChannel] push connect to {} failed, fallback only: {}",
                    conversation_id,
                    e
                );
            }
        }
    }

    /// Conversation of the latest `connect`, if any.
    pub async fn conversation_id(&self) -> Option<String> {
        self.state.lock().await.conversation_id.clone()
    }

    /// Whether a send would currently go over the push path.
    pub async fn is_push_ready(&self) -> bool {
        self.state.lock().await.push_connected && self.push.is_ready()
    }

    /// Sends `body` to `conversation_id`.
    ///
    /// The push path is only used while it is connected to that same
    /// conversation. The confirmed id is marked as seen, so the push echo of
    /// the same message is not dispatched again.
    pub async fn send(&self, conversation_id: &str, body: &str) -> Result<SentMessage> {
        let sent = match self.try_push(conversation_id, body).await {
            Some(message) => SentMessage {
                message,
                path: DeliveryPath::Push,
            },
            None => {
                let message = self
                    .fallback
                    .send(conversation_id, body)
                    .await
                    .map_err(|e| {
                        tracing::error!("[RealtimeChannel] fallback send failed: {}", e);
                        match e {
                            ChatError::SendFailed(_) => e,
                            other => ChatError::send_failed(other.to_string()),
                        }
                    })?;
                SentMessage {
                    message,
                    path: DeliveryPath::Fallback,
                }
            }
        };

        self.state
            .lock()
            .await
            .seen
            .insert(sent.message.id.clone());
        tracing::debug!(
            "[RealtimeChannel] sent {} via {:?}",
            sent.message.id,
            sent.path
        );
        Ok(sent)
    }

    async fn try_push(&self, conversation_id: &str, body: &str) -> Option<Message> {
        let connected_here = {
            let state = self.state.lock().await;
            state.push_connected && state.conversation_id.as_deref() == Some(conversation_id)
        };
        if !connected_here || !self.push.is_ready() {
            tracing::debug!(
                "[RealtimeChannel] push not ready for {}, using fallback",
                conversation_id
            );
            return None;
        }
        match self.push.send(conversation_id, body).await {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("[RealtimeChannel] push send failed, falling back: {}", e);
                None
            }
        }
    }

    /// Registers a handler for incoming messages.
    pub async fn on_arrival<F>(&self, handler: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.handlers.write().await.push(Arc::new(handler));
    }

    /// Invokes every handler if `message.id` has not been seen yet.
    ///
    /// Returns whether the message was new.
    pub async fn dispatch(&self, message: &Message) -> bool {
        let is_new = self.state.lock().await.seen.insert(message.id.clone());
        if !is_new {
            tracing::debug!("[RealtimeChannel] dropping duplicate {}", message.id);
            return false;
        }

        let handlers = self.handlers.read().await.clone();
        for handler in handlers {
            handler(message);
        }
        true
    }

    /// Clears the dedup window. Called when the conversation changes.
    pub async fn forget_seen(&self) {
        self.state.lock().await.seen.clear();
    }

    /// Drains the push subscription and dispatches what it held.
    ///
    /// Returns the messages that were new, in arrival order. Messages for a
    /// conversation other than the connected one are dropped.
    pub async fn pump(&self) -> Vec<Message> {
        let (conversation_id, received) = {
            let mut state = self.state.lock().await;
            let conversation_id = state.conversation_id.clone();
            let mut received = Vec::new();
            let mut closed = false;

            if let Some(subscription) = state.subscription.as_mut() {
                loop {
                    match subscription.try_recv() {
                        Ok(message) => received.push(message),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "[RealtimeChannel] subscription lagged, {} messages lost",
                                skipped
                            );
                        }
                        Err(TryRecvError::Closed) => {
                            closed = true;
                            break;
                        }
                    }
                }
            }
            if closed {
                tracing::warn!("[RealtimeChannel] push subscription closed, fallback only");
                state.subscription = None;
                state.push_connected = false;
            }
            (conversation_id, received)
        };

        let mut fresh = Vec::new();
        for message in received {
            if conversation_id.as_deref() != Some(message.team_id.as_str()) {
                tracing::debug!(
                    "[RealtimeChannel] ignoring message for {} on {:?}",
                    message.team_id,
                    conversation_id
                );
                continue;
            }
            if self.dispatch(&message).await {
                fresh.push(message);
            }
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_push::LocalPushChannel;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use huddle_core::{DeliveryStatus, SenderRole};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn message(id: &str, sender: &str) -> Message {
        Message {
            id: id.to_string(),
            team_id: "team-42".to_string(),
            sender_id: sender.to_string(),
            sender_name: sender.to_string(),
            sender_role: SenderRole::Coach,
            body: format!("body {id}"),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            status: DeliveryStatus::Confirmed,
        }
    }

    #[derive(Default)]
    struct MockFallback {
        sent: std::sync::Mutex<Vec<(String, String)>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl FallbackSender for MockFallback {
        async fn send(&self, conversation_id: &str, body: &str) -> Result<Message> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ChatError::internal("HTTP 503"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((conversation_id.to_string(), body.to_string()));
            Ok(message("rest-1", "viewer"))
        }
    }

    /// Push channel whose sends always fail after reporting ready.
    struct BrokenPush;

    #[async_trait]
    impl PushChannel for BrokenPush {
        async fn connect(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        fn is_ready(&self) -> bool {
            true
        }
        async fn send(&self, _: &str, _: &str) -> Result<Message> {
            Err(ChatError::push_unavailable("socket reset"))
        }
        fn subscribe(&self, _: &str) -> broadcast::Receiver<Message> {
            broadcast::channel(1).1
        }
    }

    fn channel_with(push: Arc<dyn PushChannel>) -> (RealtimeChannel, Arc<MockFallback>) {
        let fallback = Arc::new(MockFallback::default());
        (RealtimeChannel::new(push, fallback.clone()), fallback)
    }

    #[tokio::test]
    async fn test_send_prefers_push() {
        let (channel, fallback) = channel_with(Arc::new(LocalPushChannel::new()));
        channel.connect("team-42", "viewer").await;

        let sent = channel.send("team-42", "hello").await.unwrap();

        assert_eq!(sent.path, DeliveryPath::Push);
        assert!(fallback.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_falls_back_when_not_ready() {
        let push = Arc::new(LocalPushChannel::new());
        push.set_ready(false);
        let (channel, fallback) = channel_with(push);
        channel.connect("team-42", "viewer").await;

        let sent = channel.send("team-42", "hello").await.unwrap();

        assert_eq!(sent.path, DeliveryPath::Fallback);
        assert_eq!(
            fallback.sent.lock().unwrap().as_slice(),
            &[("team-42".to_string(), "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn test_push_failure_falls_back_silently() {
        let (channel, _) = channel_with(Arc::new(BrokenPush));
        channel.connect("team-42", "viewer").await;

        let sent = channel.send("team-42", "hello").await.unwrap();

        assert_eq!(sent.path, DeliveryPath::Fallback);
        assert_eq!(sent.message.id, "rest-1");
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_fallback_only() {
        let push = Arc::new(LocalPushChannel::new());
        push.set_fail_connect(true);
        let (channel, _) = channel_with(push);

        channel.connect("team-42", "viewer").await;

        assert!(!channel.is_push_ready().await);
        let sent = channel.send("team-42", "hello").await.unwrap();
        assert_eq!(sent.path, DeliveryPath::Fallback);
    }

    #[tokio::test]
    async fn test_fallback_failure_is_send_failed() {
        let push = Arc::new(LocalPushChannel::new());
        push.set_ready(false);
        let (channel, fallback) = channel_with(push);
        fallback.fail.store(true, Ordering::SeqCst);
        channel.connect("team-42", "viewer").await;

        let err = channel.send("team-42", "hello").await.unwrap_err();

        assert!(matches!(err, ChatError::SendFailed(_)));
        assert!(err.is_user_visible());
    }

    #[tokio::test]
    async fn test_send_without_connect_uses_fallback() {
        let (channel, fallback) = channel_with(Arc::new(LocalPushChannel::new()));

        let sent = channel.send("team-42", "hello").await.unwrap();

        assert_eq!(sent.path, DeliveryPath::Fallback);
        assert_eq!(fallback.sent.lock().unwrap()[0].0, "team-42");
    }

    #[tokio::test]
    async fn test_send_targets_given_conversation_after_reconnect() {
        let push = Arc::new(LocalPushChannel::new());
        let (channel, fallback) = channel_with(push.clone());
        channel.connect("team-42", "viewer").await;
        channel.connect("team-7", "viewer").await;

        let sent = channel.send("team-42", "late").await.unwrap();

        // push is bound to team-7, so the send must not ride it
        assert_eq!(sent.path, DeliveryPath::Fallback);
        assert_eq!(
            fallback.sent.lock().unwrap().as_slice(),
            &[("team-42".to_string(), "late".to_string())]
        );
    }

    #[tokio::test]
    async fn test_dispatch_once_per_id() {
        let (channel, _) = channel_with(Arc::new(LocalPushChannel::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        channel
            .on_arrival(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert!(channel.dispatch(&message("1", "ana")).await);
        assert!(!channel.dispatch(&message("1", "ana")).await);
        assert!(channel.dispatch(&message("2", "ana")).await);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_forget_seen_allows_redelivery() {
        let (channel, _) = channel_with(Arc::new(LocalPushChannel::new()));
        channel.dispatch(&message("1", "ana")).await;

        channel.forget_seen().await;

        assert!(channel.dispatch(&message("1", "ana")).await);
    }

    #[tokio::test]
    async fn test_pump_drops_own_echo() {
        let push = Arc::new(LocalPushChannel::new());
        let (channel, _) = channel_with(push.clone());
        channel.connect("team-42", "viewer").await;

        let sent = channel.send("team-42", "mine").await.unwrap();
        push.publish(message("77", "coach"));

        let fresh = channel.pump().await;

        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, "77");
        assert_ne!(fresh[0].id, sent.message.id);
    }

    #[tokio::test]
    async fn test_pump_ignores_other_conversations() {
        let push = Arc::new(LocalPushChannel::new());
        let (channel, _) = channel_with(push.clone());
        channel.connect("team-42", "viewer").await;

        // published on another conversation's topic
        let mut stray = message("5", "coach");
        stray.team_id = "team-7".to_string();
        push.publish(stray);
        push.publish(message("6", "coach"));

        let ids: Vec<_> = channel.pump().await.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["6".to_string()]);
    }
}
