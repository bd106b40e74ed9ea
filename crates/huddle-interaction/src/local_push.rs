use async_trait::async_trait;
use chrono::Utc;
use huddle_core::delivery::PushChannel;
use huddle_core::{ChatError, DeliveryStatus, Message, Result, SenderRole};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

const TOPIC_CAPACITY: usize = 256;

/// In-process push channel with one broadcast topic per conversation.
///
/// Sent messages are echoed to every subscriber of the topic, including the
/// sender, the way a real push server echoes confirmed sends. Other
/// participants are simulated with [`LocalPushChannel::publish`].
pub struct LocalPushChannel {
    topics: Mutex<HashMap<String, broadcast::Sender<Message>>>,
    viewer: Mutex<Option<(String, String)>>,
    ready: AtomicBool,
    fail_connect: AtomicBool,
}

impl LocalPushChannel {
    /// Creates a channel that is ready to send.
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            viewer: Mutex::new(None),
            ready: AtomicBool::new(true),
            fail_connect: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Makes subsequent `connect` calls fail with `PushUnavailable`.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Delivers a message to the topic of `message.team_id`.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, message: Message) -> usize {
        let sender = self.topic(&message.team_id);
        sender.send(message).unwrap_or(0)
    }

    fn topic(&self, conversation_id: &str) -> broadcast::Sender<Message> {
        lock(&self.topics)
            .entry(conversation_id.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

impl Default for LocalPushChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushChannel for LocalPushChannel {
    async fn connect(&self, conversation_id: &str, viewer_id: &str) -> Result<()> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ChatError::push_unavailable(format!(
                "connect refused for {}",
                conversation_id
            )));
        }
        *lock(&self.viewer) = Some((conversation_id.to_string(), viewer_id.to_string()));
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send(&self, conversation_id: &str, body: &str) -> Result<Message> {
        if !self.is_ready() {
            return Err(ChatError::push_unavailable("socket not open"));
        }

        let viewer_id = match lock(&self.viewer).as_ref() {
            Some((conversation, viewer)) if conversation == conversation_id => viewer.clone(),
            _ => {
                return Err(ChatError::push_unavailable(format!(
                    "not connected to {}",
                    conversation_id
                )));
            }
        };

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            team_id: conversation_id.to_string(),
            sender_id: viewer_id.clone(),
            sender_name: viewer_id,
            sender_role: SenderRole::Player,
            body: body.to_string(),
            timestamp: Utc::now(),
            status: DeliveryStatus::Confirmed,
        };
        self.publish(message.clone());
        Ok(message)
    }

    fn subscribe(&self, conversation_id: &str) -> broadcast::Receiver<Message> {
        self.topic(conversation_id).subscribe()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
