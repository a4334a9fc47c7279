//! In-process broker with visibility timeout and dead-lettering
//!
//! Models the redrive behavior the production queue is provisioned with so
//! it can be exercised in tests and local runs:
//! - a received message is hidden for the visibility timeout
//! - an unacknowledged message becomes visible again when the timeout lapses
//! - once a message has been received `max_receive_count` times, the next
//!   receive moves it to the dead-letter list instead of delivering it
//! - dead letters older than the retention period are purged

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use super::{Delivery, MessageQueue, OutgoingMessage, QueueError, RedriveSettings};

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
    attributes: BTreeMap<String, String>,
    receive_count: u32,
    invisible_until: Option<Instant>,
    receipt_handle: Option<String>,
}

/// A message moved out of the primary queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub message_id: String,
    pub body: String,
    pub attributes: BTreeMap<String, String>,
    pub receive_count: u32,
    pub moved_at: Instant,
}

#[derive(Debug, Default)]
struct BrokerState {
    messages: Vec<StoredMessage>,
    dead_letters: Vec<DeadLetter>,
    failure: Option<QueueError>,
}

/// In-memory queue paired with its dead-letter destination
#[derive(Debug)]
pub struct MemoryQueue {
    settings: RedriveSettings,
    state: Mutex<BrokerState>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(RedriveSettings::default())
    }
}

impl MemoryQueue {
    pub fn new(settings: RedriveSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(BrokerState::default()),
        }
    }

    pub fn settings(&self) -> RedriveSettings {
        self.settings
    }

    /// Make every subsequent call fail with `err`.
    pub async fn fail_with(&self, err: QueueError) {
        self.state.lock().await.failure = Some(err);
    }

    pub async fn clear_failure(&self) {
        self.state.lock().await.failure = None;
    }

    /// Messages still in the primary queue, visible or in flight.
    pub async fn depth(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    /// Bodies of messages in the primary queue, in publish order.
    pub async fn bodies(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.messages.iter().map(|m| m.body.clone()).collect()
    }

    /// Dead letters still within the retention period.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        let mut state = self.state.lock().await;
        self.purge_expired(&mut state, Instant::now());
        state.dead_letters.clone()
    }

    fn purge_expired(&self, state: &mut BrokerState, now: Instant) {
        let retention = self.settings.dead_letter_retention;
        state
            .dead_letters
            .retain(|letter| now.duration_since(letter.moved_at) < retention);
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn send(&self, message: OutgoingMessage) -> Result<String, QueueError> {
        message.check_size()?;

        let mut state = self.state.lock().await;
        if let Some(err) = state.failure.clone() {
            return Err(err);
        }

        let message_id = Uuid::new_v4().to_string();
        state.messages.push(StoredMessage {
            message_id: message_id.clone(),
            body: message.body,
            attributes: message.attributes,
            receive_count: 0,
            invisible_until: None,
            receipt_handle: None,
        });

        Ok(message_id)
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        if let Some(err) = state.failure.clone() {
            return Err(err);
        }

        self.purge_expired(&mut state, now);

        let mut deliveries = Vec::new();
        let mut index = 0;

        while index < state.messages.len() && deliveries.len() < max {
            let in_flight = state.messages[index]
                .invisible_until
                .is_some_and(|until| until > now);
            if in_flight {
                index += 1;
                continue;
            }

            if state.messages[index].receive_count >= self.settings.max_receive_count {
                let message = state.messages.remove(index);
                warn!(
                    message_id = %message.message_id,
                    receive_count = message.receive_count,
                    "Message exceeded max receive count, moving to dead-letter queue"
                );
                state.dead_letters.push(DeadLetter {
                    message_id: message.message_id,
                    body: message.body,
                    attributes: message.attributes,
                    receive_count: message.receive_count,
                    moved_at: now,
                });
                continue;
            }

            let message = &mut state.messages[index];
            let receipt_handle = Uuid::new_v4().simple().to_string();
            message.receive_count += 1;
            message.invisible_until = Some(now + self.settings.visibility_timeout);
            message.receipt_handle = Some(receipt_handle.clone());

            deliveries.push(Delivery {
                message_id: message.message_id.clone(),
                receipt_handle,
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
            index += 1;
        }

        Ok(deliveries)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.failure.clone() {
            return Err(err);
        }

        let position = state
            .messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or(QueueError::UnknownReceipt)?;

        state.messages.remove(position);
        Ok(())
    }
}
