//! Message queue capability
//!
//! Publishing, receiving and acknowledging go through [`MessageQueue`].
//! Delivery is at-least-once; redelivery and dead-lettering are broker
//! behavior configured through [`config::QueueConfig`].

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::{
    error::SdkError,
    types::{MessageAttributeValue, MessageSystemAttributeName, QueueAttributeName},
    Client,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

use crate::aws::{error_chain_message, is_credentials_error};

pub mod config;
pub mod memory;

pub use config::{QueueConfig, RedrivePolicy, RedriveSettings, MAX_MESSAGE_BYTES};
pub use memory::MemoryQueue;

/// Queue failure kinds
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Credentials not available")]
    CredentialsUnavailable,

    #[error("Message is {size} bytes, exceeding the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Receipt handle is unknown or expired")]
    UnknownReceipt,

    #[error("{0}")]
    Backend(String),
}

impl QueueError {
    fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        R: std::fmt::Debug + Send + Sync + 'static,
    {
        if is_credentials_error(&err) {
            QueueError::CredentialsUnavailable
        } else {
            QueueError::Backend(error_chain_message(&err))
        }
    }
}

/// A message to publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub body: String,
    pub attributes: BTreeMap<String, String>,
}

impl OutgoingMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Size as the broker counts it: body plus attribute names and values.
    pub fn size(&self) -> usize {
        self.body.len()
            + self
                .attributes
                .iter()
                .map(|(name, value)| name.len() + value.len())
                .sum::<usize>()
    }

    pub fn check_size(&self) -> Result<(), QueueError> {
        let size = self.size();
        if size > MAX_MESSAGE_BYTES {
            return Err(QueueError::MessageTooLarge {
                size,
                limit: MAX_MESSAGE_BYTES,
            });
        }
        Ok(())
    }
}

/// A received message awaiting acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    /// How many times the broker has handed this message out, this one included
    pub receive_count: u32,
}

/// Send/receive/acknowledge capability over one queue
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Publish one message; returns the broker's message id.
    async fn send(&self, message: OutgoingMessage) -> Result<String, QueueError>;

    /// Receive up to `max` visible messages, hiding them for the visibility timeout.
    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError>;

    /// Acknowledge a delivery so it is not redelivered.
    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

/// SQS-backed queue
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    receive_wait_secs: i32,
}

impl SqsQueue {
    pub fn new(sdk_config: &SdkConfig, config: &QueueConfig) -> Self {
        let mut builder = aws_sdk_sqs::config::Builder::from(sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(queue_url = %config.queue_url, "Queue client initialized");

        Self {
            client: Client::from_conf(builder.build()),
            queue_url: config.queue_url.clone(),
            receive_wait_secs: config.receive_wait_secs,
        }
    }

    /// Same client pointed at another queue, e.g. the dead-letter queue.
    pub fn for_queue_url(&self, queue_url: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            queue_url: queue_url.into(),
            receive_wait_secs: self.receive_wait_secs,
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Compare the provisioned queue against the expected redrive settings.
    ///
    /// Returns one line per mismatch; an empty list means the queue matches.
    #[instrument(skip(self, expected))]
    pub async fn check_attributes(&self, expected: &QueueConfig) -> Result<Vec<String>, QueueError> {
        let response = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::VisibilityTimeout)
            .attribute_names(QueueAttributeName::RedrivePolicy)
            .send()
            .await
            .map_err(QueueError::from_sdk)?;

        let empty = HashMap::new();
        let actual = response.attributes().unwrap_or(&empty);
        let mut mismatches = Vec::new();

        let visibility = expected.redrive.visibility_timeout.as_secs().to_string();
        match actual.get(&QueueAttributeName::VisibilityTimeout) {
            Some(value) if *value == visibility => {},
            other => mismatches.push(format!(
                "VisibilityTimeout is {:?}, expected {}",
                other, visibility
            )),
        }

        if let Some(expected_policy) = expected.redrive_policy() {
            let actual_policy = actual
                .get(&QueueAttributeName::RedrivePolicy)
                .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok());

            let matches = actual_policy.as_ref().is_some_and(|policy| {
                policy["deadLetterTargetArn"] == expected_policy.dead_letter_target_arn.as_str()
                    && receive_count_of(policy) == Some(expected_policy.max_receive_count)
            });

            if !matches {
                mismatches.push(format!(
                    "RedrivePolicy is {:?}, expected {:?}",
                    actual_policy, expected_policy
                ));
            }
        }

        Ok(mismatches)
    }
}

/// SQS reports `maxReceiveCount` as either a number or a string.
fn receive_count_of(policy: &serde_json::Value) -> Option<u32> {
    match &policy["maxReceiveCount"] {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    #[instrument(skip(self, message), fields(size = message.size()))]
    async fn send(&self, message: OutgoingMessage) -> Result<String, QueueError> {
        message.check_size()?;

        let mut attributes = HashMap::with_capacity(message.attributes.len());
        for (name, value) in message.attributes {
            let attribute = MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()
                .map_err(|e| QueueError::Backend(format!("Invalid message attribute: {}", e)))?;
            attributes.insert(name, attribute);
        }

        let response = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(message.body)
            .set_message_attributes(Some(attributes))
            .send()
            .await
            .map_err(QueueError::from_sdk)?;

        let message_id = response.message_id().unwrap_or_default().to_string();
        debug!(message_id = %message_id, "Message sent");

        Ok(message_id)
    }

    #[instrument(skip(self))]
    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError> {
        // SQS returns at most 10 messages per call
        let max = max.clamp(1, 10) as i32;

        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(self.receive_wait_secs)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(QueueError::from_sdk)?;

        let deliveries = response
            .messages()
            .iter()
            .filter_map(|message| {
                let receipt_handle = message.receipt_handle()?.to_string();
                let receive_count = message
                    .attributes()
                    .and_then(|a| a.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                    .and_then(|count| count.parse().ok())
                    .unwrap_or(1);

                Some(Delivery {
                    message_id: message.message_id().unwrap_or_default().to_string(),
                    receipt_handle,
                    body: message.body().unwrap_or_default().to_string(),
                    receive_count,
                })
            })
            .collect();

        Ok(deliveries)
    }

    #[instrument(skip(self, receipt_handle))]
    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_receipt_handle_is_invalid())
                {
                    QueueError::UnknownReceipt
                } else {
                    QueueError::from_sdk(err)
                }
            })?;

        Ok(())
    }
}
