//! Queue and redrive settings
//!
//! The broker owns redelivery: a message not acknowledged within the
//! visibility timeout is delivered again, and after `max_receive_count`
//! receives it moves to the dead-letter queue. These values describe how the
//! queues must be provisioned; application code never counts attempts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// Default visibility timeout (5 minutes).
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 300;

/// Default receives before a message is dead-lettered.
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 3;

/// Default dead-letter retention (14 days).
pub const DEFAULT_DEAD_LETTER_RETENTION_SECS: u64 = 1_209_600;

/// Default long-poll wait for consumers.
pub const DEFAULT_RECEIVE_WAIT_SECS: i32 = 10;

/// Largest message body plus attributes the broker accepts (256 KiB).
pub const MAX_MESSAGE_BYTES: usize = 256 * 1024;

/// Redelivery bounds enforced by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedriveSettings {
    pub visibility_timeout: Duration,
    pub max_receive_count: u32,
    pub dead_letter_retention: Duration,
}

impl Default for RedriveSettings {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(DEFAULT_VISIBILITY_TIMEOUT_SECS),
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
            dead_letter_retention: Duration::from_secs(DEFAULT_DEAD_LETTER_RETENTION_SECS),
        }
    }
}

/// `RedrivePolicy` attribute of the primary queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrivePolicy {
    pub dead_letter_target_arn: String,
    pub max_receive_count: u32,
}

/// Queue client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub queue_url: String,
    pub dead_letter_queue_arn: Option<String>,
    /// Endpoint override for SQS-compatible services such as ElasticMQ
    pub endpoint: Option<String>,
    pub receive_wait_secs: i32,
    pub redrive: RedriveSettings,
}

impl QueueConfig {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            dead_letter_queue_arn: None,
            endpoint: None,
            receive_wait_secs: DEFAULT_RECEIVE_WAIT_SECS,
            redrive: RedriveSettings::default(),
        }
    }

    /// Load from `GIC_QUEUE_*` variables. `GIC_QUEUE_URL` is required.
    pub fn from_env() -> anyhow::Result<Self> {
        let queue_url = env::var("GIC_QUEUE_URL")
            .map_err(|_| anyhow::anyhow!("GIC_QUEUE_URL must be set"))?;

        let defaults = RedriveSettings::default();

        Ok(Self {
            queue_url,
            dead_letter_queue_arn: env::var("GIC_DEAD_LETTER_QUEUE_ARN")
                .ok()
                .filter(|v| !v.is_empty()),
            endpoint: env::var("SQS_ENDPOINT").ok().filter(|v| !v.is_empty()),
            receive_wait_secs: parse_env("GIC_QUEUE_RECEIVE_WAIT_SECS")
                .unwrap_or(DEFAULT_RECEIVE_WAIT_SECS),
            redrive: RedriveSettings {
                visibility_timeout: parse_env("GIC_QUEUE_VISIBILITY_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.visibility_timeout),
                max_receive_count: parse_env("GIC_QUEUE_MAX_RECEIVE_COUNT")
                    .unwrap_or(defaults.max_receive_count),
                dead_letter_retention: parse_env("GIC_DEAD_LETTER_RETENTION_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.dead_letter_retention),
            },
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queue_url.trim().is_empty() {
            anyhow::bail!("Queue URL cannot be empty");
        }
        if self.redrive.max_receive_count == 0 {
            anyhow::bail!("Queue max_receive_count must be greater than 0");
        }
        // SQS limits: visibility 0..=12h, retention 60s..=14d, wait 0..=20s
        if self.redrive.visibility_timeout > Duration::from_secs(43_200) {
            anyhow::bail!("Queue visibility timeout cannot exceed 12 hours");
        }
        if self.redrive.dead_letter_retention > Duration::from_secs(DEFAULT_DEAD_LETTER_RETENTION_SECS)
            || self.redrive.dead_letter_retention < Duration::from_secs(60)
        {
            anyhow::bail!("Dead-letter retention must be between 60 seconds and 14 days");
        }
        if !(0..=20).contains(&self.receive_wait_secs) {
            anyhow::bail!("Queue receive wait must be between 0 and 20 seconds");
        }
        Ok(())
    }

    pub fn redrive_policy(&self) -> Option<RedrivePolicy> {
        self.dead_letter_queue_arn.as_ref().map(|arn| RedrivePolicy {
            dead_letter_target_arn: arn.clone(),
            max_receive_count: self.redrive.max_receive_count,
        })
    }

    /// Attributes the primary queue must be provisioned with.
    pub fn queue_attributes(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "VisibilityTimeout".to_string(),
            self.redrive.visibility_timeout.as_secs().to_string(),
        );
        if let Some(policy) = self.redrive_policy() {
            attributes.insert("RedrivePolicy".to_string(), serde_json::to_string(&policy)?);
        }
        Ok(attributes)
    }

    /// Attributes the dead-letter queue must be provisioned with.
    pub fn dead_letter_queue_attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            "MessageRetentionPeriod".to_string(),
            self.redrive.dead_letter_retention.as_secs().to_string(),
        )])
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const DLQ_ARN: &str = "arn:aws:sqs:us-east-1:123456789012:gic-ingest-dlq";

    #[test]
    fn test_defaults() {
        let config = QueueConfig::new("https://sqs.us-east-1.amazonaws.com/123456789012/gic-ingest");
        assert_eq!(config.redrive.visibility_timeout, Duration::from_secs(300));
        assert_eq!(config.redrive.max_receive_count, 3);
        assert_eq!(config.redrive.dead_letter_retention, Duration::from_secs(1_209_600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_queue_attributes_with_redrive() {
        let mut config = QueueConfig::new("https://example.com/queue");
        config.dead_letter_queue_arn = Some(DLQ_ARN.to_string());

        let attributes = config.queue_attributes().unwrap();
        assert_eq!(attributes["VisibilityTimeout"], "300");

        let policy: RedrivePolicy = serde_json::from_str(&attributes["RedrivePolicy"]).unwrap();
        assert_eq!(policy.dead_letter_target_arn, DLQ_ARN);
        assert_eq!(policy.max_receive_count, 3);
        assert!(attributes["RedrivePolicy"].contains("\"deadLetterTargetArn\""));
    }

    #[test]
    fn test_queue_attributes_without_dead_letter_queue() {
        let config = QueueConfig::new("https://example.com/queue");
        assert!(!config.queue_attributes().unwrap().contains_key("RedrivePolicy"));
    }

    #[test]
    fn test_dead_letter_queue_attributes() {
        let config = QueueConfig::new("https://example.com/queue");
        assert_eq!(
            config.dead_letter_queue_attributes()["MessageRetentionPeriod"],
            "1209600"
        );
    }

    #[test]
    fn test_validate_rejects_zero_receive_count() {
        let mut config = QueueConfig::new("https://example.com/queue");
        config.redrive.max_receive_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_long_retention() {
        let mut config = QueueConfig::new("https://example.com/queue");
        config.redrive.dead_letter_retention = Duration::from_secs(1_209_601);
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::remove_var("GIC_QUEUE_URL");
        assert!(QueueConfig::from_env().is_err());

        env::set_var("GIC_QUEUE_URL", "https://example.com/queue");
        env::set_var("GIC_DEAD_LETTER_QUEUE_ARN", DLQ_ARN);
        env::set_var("GIC_QUEUE_MAX_RECEIVE_COUNT", "5");

        let config = QueueConfig::from_env().unwrap();
        assert_eq!(config.queue_url, "https://example.com/queue");
        assert_eq!(config.dead_letter_queue_arn.as_deref(), Some(DLQ_ARN));
        assert_eq!(config.redrive.max_receive_count, 5);
        assert_eq!(config.redrive.visibility_timeout, Duration::from_secs(300));

        env::remove_var("GIC_QUEUE_URL");
        env::remove_var("GIC_DEAD_LETTER_QUEUE_ARN");
        env::remove_var("GIC_QUEUE_MAX_RECEIVE_COUNT");
    }
}
