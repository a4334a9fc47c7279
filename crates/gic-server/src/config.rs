//! Configuration management

use gic_common::types::{FileNameAllowList, UploadPolicy, DEFAULT_SITE_ID};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::queue::QueueConfig;
use crate::storage::config::StorageConfig;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Upload / Ingest Constants
// ============================================================================

/// Default lifetime of a write grant (1 hour).
pub const DEFAULT_GRANT_EXPIRY_SECS: u64 = 3600;

/// Default time budget for one authorization request.
pub const DEFAULT_AUTHORIZE_TIMEOUT_SECS: u64 = 30;

/// Default time budget for one ingestion run (5 minutes).
pub const DEFAULT_INGEST_TIMEOUT_SECS: u64 = 300;

/// Default AWS region.
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub timeouts: TimeoutConfig,
    pub aws: AwsConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Upload authorization rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub permitted_bucket: String,
    pub allowed_file_names: Vec<String>,
    pub grant_expiry_secs: u64,
}

/// Per-invocation time budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub authorize: Duration,
    pub ingest: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            authorize: Duration::from_secs(DEFAULT_AUTHORIZE_TIMEOUT_SECS),
            ingest: Duration::from_secs(DEFAULT_INGEST_TIMEOUT_SECS),
        }
    }
}

/// Region and optional static credentials shared by the S3 and SQS clients
#[derive(Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
}

impl std::fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsConfig")
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AwsConfig {
    pub fn from_env() -> Self {
        Self {
            region: env_string("AWS_REGION").unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            access_key: env_string("AWS_ACCESS_KEY_ID"),
            secret_key: env_string("AWS_SECRET_ACCESS_KEY"),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
            allow_credentials: true,
        }
    }
}

impl UploadConfig {
    /// Load from `GIC_PERMITTED_BUCKET`, `GIC_ALLOWED_FILE_NAMES` or
    /// `GIC_SITE_ID`, and `GIC_GRANT_EXPIRY_SECS`.
    pub fn from_env() -> anyhow::Result<Self> {
        let permitted_bucket = env_string("GIC_PERMITTED_BUCKET")
            .ok_or_else(|| anyhow::anyhow!("GIC_PERMITTED_BUCKET must be set"))?;

        let allowed_file_names = match env_string("GIC_ALLOWED_FILE_NAMES") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => {
                let site_id =
                    env_string("GIC_SITE_ID").unwrap_or_else(|| DEFAULT_SITE_ID.to_string());
                FileNameAllowList::for_site(&site_id).names().to_vec()
            },
        };

        Ok(Self {
            permitted_bucket,
            allowed_file_names,
            grant_expiry_secs: parse_env("GIC_GRANT_EXPIRY_SECS")
                .unwrap_or(DEFAULT_GRANT_EXPIRY_SECS),
        })
    }

    pub fn grant_expiry(&self) -> Duration {
        Duration::from_secs(self.grant_expiry_secs)
    }

    /// Build the immutable policy the gateway validates against.
    pub fn upload_policy(&self) -> anyhow::Result<UploadPolicy> {
        let allow_list = FileNameAllowList::new(self.allowed_file_names.iter().cloned())?;
        Ok(UploadPolicy::new(self.permitted_bucket.clone(), allow_list)?)
    }
}

impl TimeoutConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            authorize: parse_env("GIC_AUTHORIZE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.authorize),
            ingest: parse_env("GIC_INGEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ingest),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: env_string("GIC_HOST").unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
                port: parse_env("GIC_PORT").unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: parse_env("GIC_SHUTDOWN_TIMEOUT")
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            upload: UploadConfig::from_env()?,
            timeouts: TimeoutConfig::from_env(),
            aws: AwsConfig::from_env(),
            storage: StorageConfig::from_env(),
            queue: QueueConfig::from_env()?,
            cors: CorsConfig {
                allowed_origins: env_string("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: parse_env("CORS_ALLOW_CREDENTIALS").unwrap_or(true),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.upload.permitted_bucket.trim().is_empty() {
            anyhow::bail!("Permitted bucket cannot be empty");
        }

        if self.upload.allowed_file_names.is_empty() {
            anyhow::bail!("Allowed file names cannot be empty");
        }

        // Presigned URLs are valid for at most 7 days
        if self.upload.grant_expiry_secs == 0 || self.upload.grant_expiry_secs > 604_800 {
            anyhow::bail!(
                "Grant expiry must be between 1 and 604800 seconds, got {}",
                self.upload.grant_expiry_secs
            );
        }

        if self.timeouts.authorize.is_zero() || self.timeouts.ingest.is_zero() {
            anyhow::bail!("Invocation timeouts must be greater than 0");
        }

        if self.timeouts.ingest > self.queue.redrive.visibility_timeout {
            tracing::warn!(
                ingest_timeout_secs = self.timeouts.ingest.as_secs(),
                visibility_timeout_secs = self.queue.redrive.visibility_timeout.as_secs(),
                "Ingest timeout exceeds the queue visibility timeout"
            );
        }

        self.queue.validate()?;

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const BUCKET: &str = "acct-cumulus-gic-connector-dev";

    fn clear_env() {
        for name in [
            "GIC_PERMITTED_BUCKET",
            "GIC_ALLOWED_FILE_NAMES",
            "GIC_SITE_ID",
            "GIC_GRANT_EXPIRY_SECS",
            "GIC_AUTHORIZE_TIMEOUT_SECS",
            "GIC_INGEST_TIMEOUT_SECS",
            "GIC_QUEUE_URL",
        ] {
            env::remove_var(name);
        }
    }

    fn sample() -> Config {
        Config {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            upload: UploadConfig {
                permitted_bucket: BUCKET.to_string(),
                allowed_file_names: vec!["patients.txt".to_string()],
                grant_expiry_secs: DEFAULT_GRANT_EXPIRY_SECS,
            },
            timeouts: TimeoutConfig::default(),
            aws: AwsConfig {
                region: DEFAULT_AWS_REGION.to_string(),
                access_key: None,
                secret_key: None,
            },
            storage: StorageConfig::default(),
            queue: QueueConfig::new("https://example.com/queue"),
            cors: CorsConfig::default(),
        }
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_expiry() {
        let mut config = sample();
        config.upload.grant_expiry_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = sample();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_key_not_in_debug_output() {
        let aws = AwsConfig {
            region: "us-east-1".to_string(),
            access_key: Some("AKIDEXAMPLE".to_string()),
            secret_key: Some("wJalrXUtnFEMI".to_string()),
        };
        let rendered = format!("{:?}", aws);
        assert!(rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("wJalrXUtnFEMI"));
    }

    #[test]
    #[serial]
    fn test_upload_requires_bucket() {
        clear_env();
        assert!(UploadConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_upload_defaults_from_site_id() {
        clear_env();
        env::set_var("GIC_PERMITTED_BUCKET", BUCKET);
        env::set_var("GIC_SITE_ID", "bch");

        let upload = UploadConfig::from_env().unwrap();
        assert_eq!(upload.allowed_file_names, ["patients.txt", "bch_mrns.txt"]);
        assert_eq!(upload.grant_expiry(), Duration::from_secs(3600));

        let policy = upload.upload_policy().unwrap();
        assert_eq!(policy.permitted_bucket(), BUCKET);
        assert!(policy.allow_list().contains("bch_mrns.txt"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_upload_allow_list_override() {
        clear_env();
        env::set_var("GIC_PERMITTED_BUCKET", BUCKET);
        env::set_var("GIC_ALLOWED_FILE_NAMES", "cohort.txt, extra.txt");
        env::set_var("GIC_GRANT_EXPIRY_SECS", "600");

        let upload = UploadConfig::from_env().unwrap();
        assert_eq!(upload.allowed_file_names, ["cohort.txt", "extra.txt"]);
        assert_eq!(upload.grant_expiry_secs, 600);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_timeouts_from_env() {
        clear_env();
        assert_eq!(TimeoutConfig::from_env(), TimeoutConfig::default());

        env::set_var("GIC_INGEST_TIMEOUT_SECS", "120");
        let timeouts = TimeoutConfig::from_env();
        assert_eq!(timeouts.ingest, Duration::from_secs(120));
        assert_eq!(timeouts.authorize, Duration::from_secs(30));

        clear_env();
    }
}
