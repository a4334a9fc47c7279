use serde::{Deserialize, Serialize};
use std::env;

/// S3 client settings beyond the shared AWS region and credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Endpoint override for S3-compatible services such as MinIO
    pub endpoint: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("S3_ENDPOINT", "http://localhost:9000");
        env::set_var("S3_PATH_STYLE", "true");

        let config = StorageConfig::from_env();
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.path_style);

        env::remove_var("S3_ENDPOINT");
        env::remove_var("S3_PATH_STYLE");

        assert_eq!(StorageConfig::from_env(), StorageConfig::default());
    }
}
