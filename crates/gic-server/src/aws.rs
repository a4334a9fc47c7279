//! Shared AWS SDK setup and error classification

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::{provider::error::CredentialsError, Credentials};
use std::error::Error as StdError;
use tracing::debug;

use crate::config::AwsConfig;

/// Load the SDK configuration shared by the S3 and SQS clients.
///
/// Static keys are used when both are configured; otherwise the default
/// provider chain (environment, profile, container or instance role) applies.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        debug!("Using static AWS credentials");
        loader = loader.credentials_provider(Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "gic-static",
        ));
    }

    loader.load().await
}

/// True when any error in the source chain is a credentials resolution failure.
pub fn is_credentials_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.downcast_ref::<CredentialsError>().is_some() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Render an error with its full source chain.
pub fn error_chain_message(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = e.source();
    }
    message
}
