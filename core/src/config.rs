use std::{path::Path, time::Duration};

use anyhow::bail;
use aws_config::{BehaviorVersion, Region, SdkConfig, meta::region::RegionProviderChain};
use serde::{Deserialize, Serialize};

use crate::util::RON;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    pub connect_timeout_secs:   u64,
    pub operation_timeout_secs: u64,
    pub attempt_timeout_secs:   u64,
    pub read_timeout_secs:      u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs:   30,
            operation_timeout_secs: 30,
            attempt_timeout_secs:   30,
            read_timeout_secs:      30,
        }
    }
}

impl From<&TimeoutConfig> for aws_config::timeout::TimeoutConfig {
    fn from(value: &TimeoutConfig) -> Self {
        aws_config::timeout::TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(value.connect_timeout_secs))
            .operation_timeout(Duration::from_secs(value.operation_timeout_secs))
            .operation_attempt_timeout(Duration::from_secs(value.attempt_timeout_secs))
            .read_timeout(Duration::from_secs(value.read_timeout_secs))
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AwsConnectorConfig {
    pub account_id:     Option<String>,
    pub endpoint_url:   Option<String>,
    pub timeout_config: Option<TimeoutConfig>,
    pub sts_region:     String,
    /// IAM is a global service; this only selects the signing region.
    pub region:         String,
}

impl Default for AwsConnectorConfig {
    fn default() -> Self {
        Self {
            account_id:     Default::default(),
            endpoint_url:   Default::default(),
            timeout_config: Default::default(),
            sts_region:     String::from("us-east-1"),
            region:         String::from("us-east-1"),
        }
    }
}

impl AwsConnectorConfig {
    pub fn try_load(prefix: &Path) -> anyhow::Result<AwsConnectorConfig> {
        let config_path = prefix.join("aws/config.ron");
        if config_path.is_file() {
            tracing::info!("Loading AwsConnector config file at {:?}", config_path);
            let config: AwsConnectorConfig = RON.from_str(&std::fs::read_to_string(config_path)?)?;
            Ok(config)
        } else {
            tracing::info!("AwsConnector config file at {:?} not present, skipping.", config_path);
            Ok(AwsConnectorConfig::default())
        }
    }

    pub async fn to_sdk_config(&self) -> SdkConfig {
        let timeout_config = self.timeout_config.clone().unwrap_or_default();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(RegionProviderChain::first_try(Region::new(self.region.clone())))
            .timeout_config((&timeout_config).into());

        if let Some(ref endpoint_url) = self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        loader.load().await
    }

    pub async fn verify_sts(&self) -> anyhow::Result<String> {
        verify_sts_account_id(self.sts_region.clone(), self.account_id.clone()).await
    }
}

pub async fn verify_sts_account_id(sts_region: String, account_id: Option<String>) -> anyhow::Result<String> {
    let sts_config = aws_config::defaults(BehaviorVersion::latest())
        .region(RegionProviderChain::first_try(Region::new(sts_region)))
        .load()
        .await;

    let sts_client = aws_sdk_sts::Client::new(&sts_config);
    let caller_identity = sts_client.get_caller_identity().send().await;

    match caller_identity {
        Ok(caller_identity) => {
            let Some(caller_account_id) = caller_identity.account else {
                bail!("Failed to get current account ID!");
            };

            if let Some(account_id) = account_id
                && caller_account_id != account_id
            {
                bail!(
                    "AWS: Account ID mismatch. Configured to use account ID {account_id}, \nbut credentials provided are for account ID {caller_account_id}."
                )
            }
            Ok(caller_account_id)
        }
        Err(e) => {
            tracing::error!("Failed to call sts:GetCallerIdentity: {}", e);
            Err(e.into())
        }
    }
}

/// A per-service config file that falls back to the shared `aws/config.ron`.
pub trait AwsServiceConfig: Sized {
    async fn try_load(prefix: &Path) -> anyhow::Result<Self>;
    async fn verify_sts(&self) -> anyhow::Result<String>;
}
