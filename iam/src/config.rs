use std::{collections::BTreeSet, path::Path, time::Duration};

use aws_iam_role_connector_core::{
    config::{AwsConnectorConfig, AwsServiceConfig},
    retry::RetryPolicy,
    util::RON,
};
use serde::{Deserialize, Serialize};

use crate::tags::IgnoreTags;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IamRoleConnectorConfig {
    pub aws: AwsConnectorConfig,
    /// How long CreateRole keeps retrying while a principal in the trust policy propagates.
    pub create_retry_timeout_secs: u64,
    /// How long DeleteRole keeps retrying while IAM still reports the role as in use.
    pub delete_retry_timeout_secs: u64,
    /// Detach managed policies and delete inline policies before deleting any role.
    pub force_detach_policies: bool,
    /// Roles that get the same treatment when `force_detach_policies` is off.
    pub force_detach_roles: BTreeSet<String>,
    pub ignore_tags: IgnoreTags,
}

impl Default for IamRoleConnectorConfig {
    fn default() -> Self {
        Self {
            aws: AwsConnectorConfig::default(),
            create_retry_timeout_secs: 30,
            delete_retry_timeout_secs: 120,
            force_detach_policies: false,
            force_detach_roles: BTreeSet::new(),
            ignore_tags: IgnoreTags::default(),
        }
    }
}

impl IamRoleConnectorConfig {
    pub fn create_retry(&self) -> RetryPolicy {
        RetryPolicy::with_timeout(Duration::from_secs(self.create_retry_timeout_secs))
    }

    pub fn delete_retry(&self) -> RetryPolicy {
        RetryPolicy::with_timeout(Duration::from_secs(self.delete_retry_timeout_secs))
    }

    pub fn force_detach(&self, role_name: &str) -> bool {
        self.force_detach_policies || self.force_detach_roles.contains(role_name)
    }
}

impl AwsServiceConfig for IamRoleConnectorConfig {
    async fn try_load(prefix: &Path) -> anyhow::Result<Self> {
        let shared = AwsConnectorConfig::try_load(prefix)?;

        let config_path = prefix.join("aws/iam/config.ron");
        if config_path.is_file() {
            tracing::info!("Loading IAM role connector config file at {:?}", config_path);
            let mut config: IamRoleConnectorConfig = RON.from_str(&std::fs::read_to_string(config_path)?)?;
            // An absent or empty `aws` section inherits aws/config.ron.
            if config.aws == AwsConnectorConfig::default() {
                config.aws = shared;
            }
            Ok(config)
        } else {
            Ok(IamRoleConnectorConfig {
                aws: shared,
                ..Default::default()
            })
        }
    }

    async fn verify_sts(&self) -> anyhow::Result<String> {
        self.aws.verify_sts().await
    }
}
