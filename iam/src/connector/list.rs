use std::path::{Path, PathBuf};

use anyhow::Context;
use aws_iam_role_connector_core::{connector::ResourceAddress, util::addr_matches_filter};

use crate::addr::IamRoleAddress;

use super::IamRoleConnector;

/// Roles under this path are created and owned by AWS services.
const SERVICE_ROLE_PATH: &str = "/aws-service-role/";

impl IamRoleConnector {
    pub async fn do_list(&self, subpath: &Path) -> Result<Vec<PathBuf>, anyhow::Error> {
        let mut results = Vec::<PathBuf>::new();

        if !addr_matches_filter(Path::new("aws/iam/roles"), subpath) {
            return Ok(results);
        }

        let roles = self.client.list_roles().await.context("Failed to list IAM roles")?;

        for role in roles {
            if role.path.starts_with(SERVICE_ROLE_PATH) {
                continue;
            }
            if role.arn.split(':').nth(4) != Some(self.account_id.as_str()) {
                continue;
            }

            let addr = IamRoleAddress::new(role.role_name).to_path_buf();
            if addr_matches_filter(&addr, subpath) {
                results.push(addr);
            }
        }

        Ok(results)
    }
}
