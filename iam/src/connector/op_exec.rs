use std::path::Path;

use aws_iam_role_connector_core::{
    connector::{ConnectorOp, OpExecOutput, ResourceAddress},
    error_util::invalid_op,
    op_exec_output,
};

use crate::{addr::IamRoleAddress, op::IamRoleConnectorOp, op_impl};

use super::IamRoleConnector;

impl IamRoleConnector {
    pub async fn do_op_exec(&self, addr: &Path, op: &str) -> Result<OpExecOutput, anyhow::Error> {
        let addr = IamRoleAddress::from_path(addr)?;
        let op = IamRoleConnectorOp::from_str(op)?;
        let api = self.client.as_ref();
        let role_name = addr.name.as_str();

        match op {
            IamRoleConnectorOp::CreateRole(role) => {
                op_impl::create_role(api, role_name, &role, &self.config.create_retry()).await
            }
            IamRoleConnectorOp::UpdateAssumeRolePolicy(_old, new) => {
                op_impl::update_assume_role_policy(api, role_name, &new).await
            }
            IamRoleConnectorOp::UpdateDescription(_old, new) => {
                op_impl::update_description(api, role_name, new.as_deref()).await
            }
            IamRoleConnectorOp::UpdateMaxSessionDuration(_old, new) => {
                op_impl::update_max_session_duration(api, role_name, new).await
            }
            IamRoleConnectorOp::UpdatePermissionsBoundary(_old, new) => {
                op_impl::update_permissions_boundary(api, role_name, new.as_deref()).await
            }
            IamRoleConnectorOp::UpdateTags(old_tags, new_tags) => {
                op_impl::update_tags(api, role_name, &old_tags, &new_tags).await
            }
            IamRoleConnectorOp::PutInlinePolicies(ref policies) if !policies.is_empty() => {
                op_impl::put_inline_policies(api, role_name, policies).await?;
                op_exec_output!(format!(
                    "Put inline policies {} on IAM role `{}`",
                    policies.keys().cloned().collect::<Vec<_>>().join(", "),
                    role_name
                ))
            }
            IamRoleConnectorOp::DeleteInlinePolicies(ref policy_names) if !policy_names.is_empty() => {
                op_impl::delete_inline_policies(api, role_name, policy_names).await?;
                op_exec_output!(format!(
                    "Deleted inline policies {} from IAM role `{}`",
                    policy_names.join(", "),
                    role_name
                ))
            }
            IamRoleConnectorOp::AttachManagedPolicies(ref policy_arns) if !policy_arns.is_empty() => {
                op_impl::attach_managed_policies(api, role_name, policy_arns).await?;
                op_exec_output!(format!("Attached {} to IAM role `{}`", policy_arns.join(", "), role_name))
            }
            IamRoleConnectorOp::DetachManagedPolicies(ref policy_arns) if !policy_arns.is_empty() => {
                op_impl::detach_managed_policies(api, role_name, policy_arns).await?;
                op_exec_output!(format!("Detached {} from IAM role `{}`", policy_arns.join(", "), role_name))
            }
            IamRoleConnectorOp::DeleteRole { force_detach_policies } => {
                op_impl::delete_role(
                    api,
                    role_name,
                    force_detach_policies || self.config.force_detach(role_name),
                    &self.config.delete_retry(),
                )
                .await
            }
            op => Err(invalid_op(&addr, &op)),
        }
    }
}
