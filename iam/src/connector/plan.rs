use std::path::Path;

use anyhow::bail;
use aws_iam_role_connector_core::{
    connector::{OpPlanOutput, ResourceAddress},
    connector_op,
    util::{RON, diff_ron_values},
};

use crate::{
    addr::IamRoleAddress,
    op::IamRoleConnectorOp,
    policy::policies_equivalent,
    reconcile::{diff_inline_policies, diff_managed_policies},
    resource::IamRole,
    validate::validate_role,
};

use super::IamRoleConnector;

impl IamRoleConnector {
    pub async fn do_plan(
        &self,
        addr: &Path,
        current: Option<String>,
        desired: Option<String>,
    ) -> Result<Vec<OpPlanOutput>, anyhow::Error> {
        let addr = IamRoleAddress::from_path(addr)?;
        let role_name = &addr.name;

        match (current, desired) {
            (None, None) => Ok(vec![]),
            (None, Some(new_role)) => {
                let new_role: IamRole = RON.from_str(&new_role)?;
                check_valid(role_name, &new_role)?;
                Ok(vec![connector_op!(
                    IamRoleConnectorOp::CreateRole(new_role),
                    format!("Create new IAM role `{}`", role_name)
                )])
            }
            (Some(_old_role), None) => {
                Ok(vec![connector_op!(
                    IamRoleConnectorOp::DeleteRole {
                        force_detach_policies: self.config.force_detach(role_name),
                    },
                    format!("DELETE IAM role `{}`", role_name)
                )])
            }
            (Some(old_role), Some(new_role)) => {
                let old_role: IamRole = RON.from_str(&old_role)?;
                let new_role: IamRole = RON.from_str(&new_role)?;
                if old_role.is_equivalent(&new_role) {
                    return Ok(Vec::new());
                }
                check_valid(role_name, &new_role)?;

                if old_role.path != new_role.path {
                    let message = format!(
                        "Recreate IAM role `{}`: path changes from {} to {}",
                        role_name, old_role.path, new_role.path
                    );
                    return Ok(vec![
                        connector_op!(
                            IamRoleConnectorOp::DeleteRole {
                                force_detach_policies: self.config.force_detach(role_name),
                            },
                            message.clone()
                        ),
                        connector_op!(IamRoleConnectorOp::CreateRole(new_role), message),
                    ]);
                }

                plan_update(role_name, old_role, new_role)
            }
        }
    }
}

fn check_valid(role_name: &str, role: &IamRole) -> anyhow::Result<()> {
    let diag = validate_role(role_name, role);
    if diag.has_errors() {
        let problems: Vec<String> = diag
            .diagnostics
            .iter()
            .map(|d| match d.field {
                Some(ref field) => format!("{}: {}", field, d.message),
                None => d.message.clone(),
            })
            .collect();
        bail!("Invalid IAM role `{}`: {}", role_name, problems.join("; "));
    }
    Ok(())
}

fn plan_update(role_name: &str, old_role: IamRole, new_role: IamRole) -> anyhow::Result<Vec<OpPlanOutput>> {
    let mut ops = Vec::new();

    if !policies_equivalent(&old_role.assume_role_policy_document, &new_role.assume_role_policy_document) {
        let diff = diff_ron_values(&old_role.assume_role_policy_document, &new_role.assume_role_policy_document)
            .unwrap_or_default();
        ops.push(connector_op!(
            IamRoleConnectorOp::UpdateAssumeRolePolicy(
                old_role.assume_role_policy_document.clone(),
                new_role.assume_role_policy_document.clone(),
            ),
            format!("Modify assume role policy for IAM role `{}`\n{}", role_name, diff)
        ));
    }

    if old_role.effective_description() != new_role.effective_description() {
        let diff = diff_ron_values(&old_role.description, &new_role.description).unwrap_or_default();
        ops.push(connector_op!(
            IamRoleConnectorOp::UpdateDescription(old_role.description.clone(), new_role.description.clone()),
            format!("Modify description for IAM role `{}`\n{}", role_name, diff)
        ));
    }

    if old_role.max_session_duration != new_role.max_session_duration {
        ops.push(connector_op!(
            IamRoleConnectorOp::UpdateMaxSessionDuration(old_role.max_session_duration, new_role.max_session_duration),
            format!(
                "Modify max session duration for IAM role `{}`: {}s -> {}s",
                role_name, old_role.max_session_duration, new_role.max_session_duration
            )
        ));
    }

    if old_role.permissions_boundary != new_role.permissions_boundary {
        let diff = diff_ron_values(&old_role.permissions_boundary, &new_role.permissions_boundary).unwrap_or_default();
        ops.push(connector_op!(
            IamRoleConnectorOp::UpdatePermissionsBoundary(
                old_role.permissions_boundary.clone(),
                new_role.permissions_boundary.clone(),
            ),
            format!("Modify permissions boundary for IAM role `{}`\n{}", role_name, diff)
        ));
    }

    if old_role.tags != new_role.tags {
        let diff = diff_ron_values(&old_role.tags, &new_role.tags).unwrap_or_default();
        ops.push(connector_op!(
            IamRoleConnectorOp::UpdateTags(old_role.tags.clone(), new_role.tags.clone()),
            format!("Modify tags for IAM role `{}`\n{}", role_name, diff)
        ));
    }

    // Child collections absent from the desired document are left as they are.
    let old_inline = old_role.inline_policies.unwrap_or_default();
    let old_managed = old_role.managed_policy_arns.unwrap_or_default();
    let inline = match new_role.inline_policies {
        Some(ref new_inline) => diff_inline_policies(&old_inline, new_inline),
        None => Default::default(),
    };
    let managed = match new_role.managed_policy_arns {
        Some(ref new_managed) => diff_managed_policies(&old_managed, new_managed),
        None => Default::default(),
    };

    // Removals before additions, for both child collections.
    if !inline.remove.is_empty() {
        ops.push(connector_op!(
            IamRoleConnectorOp::DeleteInlinePolicies(inline.remove.clone()),
            format!(
                "Delete inline policies {} from IAM role `{}`",
                inline.remove.join(", "),
                role_name
            )
        ));
    }

    if !managed.detach.is_empty() {
        ops.push(connector_op!(
            IamRoleConnectorOp::DetachManagedPolicies(managed.detach.clone()),
            format!("Detach {} from IAM role `{}`", managed.detach.join(", "), role_name)
        ));
    }

    if !inline.put.is_empty() {
        let mut message = format!("Put inline policies on IAM role `{}`", role_name);
        for (policy_name, document) in &inline.put {
            let diff = match old_inline.get(policy_name) {
                Some(old_document) => diff_ron_values(old_document, document).unwrap_or_default(),
                None => diff_ron_values(&ron::Value::Unit, document).unwrap_or_default(),
            };
            message.push_str(&format!("\n{}:\n{}", policy_name, diff));
        }
        ops.push(connector_op!(IamRoleConnectorOp::PutInlinePolicies(inline.put), message));
    }

    if !managed.attach.is_empty() {
        ops.push(connector_op!(
            IamRoleConnectorOp::AttachManagedPolicies(managed.attach.clone()),
            format!("Attach {} to IAM role `{}`", managed.attach.join(", "), role_name)
        ));
    }

    Ok(ops)
}
