use std::collections::BTreeSet;

use anyhow::{Context, bail};
use aws_iam_role_connector_core::{
    connector::OpExecOutput,
    op_exec_output,
    retry::{RetryPolicy, retry_while},
};
use aws_sdk_iam::types::Role;
use aws_smithy_types::date_time::Format;
use indexmap::IndexMap;

use crate::{
    api::{IamApi, IamApiError, IamApiResult, NewRole},
    policy::{decode_policy_document, policy_to_json},
    resource::{DEFAULT_MAX_SESSION_DURATION, IamRole},
    tags::{IgnoreTags, Tags, tag_diff},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub item:  String,
    pub error: String,
}

/// Every failure from one bulk child operation. The items that succeeded are not listed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to {action} for IAM role `{role_name}`: {}", describe_failures(.failures))]
pub struct BulkOpError {
    pub action:    &'static str,
    pub role_name: String,
    pub failures:  Vec<BulkFailure>,
}

fn describe_failures(failures: &[BulkFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("`{}`: {}", f.item, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

impl BulkOpError {
    fn check(action: &'static str, role_name: &str, failures: Vec<BulkFailure>) -> Result<(), BulkOpError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BulkOpError {
                action,
                role_name: role_name.to_string(),
                failures,
            })
        }
    }
}

pub fn role_outputs(role: &Role) -> [(&'static str, Option<String>); 4] {
    [
        ("arn", Some(role.arn.clone())),
        ("unique_id", Some(role.role_id.clone())),
        ("create_date", role.create_date.fmt(Format::DateTime).ok()),
        ("role_name", Some(role.role_name.clone())),
    ]
}

/// Clears every output of a role that no longer exists.
pub fn gone_outputs() -> [(&'static str, Option<String>); 4] {
    [("arn", None), ("unique_id", None), ("create_date", None), ("role_name", None)]
}

fn role_gone(role_name: &str) -> anyhow::Result<OpExecOutput> {
    tracing::warn!("IAM role `{}` no longer exists, clearing its outputs", role_name);
    op_exec_output!(gone_outputs(), format!("IAM role `{}` no longer exists", role_name))
}

/// List results for a role that has since vanished count as empty.
fn empty_if_gone<T: Default>(res: IamApiResult<T>) -> IamApiResult<T> {
    match res {
        Err(e) if e.is_no_such_entity() => Ok(T::default()),
        res => res,
    }
}

pub async fn create_role(
    api: &dyn IamApi,
    role_name: &str,
    role: &IamRole,
    retry: &RetryPolicy,
) -> anyhow::Result<OpExecOutput> {
    let new_role = NewRole {
        role_name: role_name.to_string(),
        path: role.path.clone(),
        assume_role_policy_document: policy_to_json(&role.assume_role_policy_document)?,
        description: role.effective_description().map(String::from),
        max_session_duration: Some(role.max_session_duration),
        permissions_boundary: role.permissions_boundary.clone().filter(|b| !b.is_empty()),
        tags: role.tags.clone().into(),
    };

    let created = retry_while(retry, IamApiError::is_principal_not_yet_visible, || api.create_role(&new_role))
        .await
        .with_context(|| format!("Failed to create IAM role `{}`", role_name))?;

    tracing::info!(arn = %created.arn, "Created IAM role `{}`", role_name);

    let inline = match role.inline_policies {
        Some(ref policies) => put_inline_policies(api, role_name, policies).await,
        None => Ok(()),
    };
    let managed = match role.managed_policy_arns {
        Some(ref policy_arns) => attach_managed_policies(api, role_name, &Vec::from_iter(policy_arns.iter().cloned())).await,
        None => Ok(()),
    };

    let errors: Vec<BulkOpError> = [inline.err(), managed.err()].into_iter().flatten().collect();
    if !errors.is_empty() {
        let summary = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        bail!("Created IAM role `{}`, but {}", role_name, summary);
    }

    op_exec_output!(role_outputs(&created), format!("Created IAM role `{}`", role_name))
}

/// Reads the live role and its children. `None` if the role does not exist.
pub async fn read_role(
    api: &dyn IamApi,
    role_name: &str,
    ignore_tags: &IgnoreTags,
) -> anyhow::Result<Option<(IamRole, Role)>> {
    let role = match api.get_role(role_name).await {
        Ok(role) => role,
        Err(e) if e.is_no_such_entity() => {
            tracing::warn!("IAM role `{}` not found", role_name);
            return Ok(None);
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to read IAM role `{}`", role_name)),
    };

    let Some(ref encoded_assume_policy) = role.assume_role_policy_document else {
        bail!("IAM role `{}` has no assume role policy document", role_name);
    };
    let assume_role_policy_document = decode_policy_document(encoded_assume_policy)
        .with_context(|| format!("Failed to decode assume role policy for IAM role `{}`", role_name))?;

    let mut inline_policies = IndexMap::new();
    let policy_names = empty_if_gone(api.list_role_policies(role_name).await)
        .with_context(|| format!("Failed to list inline policies of IAM role `{}`", role_name))?;
    for policy_name in policy_names {
        match api.get_role_policy(role_name, &policy_name).await {
            Ok(encoded) => {
                let document = decode_policy_document(&encoded)
                    .with_context(|| format!("Failed to decode inline policy `{}`", policy_name))?;
                inline_policies.insert(policy_name, document);
            }
            Err(e) if e.is_no_such_entity() => {
                tracing::warn!("Inline policy `{}` vanished while reading IAM role `{}`", policy_name, role_name);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read inline policy `{}` of `{}`", policy_name, role_name));
            }
        }
    }

    let managed_policy_arns: BTreeSet<String> = empty_if_gone(api.list_attached_role_policies(role_name).await)
        .with_context(|| format!("Failed to list managed policies of IAM role `{}`", role_name))?
        .into_iter()
        .collect();

    let iam_role = IamRole {
        path: role.path.clone(),
        description: role.description.clone(),
        assume_role_policy_document,
        max_session_duration: role.max_session_duration.unwrap_or(DEFAULT_MAX_SESSION_DURATION),
        permissions_boundary: role
            .permissions_boundary
            .as_ref()
            .and_then(|b| b.permissions_boundary_arn.clone()),
        inline_policies: Some(inline_policies),
        managed_policy_arns: Some(managed_policy_arns),
        tags: Tags::from(role.tags.clone()).without_ignored(ignore_tags),
    };

    Ok(Some((iam_role, role)))
}

pub async fn update_assume_role_policy(
    api: &dyn IamApi,
    role_name: &str,
    document: &ron::Value,
) -> anyhow::Result<OpExecOutput> {
    let json = policy_to_json(document)?;
    match api.update_assume_role_policy(role_name, &json).await {
        Ok(()) => {
            tracing::info!("Updated assume role policy of IAM role `{}`", role_name);
            op_exec_output!(format!("Updated assume role policy for IAM role `{}`", role_name))
        }
        Err(e) if e.is_no_such_entity() => role_gone(role_name),
        Err(e) => Err(e).with_context(|| format!("Failed to update assume role policy of IAM role `{}`", role_name)),
    }
}

pub async fn update_description(
    api: &dyn IamApi,
    role_name: &str,
    description: Option<&str>,
) -> anyhow::Result<OpExecOutput> {
    match api.update_role_description(role_name, description.unwrap_or_default()).await {
        Ok(()) => {
            tracing::info!("Updated description of IAM role `{}`", role_name);
            op_exec_output!(format!("Updated description for IAM role `{}`", role_name))
        }
        Err(e) if e.is_no_such_entity() => role_gone(role_name),
        Err(e) => Err(e).with_context(|| format!("Failed to update description of IAM role `{}`", role_name)),
    }
}

pub async fn update_max_session_duration(
    api: &dyn IamApi,
    role_name: &str,
    max_session_duration: i32,
) -> anyhow::Result<OpExecOutput> {
    match api.update_role_max_session_duration(role_name, max_session_duration).await {
        Ok(()) => {
            tracing::info!(max_session_duration, "Updated max session duration of IAM role `{}`", role_name);
            op_exec_output!(format!(
                "Set max session duration of IAM role `{}` to {}s",
                role_name, max_session_duration
            ))
        }
        Err(e) if e.is_no_such_entity() => role_gone(role_name),
        Err(e) => Err(e).with_context(|| format!("Failed to update max session duration of IAM role `{}`", role_name)),
    }
}

/// An empty or absent boundary removes the existing one.
pub async fn update_permissions_boundary(
    api: &dyn IamApi,
    role_name: &str,
    boundary: Option<&str>,
) -> anyhow::Result<OpExecOutput> {
    match boundary.filter(|b| !b.is_empty()) {
        Some(arn) => {
            api.put_role_permissions_boundary(role_name, arn)
                .await
                .with_context(|| format!("Failed to set permissions boundary of IAM role `{}`", role_name))?;
            tracing::info!(boundary = arn, "Set permissions boundary of IAM role `{}`", role_name);
            op_exec_output!(format!("Set permissions boundary of IAM role `{}` to {}", role_name, arn))
        }
        None => {
            api.delete_role_permissions_boundary(role_name)
                .await
                .with_context(|| format!("Failed to remove permissions boundary of IAM role `{}`", role_name))?;
            tracing::info!("Removed permissions boundary of IAM role `{}`", role_name);
            op_exec_output!(format!("Removed permissions boundary of IAM role `{}`", role_name))
        }
    }
}

pub async fn update_tags(api: &dyn IamApi, role_name: &str, old_tags: &Tags, new_tags: &Tags) -> anyhow::Result<OpExecOutput> {
    let (untag_keys, new_tagset) = tag_diff(old_tags, new_tags).context("Failed to generate tag diff")?;

    if !untag_keys.is_empty() {
        api.untag_role(role_name, untag_keys)
            .await
            .with_context(|| format!("Failed to untag IAM role `{}`", role_name))?;
    }

    if !new_tagset.is_empty() {
        api.tag_role(role_name, new_tagset)
            .await
            .with_context(|| format!("Failed to tag IAM role `{}`", role_name))?;
    }

    tracing::info!("Updated tags of IAM role `{}`", role_name);
    op_exec_output!(format!("Updated tags for IAM role `{}`", role_name))
}

pub async fn put_inline_policies(
    api: &dyn IamApi,
    role_name: &str,
    policies: &IndexMap<String, ron::Value>,
) -> Result<(), BulkOpError> {
    let mut failures = Vec::new();
    for (policy_name, document) in policies {
        let res = match policy_to_json(document) {
            Ok(json) => api
                .put_role_policy(role_name, policy_name, &json)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(format!("{:#}", e)),
        };

        match res {
            Ok(()) => tracing::info!("Put inline policy `{}` on IAM role `{}`", policy_name, role_name),
            Err(error) => {
                tracing::error!(%error, "Failed to put inline policy `{}` on IAM role `{}`", policy_name, role_name);
                failures.push(BulkFailure {
                    item: policy_name.clone(),
                    error,
                });
            }
        }
    }
    BulkOpError::check("put inline policies", role_name, failures)
}

pub async fn delete_inline_policies(api: &dyn IamApi, role_name: &str, policy_names: &[String]) -> Result<(), BulkOpError> {
    let mut failures = Vec::new();
    for policy_name in policy_names {
        match api.delete_role_policy(role_name, policy_name).await {
            Ok(()) => tracing::info!("Deleted inline policy `{}` from IAM role `{}`", policy_name, role_name),
            Err(e) if e.is_no_such_entity() => {
                tracing::warn!("Inline policy `{}` already gone from IAM role `{}`", policy_name, role_name);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to delete inline policy `{}` from IAM role `{}`", policy_name, role_name);
                failures.push(BulkFailure {
                    item:  policy_name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    BulkOpError::check("delete inline policies", role_name, failures)
}

pub async fn attach_managed_policies(api: &dyn IamApi, role_name: &str, policy_arns: &[String]) -> Result<(), BulkOpError> {
    let mut failures = Vec::new();
    for policy_arn in policy_arns {
        match api.attach_role_policy(role_name, policy_arn).await {
            Ok(()) => tracing::info!("Attached {} to IAM role `{}`", policy_arn, role_name),
            Err(e) => {
                tracing::error!(error = %e, "Failed to attach {} to IAM role `{}`", policy_arn, role_name);
                failures.push(BulkFailure {
                    item:  policy_arn.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    BulkOpError::check("attach managed policies", role_name, failures)
}

pub async fn detach_managed_policies(api: &dyn IamApi, role_name: &str, policy_arns: &[String]) -> Result<(), BulkOpError> {
    let mut failures = Vec::new();
    for policy_arn in policy_arns {
        match api.detach_role_policy(role_name, policy_arn).await {
            Ok(()) => tracing::info!("Detached {} from IAM role `{}`", policy_arn, role_name),
            Err(e) if e.is_no_such_entity() => {
                tracing::warn!("{} already detached from IAM role `{}`", policy_arn, role_name);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to detach {} from IAM role `{}`", policy_arn, role_name);
                failures.push(BulkFailure {
                    item:  policy_arn.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    BulkOpError::check("detach managed policies", role_name, failures)
}

/// Stops at the first failure other than the profile or role having vanished.
pub async fn detach_instance_profiles(api: &dyn IamApi, role_name: &str) -> anyhow::Result<()> {
    let profiles = empty_if_gone(api.list_instance_profiles_for_role(role_name).await)
        .with_context(|| format!("Failed to list instance profiles for IAM role `{}`", role_name))?;

    for profile in profiles {
        match api.remove_role_from_instance_profile(&profile, role_name).await {
            Ok(()) => tracing::info!("Removed IAM role `{}` from instance profile `{}`", role_name, profile),
            Err(e) if e.is_no_such_entity() => {
                tracing::warn!("Instance profile `{}` already gone", profile);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to remove IAM role `{}` from instance profile `{}`", role_name, profile)
                });
            }
        }
    }
    Ok(())
}

pub async fn delete_role(
    api: &dyn IamApi,
    role_name: &str,
    force_detach_policies: bool,
    retry: &RetryPolicy,
) -> anyhow::Result<OpExecOutput> {
    detach_instance_profiles(api, role_name).await?;

    if force_detach_policies {
        let policy_arns = empty_if_gone(api.list_attached_role_policies(role_name).await)
            .with_context(|| format!("Failed to list managed policies of IAM role `{}`", role_name))?;
        detach_managed_policies(api, role_name, &policy_arns).await?;

        let policy_names = empty_if_gone(api.list_role_policies(role_name).await)
            .with_context(|| format!("Failed to list inline policies of IAM role `{}`", role_name))?;
        delete_inline_policies(api, role_name, &policy_names).await?;
    }

    match retry_while(retry, IamApiError::is_delete_conflict, || api.delete_role(role_name)).await {
        Ok(()) => tracing::info!("Deleted IAM role `{}`", role_name),
        Err(e) if e.is_no_such_entity() => tracing::warn!("IAM role `{}` was already deleted", role_name),
        Err(e) => return Err(e).with_context(|| format!("Failed to delete IAM role `{}`", role_name)),
    }

    op_exec_output!(gone_outputs(), format!("Deleted IAM role `{}`", role_name))
}
