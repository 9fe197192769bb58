//! The IAM calls the role connector makes, behind a trait so the lifecycle
//! logic can run against something other than the live service.

use std::fmt::Debug;

use async_trait::async_trait;
use aws_sdk_iam::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::{Role, Tag},
};

pub const NO_SUCH_ENTITY: &str = "NoSuchEntity";
pub const DELETE_CONFLICT: &str = "DeleteConflict";
pub const MALFORMED_POLICY_DOCUMENT: &str = "MalformedPolicyDocument";

/// Principals named in a new trust policy can take a while to become visible to IAM.
const INVALID_PRINCIPAL_MESSAGE: &str = "Invalid principal in policy";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{}", .code.as_ref().map(|c| format!("{c}: ")).unwrap_or_default(), .message)]
pub struct IamApiError {
    pub code:    Option<String>,
    pub message: String,
}

impl IamApiError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code:    Some(code.to_string()),
            message: message.into(),
        }
    }

    pub fn code_equals(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    pub fn is_no_such_entity(&self) -> bool {
        self.code_equals(NO_SUCH_ENTITY)
    }

    pub fn is_delete_conflict(&self) -> bool {
        self.code_equals(DELETE_CONFLICT)
    }

    pub fn is_principal_not_yet_visible(&self) -> bool {
        self.code_equals(MALFORMED_POLICY_DOCUMENT) && self.message.contains(INVALID_PRINCIPAL_MESSAGE)
    }
}

impl<E, R> From<SdkError<E, R>> for IamApiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug,
{
    fn from(err: SdkError<E, R>) -> Self {
        Self {
            code:    err.code().map(String::from),
            message: err
                .message()
                .map(String::from)
                .unwrap_or_else(|| format!("{}", DisplayErrorContext(&err))),
        }
    }
}

pub type IamApiResult<T> = Result<T, IamApiError>;

/// Everything CreateRole needs besides the role name.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRole {
    pub role_name: String,
    pub path: String,
    pub assume_role_policy_document: String,
    pub description: Option<String>,
    pub max_session_duration: Option<i32>,
    pub permissions_boundary: Option<String>,
    pub tags: Option<Vec<Tag>>,
}

#[async_trait]
pub trait IamApi: Send + Sync {
    async fn create_role(&self, new_role: &NewRole) -> IamApiResult<Role>;
    async fn get_role(&self, role_name: &str) -> IamApiResult<Role>;
    async fn list_roles(&self) -> IamApiResult<Vec<Role>>;
    async fn delete_role(&self, role_name: &str) -> IamApiResult<()>;

    async fn update_assume_role_policy(&self, role_name: &str, policy_document: &str) -> IamApiResult<()>;
    async fn update_role_description(&self, role_name: &str, description: &str) -> IamApiResult<()>;
    async fn update_role_max_session_duration(&self, role_name: &str, max_session_duration: i32) -> IamApiResult<()>;
    async fn put_role_permissions_boundary(&self, role_name: &str, boundary_arn: &str) -> IamApiResult<()>;
    async fn delete_role_permissions_boundary(&self, role_name: &str) -> IamApiResult<()>;

    async fn tag_role(&self, role_name: &str, tags: Vec<Tag>) -> IamApiResult<()>;
    async fn untag_role(&self, role_name: &str, tag_keys: Vec<String>) -> IamApiResult<()>;

    async fn list_role_policies(&self, role_name: &str) -> IamApiResult<Vec<String>>;
    /// Returns the policy document as IAM stores it, URL-encoded.
    async fn get_role_policy(&self, role_name: &str, policy_name: &str) -> IamApiResult<String>;
    async fn put_role_policy(&self, role_name: &str, policy_name: &str, policy_document: &str) -> IamApiResult<()>;
    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> IamApiResult<()>;

    async fn list_attached_role_policies(&self, role_name: &str) -> IamApiResult<Vec<String>>;
    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> IamApiResult<()>;
    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> IamApiResult<()>;

    async fn list_instance_profiles_for_role(&self, role_name: &str) -> IamApiResult<Vec<String>>;
    async fn remove_role_from_instance_profile(&self, instance_profile_name: &str, role_name: &str) -> IamApiResult<()>;
}

fn missing_role(role_name: &str) -> IamApiError {
    IamApiError::new(NO_SUCH_ENTITY, format!("IAM returned no role for {role_name}"))
}

#[async_trait]
impl IamApi for aws_sdk_iam::Client {
    async fn create_role(&self, new_role: &NewRole) -> IamApiResult<Role> {
        let output = self
            .create_role()
            .role_name(&new_role.role_name)
            .path(&new_role.path)
            .assume_role_policy_document(&new_role.assume_role_policy_document)
            .set_description(new_role.description.clone())
            .set_max_session_duration(new_role.max_session_duration)
            .set_permissions_boundary(new_role.permissions_boundary.clone())
            .set_tags(new_role.tags.clone())
            .send()
            .await?;

        output.role.ok_or_else(|| missing_role(&new_role.role_name))
    }

    async fn get_role(&self, role_name: &str) -> IamApiResult<Role> {
        let output = self.get_role().role_name(role_name).send().await?;
        output.role.ok_or_else(|| missing_role(role_name))
    }

    async fn list_roles(&self) -> IamApiResult<Vec<Role>> {
        let mut results = Vec::new();
        let mut pages = self.list_roles().into_paginator().send();
        while let Some(page) = pages.next().await {
            results.extend(page?.roles);
        }
        Ok(results)
    }

    async fn delete_role(&self, role_name: &str) -> IamApiResult<()> {
        self.delete_role().role_name(role_name).send().await?;
        Ok(())
    }

    async fn update_assume_role_policy(&self, role_name: &str, policy_document: &str) -> IamApiResult<()> {
        self.update_assume_role_policy()
            .role_name(role_name)
            .policy_document(policy_document)
            .send()
            .await?;
        Ok(())
    }

    async fn update_role_description(&self, role_name: &str, description: &str) -> IamApiResult<()> {
        self.update_role_description()
            .role_name(role_name)
            .description(description)
            .send()
            .await?;
        Ok(())
    }

    async fn update_role_max_session_duration(&self, role_name: &str, max_session_duration: i32) -> IamApiResult<()> {
        self.update_role()
            .role_name(role_name)
            .max_session_duration(max_session_duration)
            .send()
            .await?;
        Ok(())
    }

    async fn put_role_permissions_boundary(&self, role_name: &str, boundary_arn: &str) -> IamApiResult<()> {
        self.put_role_permissions_boundary()
            .role_name(role_name)
            .permissions_boundary(boundary_arn)
            .send()
            .await?;
        Ok(())
    }

    async fn delete_role_permissions_boundary(&self, role_name: &str) -> IamApiResult<()> {
        self.delete_role_permissions_boundary().role_name(role_name).send().await?;
        Ok(())
    }

    async fn tag_role(&self, role_name: &str, tags: Vec<Tag>) -> IamApiResult<()> {
        self.tag_role().role_name(role_name).set_tags(Some(tags)).send().await?;
        Ok(())
    }

    async fn untag_role(&self, role_name: &str, tag_keys: Vec<String>) -> IamApiResult<()> {
        self.untag_role()
            .role_name(role_name)
            .set_tag_keys(Some(tag_keys))
            .send()
            .await?;
        Ok(())
    }

    async fn list_role_policies(&self, role_name: &str) -> IamApiResult<Vec<String>> {
        let mut results = Vec::new();
        let mut pages = self.list_role_policies().role_name(role_name).into_paginator().send();
        while let Some(page) = pages.next().await {
            results.extend(page?.policy_names);
        }
        Ok(results)
    }

    async fn get_role_policy(&self, role_name: &str, policy_name: &str) -> IamApiResult<String> {
        let output = self
            .get_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await?;
        Ok(output.policy_document)
    }

    async fn put_role_policy(&self, role_name: &str, policy_name: &str, policy_document: &str) -> IamApiResult<()> {
        self.put_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .policy_document(policy_document)
            .send()
            .await?;
        Ok(())
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> IamApiResult<()> {
        self.delete_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await?;
        Ok(())
    }

    async fn list_attached_role_policies(&self, role_name: &str) -> IamApiResult<Vec<String>> {
        let mut results = Vec::new();
        let mut pages = self
            .list_attached_role_policies()
            .role_name(role_name)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            for policy in page?.attached_policies.unwrap_or_default() {
                if let Some(policy_arn) = policy.policy_arn {
                    results.push(policy_arn);
                }
            }
        }
        Ok(results)
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> IamApiResult<()> {
        self.attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await?;
        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> IamApiResult<()> {
        self.detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await?;
        Ok(())
    }

    async fn list_instance_profiles_for_role(&self, role_name: &str) -> IamApiResult<Vec<String>> {
        let mut results = Vec::new();
        let mut pages = self
            .list_instance_profiles_for_role()
            .role_name(role_name)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            for profile in page?.instance_profiles {
                results.push(profile.instance_profile_name);
            }
        }
        Ok(results)
    }

    async fn remove_role_from_instance_profile(&self, instance_profile_name: &str, role_name: &str) -> IamApiResult<()> {
        self.remove_role_from_instance_profile()
            .instance_profile_name(instance_profile_name)
            .role_name(role_name)
            .send()
            .await?;
        Ok(())
    }
}
