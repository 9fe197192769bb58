//! In-memory stand-in for IAM used by the lifecycle tests.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use aws_sdk_iam::types::{AttachedPermissionsBoundary, Role, Tag};
use aws_smithy_types::DateTime;

use crate::api::{IamApi, IamApiError, IamApiResult, NO_SUCH_ENTITY, NewRole};

#[derive(Debug, Clone, Default)]
pub struct FakeRole {
    pub path: String,
    pub role_id: String,
    pub assume_role_policy_document: String,
    pub description: Option<String>,
    pub max_session_duration: Option<i32>,
    pub permissions_boundary: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub inline_policies: BTreeMap<String, String>,
    pub attached_policies: BTreeSet<String>,
    pub instance_profiles: BTreeSet<String>,
}

#[derive(Default)]
pub struct FakeIam {
    pub roles: Mutex<BTreeMap<String, FakeRole>>,
    /// Errors to return, keyed by operation name, before the operation is allowed to run.
    failures: Mutex<HashMap<&'static str, VecDeque<IamApiError>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeIam {
    pub fn with_role(self, name: &str, role: FakeRole) -> Self {
        self.roles.lock().unwrap().insert(name.to_string(), role);
        self
    }

    pub fn fail(&self, operation: &'static str, err: IamApiError) {
        self.failures
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(err);
    }

    pub fn role(&self, name: &str) -> Option<FakeRole> {
        self.roles.lock().unwrap().get(name).cloned()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .cloned()
            .collect()
    }

    fn enter(&self, operation: &'static str, detail: &str) -> IamApiResult<()> {
        self.calls.lock().unwrap().push(format!("{operation} {detail}"));
        match self.failures.lock().unwrap().get_mut(operation).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn with_existing<T>(&self, role_name: &str, f: impl FnOnce(&mut FakeRole) -> IamApiResult<T>) -> IamApiResult<T> {
        let mut roles = self.roles.lock().unwrap();
        match roles.get_mut(role_name) {
            Some(role) => f(role),
            None => Err(no_such_entity(&format!("The role with name {role_name} cannot be found."))),
        }
    }
}

pub fn no_such_entity(message: &str) -> IamApiError {
    IamApiError::new(NO_SUCH_ENTITY, message)
}

fn to_sdk_role(name: &str, role: &FakeRole) -> Role {
    let tags = (!role.tags.is_empty()).then(|| {
        role.tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build().unwrap())
            .collect()
    });

    Role::builder()
        .path(&role.path)
        .role_name(name)
        .role_id(&role.role_id)
        .arn(format!("arn:aws:iam::123456789012:role{}{}", role.path, name))
        .create_date(DateTime::from_secs(1_700_000_000))
        .assume_role_policy_document(urlencoding::encode(&role.assume_role_policy_document))
        .set_description(role.description.clone())
        .set_max_session_duration(role.max_session_duration)
        .set_permissions_boundary(role.permissions_boundary.as_ref().map(|arn| {
            AttachedPermissionsBoundary::builder()
                .permissions_boundary_arn(arn)
                .build()
        }))
        .set_tags(tags)
        .build()
        .unwrap()
}

#[async_trait]
impl IamApi for FakeIam {
    async fn create_role(&self, new_role: &NewRole) -> IamApiResult<Role> {
        self.enter("create_role", &new_role.role_name)?;
        let mut roles = self.roles.lock().unwrap();
        if roles.contains_key(&new_role.role_name) {
            return Err(IamApiError::new("EntityAlreadyExists", "Role already exists"));
        }

        let role = FakeRole {
            path: new_role.path.clone(),
            role_id: format!("AROA{:016}", roles.len() + 1),
            assume_role_policy_document: new_role.assume_role_policy_document.clone(),
            description: new_role.description.clone(),
            max_session_duration: new_role.max_session_duration,
            permissions_boundary: new_role.permissions_boundary.clone(),
            tags: new_role
                .tags
                .iter()
                .flatten()
                .map(|t| (t.key().to_string(), t.value().to_string()))
                .collect(),
            ..Default::default()
        };
        let sdk_role = to_sdk_role(&new_role.role_name, &role);
        roles.insert(new_role.role_name.clone(), role);
        Ok(sdk_role)
    }

    async fn get_role(&self, role_name: &str) -> IamApiResult<Role> {
        self.enter("get_role", role_name)?;
        self.with_existing(role_name, |role| Ok(to_sdk_role(role_name, role)))
    }

    async fn list_roles(&self) -> IamApiResult<Vec<Role>> {
        self.enter("list_roles", "")?;
        let roles = self.roles.lock().unwrap();
        Ok(roles.iter().map(|(name, role)| to_sdk_role(name, role)).collect())
    }

    async fn delete_role(&self, role_name: &str) -> IamApiResult<()> {
        self.enter("delete_role", role_name)?;
        let mut roles = self.roles.lock().unwrap();
        let Some(role) = roles.get(role_name) else {
            return Err(no_such_entity("The role cannot be found."));
        };
        if !role.inline_policies.is_empty() || !role.attached_policies.is_empty() || !role.instance_profiles.is_empty() {
            return Err(IamApiError::new(
                "DeleteConflict",
                "Cannot delete entity, must detach all policies first.",
            ));
        }
        roles.remove(role_name);
        Ok(())
    }

    async fn update_assume_role_policy(&self, role_name: &str, policy_document: &str) -> IamApiResult<()> {
        self.enter("update_assume_role_policy", role_name)?;
        self.with_existing(role_name, |role| {
            role.assume_role_policy_document = policy_document.to_string();
            Ok(())
        })
    }

    async fn update_role_description(&self, role_name: &str, description: &str) -> IamApiResult<()> {
        self.enter("update_role_description", role_name)?;
        self.with_existing(role_name, |role| {
            role.description = (!description.is_empty()).then(|| description.to_string());
            Ok(())
        })
    }

    async fn update_role_max_session_duration(&self, role_name: &str, max_session_duration: i32) -> IamApiResult<()> {
        self.enter("update_role", role_name)?;
        self.with_existing(role_name, |role| {
            role.max_session_duration = Some(max_session_duration);
            Ok(())
        })
    }

    async fn put_role_permissions_boundary(&self, role_name: &str, boundary_arn: &str) -> IamApiResult<()> {
        self.enter("put_role_permissions_boundary", role_name)?;
        self.with_existing(role_name, |role| {
            role.permissions_boundary = Some(boundary_arn.to_string());
            Ok(())
        })
    }

    async fn delete_role_permissions_boundary(&self, role_name: &str) -> IamApiResult<()> {
        self.enter("delete_role_permissions_boundary", role_name)?;
        self.with_existing(role_name, |role| {
            role.permissions_boundary = None;
            Ok(())
        })
    }

    async fn tag_role(&self, role_name: &str, tags: Vec<Tag>) -> IamApiResult<()> {
        self.enter("tag_role", role_name)?;
        self.with_existing(role_name, |role| {
            for tag in tags {
                role.tags.insert(tag.key, tag.value);
            }
            Ok(())
        })
    }

    async fn untag_role(&self, role_name: &str, tag_keys: Vec<String>) -> IamApiResult<()> {
        self.enter("untag_role", role_name)?;
        self.with_existing(role_name, |role| {
            for key in tag_keys {
                role.tags.remove(&key);
            }
            Ok(())
        })
    }

    async fn list_role_policies(&self, role_name: &str) -> IamApiResult<Vec<String>> {
        self.enter("list_role_policies", role_name)?;
        self.with_existing(role_name, |role| Ok(role.inline_policies.keys().cloned().collect()))
    }

    async fn get_role_policy(&self, role_name: &str, policy_name: &str) -> IamApiResult<String> {
        self.enter("get_role_policy", policy_name)?;
        self.with_existing(role_name, |role| match role.inline_policies.get(policy_name) {
            Some(doc) => Ok(urlencoding::encode(doc).into_owned()),
            None => Err(no_such_entity("The role policy cannot be found.")),
        })
    }

    async fn put_role_policy(&self, role_name: &str, policy_name: &str, policy_document: &str) -> IamApiResult<()> {
        self.enter("put_role_policy", policy_name)?;
        self.with_existing(role_name, |role| {
            role.inline_policies
                .insert(policy_name.to_string(), policy_document.to_string());
            Ok(())
        })
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> IamApiResult<()> {
        self.enter("delete_role_policy", policy_name)?;
        self.with_existing(role_name, |role| match role.inline_policies.remove(policy_name) {
            Some(_) => Ok(()),
            None => Err(no_such_entity("The role policy cannot be found.")),
        })
    }

    async fn list_attached_role_policies(&self, role_name: &str) -> IamApiResult<Vec<String>> {
        self.enter("list_attached_role_policies", role_name)?;
        self.with_existing(role_name, |role| Ok(role.attached_policies.iter().cloned().collect()))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> IamApiResult<()> {
        self.enter("attach_role_policy", policy_arn)?;
        self.with_existing(role_name, |role| {
            role.attached_policies.insert(policy_arn.to_string());
            Ok(())
        })
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> IamApiResult<()> {
        self.enter("detach_role_policy", policy_arn)?;
        self.with_existing(role_name, |role| match role.attached_policies.remove(policy_arn) {
            true => Ok(()),
            false => Err(no_such_entity("Policy is not attached.")),
        })
    }

    async fn list_instance_profiles_for_role(&self, role_name: &str) -> IamApiResult<Vec<String>> {
        self.enter("list_instance_profiles_for_role", role_name)?;
        self.with_existing(role_name, |role| Ok(role.instance_profiles.iter().cloned().collect()))
    }

    async fn remove_role_from_instance_profile(&self, instance_profile_name: &str, role_name: &str) -> IamApiResult<()> {
        self.enter("remove_role_from_instance_profile", instance_profile_name)?;
        self.with_existing(role_name, |role| match role.instance_profiles.remove(instance_profile_name) {
            true => Ok(()),
            false => Err(no_such_entity("Instance profile not found.")),
        })
    }
}
