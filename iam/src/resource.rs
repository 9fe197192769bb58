use std::collections::BTreeSet;

use aws_iam_role_connector_core::{
    connector::{Resource, ResourceAddress},
    util::{PrettyConfig, RON},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::addr::IamRoleAddress;
use super::policy::policies_equivalent;
use super::tags::Tags;

pub const DEFAULT_ROLE_PATH: &str = "/";
pub const DEFAULT_MAX_SESSION_DURATION: i32 = 3600;

fn default_path() -> String {
    String::from(DEFAULT_ROLE_PATH)
}

fn default_max_session_duration() -> i32 {
    DEFAULT_MAX_SESSION_DURATION
}

fn is_default_path(path: &str) -> bool {
    path == DEFAULT_ROLE_PATH
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IamRole {
    #[serde(default = "default_path", skip_serializing_if = "is_default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub assume_role_policy_document: ron::Value,
    #[serde(default = "default_max_session_duration")]
    pub max_session_duration: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions_boundary: Option<String>,
    /// `None` leaves inline policies unmanaged. `Some` is the exact set the role carries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_policies: Option<IndexMap<String, ron::Value>>,
    /// `None` leaves attachments unmanaged. `Some` is the exact set the role carries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_policy_arns: Option<BTreeSet<String>>,
    #[serde(default)]
    pub tags: Tags,
}

impl IamRole {
    /// IAM reads an empty description back as no description.
    pub fn effective_description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }

    /// Like `==`, but policy documents are compared by what they grant rather
    /// than how they are written. A child collection left unmanaged on either
    /// side is not compared.
    pub fn is_equivalent(&self, other: &IamRole) -> bool {
        self.path == other.path
            && self.effective_description() == other.effective_description()
            && policies_equivalent(&self.assume_role_policy_document, &other.assume_role_policy_document)
            && self.max_session_duration == other.max_session_duration
            && self.permissions_boundary == other.permissions_boundary
            && match (&self.inline_policies, &other.inline_policies) {
                (Some(a), Some(b)) => inline_policies_equivalent(a, b),
                _ => true,
            }
            && match (&self.managed_policy_arns, &other.managed_policy_arns) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
            && self.tags == other.tags
    }
}

fn inline_policies_equivalent(a: &IndexMap<String, ron::Value>, b: &IndexMap<String, ron::Value>) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(name, doc)| b.get(name).is_some_and(|other_doc| policies_equivalent(doc, other_doc)))
}

pub enum IamRoleResource {
    Role(IamRole),
}

impl Resource for IamRoleResource {
    fn to_bytes(&self) -> Result<Vec<u8>, anyhow::Error> {
        let pretty_config = PrettyConfig::default().struct_names(true);
        match self {
            IamRoleResource::Role(role) => match RON.to_string_pretty(&role, pretty_config) {
                Ok(s) => Ok(s.into()),
                Err(e) => Err(e.into()),
            },
        }
    }

    fn from_bytes(addr: &impl ResourceAddress, s: &[u8]) -> Result<Self, anyhow::Error>
    where
        Self: Sized,
    {
        let _addr = IamRoleAddress::from_path(&addr.to_path_buf())?;

        let s = std::str::from_utf8(s)?;
        Ok(IamRoleResource::Role(RON.from_str(s)?))
    }
}
