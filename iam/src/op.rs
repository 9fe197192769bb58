use aws_iam_role_connector_core::{connector::ConnectorOp, util::RON};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::resource::IamRole;
use super::tags::Tags;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IamRoleConnectorOp {
    CreateRole(IamRole),
    UpdateAssumeRolePolicy(ron::Value, ron::Value),
    UpdateDescription(Option<String>, Option<String>),
    UpdateMaxSessionDuration(i32, i32),
    UpdatePermissionsBoundary(Option<String>, Option<String>),
    UpdateTags(Tags, Tags),
    PutInlinePolicies(IndexMap<String, ron::Value>),
    DeleteInlinePolicies(Vec<String>),
    AttachManagedPolicies(Vec<String>),
    DetachManagedPolicies(Vec<String>),
    DeleteRole { force_detach_policies: bool },
}

impl ConnectorOp for IamRoleConnectorOp {
    fn to_string(&self) -> Result<String, anyhow::Error> {
        Ok(RON.to_string(self)?)
    }

    fn from_str(s: &str) -> Result<Self, anyhow::Error>
    where
        Self: Sized,
    {
        Ok(RON.from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_survive_serialization() {
        let ops = vec![
            IamRoleConnectorOp::UpdateDescription(None, Some(String::from("Web tier"))),
            IamRoleConnectorOp::UpdateMaxSessionDuration(3600, 7200),
            IamRoleConnectorOp::DetachManagedPolicies(vec![String::from("arn:aws:iam::aws:policy/ReadOnlyAccess")]),
            IamRoleConnectorOp::DeleteRole {
                force_detach_policies: true,
            },
        ];

        for op in ops {
            let s = ConnectorOp::to_string(&op).unwrap();
            assert_eq!(<IamRoleConnectorOp as ConnectorOp>::from_str(&s).unwrap(), op);
        }
    }
}
