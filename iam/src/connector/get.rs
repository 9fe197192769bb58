use std::path::Path;

use aws_iam_role_connector_core::{
    connector::{GetResourceOutput, ResourceAddress},
    get_resource_output,
};

use crate::{
    addr::IamRoleAddress,
    op_impl::{read_role, role_outputs},
    resource::IamRoleResource,
};

use super::IamRoleConnector;

impl IamRoleConnector {
    pub async fn do_get(&self, addr: &Path) -> Result<Option<GetResourceOutput>, anyhow::Error> {
        let addr = IamRoleAddress::from_path(addr)?;

        match read_role(self.client.as_ref(), &addr.name, &self.config.ignore_tags).await? {
            Some((role, live)) => get_resource_output!(IamRoleResource::Role(role), role_outputs(&live)),
            None => Ok(None),
        }
    }
}
