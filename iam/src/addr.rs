use std::path::{Path, PathBuf};

use aws_iam_role_connector_core::{connector::ResourceAddress, error_util::invalid_addr_path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamRoleAddress {
    pub name: String,
}

impl IamRoleAddress {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ResourceAddress for IamRoleAddress {
    fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(format!("aws/iam/roles/{}.ron", self.name))
    }

    fn from_path(path: &Path) -> Result<Self, anyhow::Error> {
        let Some(path_components) = path
            .components()
            .map(|s| s.as_os_str().to_str())
            .collect::<Option<Vec<&str>>>()
        else {
            return Err(invalid_addr_path(path));
        };

        match &path_components[..] {
            ["aws", "iam", "roles", name] => match name.strip_suffix(".ron") {
                Some(name) if !name.is_empty() => Ok(IamRoleAddress::new(name)),
                _ => Err(invalid_addr_path(path)),
            },
            _ => Err(invalid_addr_path(path)),
        }
    }
}
