use std::{
    fmt::Debug,
    path::{Path, PathBuf},
};

use crate::connector::ResourceAddress;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Invalid address path: {0:?}")]
    InvalidAddr(PathBuf),
    #[error("Invalid op {op} for address {addr:?}! This is a bug in the connector.")]
    InvalidOp { addr: PathBuf, op: String },
}

pub fn invalid_addr_path(path: &Path) -> anyhow::Error {
    ConnectorError::InvalidAddr(path.to_path_buf()).into()
}

pub fn invalid_op(addr: &impl ResourceAddress, op: &impl Debug) -> anyhow::Error {
    ConnectorError::InvalidOp {
        addr: addr.to_path_buf(),
        op:   format!("{:?}", op),
    }
    .into()
}
