use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A resource address maps a typed identifier to and from its path in the repository,
/// e.g. `aws/iam/roles/deploy.ron`.
pub trait ResourceAddress: Send + Sync {
    fn to_path_buf(&self) -> PathBuf;

    fn from_path(path: &Path) -> Result<Self, anyhow::Error>
    where
        Self: Sized;
}

pub trait Resource: Send + Sync {
    fn to_bytes(&self) -> Result<Vec<u8>, anyhow::Error>;

    fn from_bytes(addr: &impl ResourceAddress, s: &[u8]) -> Result<Self, anyhow::Error>
    where
        Self: Sized;
}

/// A single planned mutation. Ops travel between `plan` and `op_exec` in serialized form.
pub trait ConnectorOp: Send + Sync {
    fn to_string(&self) -> Result<String, anyhow::Error>;

    fn from_str(s: &str) -> Result<Self, anyhow::Error>
    where
        Self: Sized;
}

/// Output values keyed by name. A `None` value removes a previously stored output.
pub type OutputMap = HashMap<String, Option<String>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpPlanOutput {
    pub op_definition:    String,
    pub friendly_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OpExecOutput {
    pub outputs:          Option<OutputMap>,
    pub friendly_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetResourceOutput {
    pub resource_definition: Vec<u8>,
    pub outputs:             Option<OutputMap>,
}

/// An example document for a resource type, written out by `skeleton`.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonOutput {
    pub addr: PathBuf,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    /// Dotted path of the offending field, if the problem is tied to one.
    pub field:    Option<String>,
    pub message:  String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticOutput {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticOutput {
    pub fn error(&mut self, field: Option<&str>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: DiagnosticSeverity::Error,
            field:    field.map(String::from),
            message:  message.into(),
        });
    }

    pub fn warning(&mut self, field: Option<&str>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: DiagnosticSeverity::Warning,
            field:    field.map(String::from),
            message:  message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == DiagnosticSeverity::Error)
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Whether this connector owns the resource at `addr`.
    async fn filter(&self, addr: &Path) -> Result<bool, anyhow::Error>;

    async fn list(&self, subpath: &Path) -> Result<Vec<PathBuf>, anyhow::Error>;

    /// Fetch the live state of `addr`. `None` means the resource does not exist.
    async fn get(&self, addr: &Path) -> Result<Option<GetResourceOutput>, anyhow::Error>;

    async fn plan(
        &self,
        addr: &Path,
        current: Option<Vec<u8>>,
        desired: Option<Vec<u8>>,
    ) -> Result<Vec<OpPlanOutput>, anyhow::Error>;

    async fn op_exec(&self, addr: &Path, op: &str) -> Result<OpExecOutput, anyhow::Error>;

    async fn get_skeletons(&self) -> Result<Vec<SkeletonOutput>, anyhow::Error>;

    async fn eq(&self, addr: &Path, a: &[u8], b: &[u8]) -> Result<bool, anyhow::Error>;

    async fn diag(&self, addr: &Path, a: &[u8]) -> Result<DiagnosticOutput, anyhow::Error>;
}

#[macro_export]
macro_rules! connector_op {
    ($op:expr, $msg:expr) => {
        $crate::connector::OpPlanOutput {
            op_definition:    $crate::connector::ConnectorOp::to_string(&$op)?,
            friendly_message: Some($msg),
        }
    };
}

#[macro_export]
macro_rules! op_exec_output {
    ($outputs:expr, $msg:expr) => {
        Ok($crate::connector::OpExecOutput {
            outputs:          Some($outputs.into_iter().map(|(k, v)| (String::from(k), v)).collect()),
            friendly_message: Some($msg),
        })
    };
    ($msg:expr) => {
        Ok($crate::connector::OpExecOutput {
            outputs:          None,
            friendly_message: Some($msg),
        })
    };
}

#[macro_export]
macro_rules! get_resource_output {
    ($resource:expr, $outputs:expr) => {
        Ok(Some($crate::connector::GetResourceOutput {
            resource_definition: $crate::connector::Resource::to_bytes(&$resource)?,
            outputs:             Some($outputs.into_iter().map(|(k, v)| (String::from(k), v)).collect()),
        }))
    };
}

#[macro_export]
macro_rules! skeleton {
    ($addr:expr, $resource:expr) => {
        $crate::connector::SkeletonOutput {
            addr: $crate::connector::ResourceAddress::to_path_buf(&$addr),
            body: $crate::connector::Resource::to_bytes(&$resource)?,
        }
    };
}
