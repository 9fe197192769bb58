use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use aws_iam_role_connector_core::{
    config::AwsServiceConfig,
    connector::{
        Connector, DiagnosticOutput, GetResourceOutput, OpExecOutput, OpPlanOutput, Resource, ResourceAddress,
        SkeletonOutput,
    },
    skeleton,
    util::{RON, optional_string_from_utf8, ron_check_syntax},
};
use indexmap::IndexMap;

use crate::{
    addr::IamRoleAddress,
    api::IamApi,
    config::IamRoleConnectorConfig,
    policy::ron_from_json,
    resource::{DEFAULT_MAX_SESSION_DURATION, DEFAULT_ROLE_PATH, IamRole, IamRoleResource},
    tags::Tags,
    validate::validate_role,
};

mod get;
mod import;
mod list;
mod op_exec;
mod plan;

pub struct IamRoleConnector {
    client:     Arc<dyn IamApi>,
    account_id: String,
    config:     IamRoleConnectorConfig,
}

impl IamRoleConnector {
    /// Load config from `prefix`, check the ambient credentials belong to the
    /// configured account, and connect to IAM.
    pub async fn new(prefix: &Path) -> Result<Self, anyhow::Error> {
        let config = IamRoleConnectorConfig::try_load(prefix).await?;

        let account_id = config.verify_sts().await?;

        let sdk_config = config.aws.to_sdk_config().await;
        let client = aws_sdk_iam::Client::new(&sdk_config);

        Ok(Self::with_client(Arc::new(client), account_id, config))
    }

    pub fn with_client(client: Arc<dyn IamApi>, account_id: impl Into<String>, config: IamRoleConnectorConfig) -> Self {
        Self {
            client,
            account_id: account_id.into(),
            config,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Example role documents. Needs no AWS access.
    pub fn skeletons() -> Result<Vec<SkeletonOutput>, anyhow::Error> {
        let assume_role_policy_json = r#"{
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Principal": {
                        "Service": "ec2.amazonaws.com"
                    },
                    "Action": "sts:AssumeRole"
                }
            ]
        }"#;

        let read_config_json = r#"{
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Action": ["s3:GetObject"],
                    "Resource": "arn:aws:s3:::[bucket_name]/config/*"
                }
            ]
        }"#;

        let mut inline_policies = IndexMap::new();
        inline_policies.insert(String::from("read-config"), ron_from_json(read_config_json)?);

        Ok(vec![skeleton!(
            IamRoleAddress::new("[role_name]"),
            IamRoleResource::Role(IamRole {
                path: String::from(DEFAULT_ROLE_PATH),
                description: Some(String::from("[description]")),
                assume_role_policy_document: ron_from_json(assume_role_policy_json)?,
                max_session_duration: DEFAULT_MAX_SESSION_DURATION,
                permissions_boundary: None,
                inline_policies: Some(inline_policies),
                managed_policy_arns: Some([String::from("arn:aws:iam::aws:policy/AmazonSSMManagedInstanceCore")].into()),
                tags: Tags::default(),
            })
        )])
    }

    /// Syntax check, then field validation. Needs no AWS access.
    pub fn validate(addr: &Path, a: &[u8]) -> Result<DiagnosticOutput, anyhow::Error> {
        let addr = IamRoleAddress::from_path(addr)?;

        let syntax = ron_check_syntax::<IamRole>(a)?;
        if syntax.has_errors() {
            return Ok(syntax);
        }

        let role: IamRole = RON.from_str(std::str::from_utf8(a)?)?;
        Ok(validate_role(&addr.name, &role))
    }

    fn parse_role(addr: &IamRoleAddress, s: &[u8]) -> Result<IamRole, anyhow::Error> {
        let IamRoleResource::Role(role) = IamRoleResource::from_bytes(addr, s)?;
        Ok(role)
    }
}

#[async_trait]
impl Connector for IamRoleConnector {
    async fn filter(&self, addr: &Path) -> Result<bool, anyhow::Error> {
        if let Ok(_addr) = IamRoleAddress::from_path(addr) {
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list(&self, subpath: &Path) -> Result<Vec<PathBuf>, anyhow::Error> {
        self.do_list(subpath).await
    }

    async fn get(&self, addr: &Path) -> Result<Option<GetResourceOutput>, anyhow::Error> {
        self.do_get(addr).await
    }

    async fn plan(
        &self,
        addr: &Path,
        current: Option<Vec<u8>>,
        desired: Option<Vec<u8>>,
    ) -> Result<Vec<OpPlanOutput>, anyhow::Error> {
        self.do_plan(addr, optional_string_from_utf8(current)?, optional_string_from_utf8(desired)?)
            .await
    }

    async fn op_exec(&self, addr: &Path, op: &str) -> Result<OpExecOutput, anyhow::Error> {
        self.do_op_exec(addr, op).await
    }

    async fn get_skeletons(&self) -> Result<Vec<SkeletonOutput>, anyhow::Error> {
        Self::skeletons()
    }

    async fn eq(&self, addr: &Path, a: &[u8], b: &[u8]) -> Result<bool, anyhow::Error> {
        let addr = IamRoleAddress::from_path(addr)?;
        let a = Self::parse_role(&addr, a)?;
        let b = Self::parse_role(&addr, b)?;
        Ok(a.is_equivalent(&b))
    }

    async fn diag(&self, addr: &Path, a: &[u8]) -> Result<DiagnosticOutput, anyhow::Error> {
        Self::validate(addr, a)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeSet;

    use aws_iam_role_connector_core::connector::{ConnectorOp, DiagnosticSeverity};

    use super::*;
    use crate::{
        op::IamRoleConnectorOp,
        testing::{FakeIam, FakeRole},
    };

    pub const TRUST: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":{"Service":"ec2.amazonaws.com"},"Action":"sts:AssumeRole"}]}"#;

    pub fn connector(fake: Arc<FakeIam>) -> IamRoleConnector {
        IamRoleConnector::with_client(fake, "123456789012", IamRoleConnectorConfig::default())
    }

    pub fn role_path(name: &str) -> PathBuf {
        IamRoleAddress::new(name).to_path_buf()
    }

    pub fn fake_role() -> FakeRole {
        FakeRole {
            path: String::from("/"),
            role_id: String::from("AROAEXAMPLE"),
            assume_role_policy_document: String::from(TRUST),
            ..Default::default()
        }
    }

    pub fn ops(plan: &[OpPlanOutput]) -> Vec<IamRoleConnectorOp> {
        plan.iter()
            .map(|p| <IamRoleConnectorOp as ConnectorOp>::from_str(&p.op_definition).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn filter_accepts_only_role_addresses() {
        let c = connector(Arc::new(FakeIam::default()));
        assert!(c.filter(Path::new("aws/iam/roles/web.ron")).await.unwrap());
        assert!(!c.filter(Path::new("aws/iam/users/web.ron")).await.unwrap());
    }

    #[tokio::test]
    async fn skeleton_is_a_valid_role() {
        let c = connector(Arc::new(FakeIam::default()));
        let skeletons = c.get_skeletons().await.unwrap();
        assert_eq!(skeletons.len(), 1);
        assert_eq!(skeletons[0].addr, role_path("[role_name]"));

        let role: IamRole = RON.from_str(std::str::from_utf8(&skeletons[0].body).unwrap()).unwrap();
        assert!(role.inline_policies.unwrap().contains_key("read-config"));
    }

    #[tokio::test]
    async fn eq_uses_policy_equivalence() {
        let c = connector(Arc::new(FakeIam::default()));
        let a = br#"IamRole(assume_role_policy_document: {"Statement": [{"Action": "sts:AssumeRole"}]})"#;
        let b = br#"IamRole(assume_role_policy_document: {"Statement": {"Action": ["sts:AssumeRole"]}}, path: "/")"#;
        let d = br#"IamRole(assume_role_policy_document: {"Statement": {"Action": ["sts:TagSession"]}})"#;

        assert!(c.eq(&role_path("web"), a, b).await.unwrap());
        assert!(!c.eq(&role_path("web"), a, d).await.unwrap());
    }

    #[tokio::test]
    async fn diag_reports_syntax_then_validation() {
        let c = connector(Arc::new(FakeIam::default()));

        let syntax = c.diag(&role_path("web"), b"IamRole(path: ").await.unwrap();
        assert!(syntax.has_errors());

        let invalid = c
            .diag(
                &role_path("web"),
                br#"IamRole(assume_role_policy_document: {}, max_session_duration: 100)"#,
            )
            .await
            .unwrap();
        let errors: Vec<_> = invalid
            .diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field.as_deref(), Some("max_session_duration"));

        let ok = c
            .diag(&role_path("web"), br#"IamRole(assume_role_policy_document: {})"#)
            .await
            .unwrap();
        assert!(!ok.has_errors());
    }

    /// Plan a change, run every op, and check the live role now reads back as the desired document.
    #[tokio::test]
    async fn plan_and_apply_converges() {
        let mut existing = fake_role();
        existing.description = Some(String::from("old"));
        existing.inline_policies = [(String::from("stale"), String::from(r#"{"Statement":[]}"#))].into();
        existing.attached_policies = [String::from("arn:aws:iam::aws:policy/ReadOnlyAccess")].into();
        existing.tags = [(String::from("env"), String::from("dev"))].into();
        let fake = Arc::new(FakeIam::default().with_role("web", existing));
        let c = connector(fake.clone());

        let current = c.get(&role_path("web")).await.unwrap().unwrap().resource_definition;
        let desired = format!(
            r#"IamRole(
                assume_role_policy_document: {TRUST},
                max_session_duration: 7200,
                permissions_boundary: "arn:aws:iam::123456789012:policy/boundary",
                inline_policies: {{"fresh": {{"Statement": [{{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"}}]}}}},
                managed_policy_arns: ["arn:aws:iam::aws:policy/PowerUserAccess"],
                tags: {{"env": "prod"}},
            )"#
        );

        let plan = c
            .plan(&role_path("web"), Some(current), Some(desired.clone().into_bytes()))
            .await
            .unwrap();
        for op in &plan {
            c.op_exec(&role_path("web"), &op.op_definition).await.unwrap();
        }

        let after = c.get(&role_path("web")).await.unwrap().unwrap().resource_definition;
        assert!(c.eq(&role_path("web"), &after, desired.as_bytes()).await.unwrap());

        let replan = c
            .plan(&role_path("web"), Some(after), Some(desired.into_bytes()))
            .await
            .unwrap();
        assert!(replan.is_empty());

        let live = fake.role("web").unwrap();
        assert_eq!(live.attached_policies, BTreeSet::from([String::from("arn:aws:iam::aws:policy/PowerUserAccess")]));
        assert!(live.description.is_none());
    }
}
