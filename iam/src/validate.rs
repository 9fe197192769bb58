use aws_iam_role_connector_core::connector::{DiagnosticOutput, DiagnosticSeverity};
use lazy_static::lazy_static;
use regex::Regex;

use crate::{resource::IamRole, tags::RESERVED_TAG_PREFIX};

pub const MIN_SESSION_DURATION: i32 = 3600;
pub const MAX_SESSION_DURATION: i32 = 43200;

lazy_static! {
    static ref IAM_NAME_RE: Regex = Regex::new(r"^[\w+=,.@-]+$").unwrap();
    static ref SMART_QUOTES_RE: Regex = Regex::new("[“‘]").unwrap();
}

fn check_name(diag: &mut DiagnosticOutput, field: &str, name: &str, max_len: usize) {
    let len = name.chars().count();
    if len == 0 || len > max_len {
        diag.error(Some(field), format!("must be between 1 and {max_len} characters, got {len}"));
    }
    if !name.is_empty() && !IAM_NAME_RE.is_match(name) {
        diag.error(Some(field), format!("`{name}` must match [\\w+=,.@-]"));
    }
}

fn check_policy_document(diag: &mut DiagnosticOutput, field: &str, document: &ron::Value) {
    match serde_json::to_value(document) {
        Ok(serde_json::Value::Object(map)) => {
            if !map.contains_key("Version") {
                diag.warning(Some(field), "no `Version`, IAM will assume the 2008-10-17 policy language");
            }
        }
        Ok(_) => diag.error(Some(field), "policy document must be a map"),
        Err(e) => diag.error(Some(field), format!("policy document is not representable as JSON: {e}")),
    }
}

pub fn validate_role(role_name: &str, role: &IamRole) -> DiagnosticOutput {
    let mut diag = DiagnosticOutput::default();

    check_name(&mut diag, "name", role_name, 64);

    if !role.path.starts_with('/') || !role.path.ends_with('/') || role.path.len() > 512 {
        diag.error(Some("path"), "must begin and end with `/` and be at most 512 characters");
    }

    if let Some(ref description) = role.description {
        if description.is_empty() {
            diag.warning(Some("description"), "an empty description is the same as no description");
        }
        if description.chars().count() > 1000 {
            diag.error(Some("description"), "must be at most 1000 characters");
        }
        if SMART_QUOTES_RE.is_match(description) {
            diag.error(Some("description"), "cannot contain specially formatted single or double quotes: [“‘]");
        }
    }

    check_policy_document(&mut diag, "assume_role_policy_document", &role.assume_role_policy_document);

    if !(MIN_SESSION_DURATION..=MAX_SESSION_DURATION).contains(&role.max_session_duration) {
        diag.error(
            Some("max_session_duration"),
            format!(
                "must be between {MIN_SESSION_DURATION} and {MAX_SESSION_DURATION} seconds, got {}",
                role.max_session_duration
            ),
        );
    }

    if let Some(ref boundary) = role.permissions_boundary
        && boundary.len() > 2048
    {
        diag.error(Some("permissions_boundary"), "must be at most 2048 characters");
    }

    for (name, document) in role.inline_policies.iter().flatten() {
        let field = format!("inline_policies.{name}");
        check_name(&mut diag, &field, name, 128);
        check_policy_document(&mut diag, &field, document);
    }

    for arn in role.managed_policy_arns.iter().flatten() {
        if !arn.starts_with("arn:") {
            diag.error(Some("managed_policy_arns"), format!("`{arn}` is not an ARN"));
        }
    }

    if role.tags.len() > 50 {
        diag.error(Some("tags"), "a role can carry at most 50 tags");
    }
    for (key, value) in &role.tags.0 {
        if key.is_empty() || key.chars().count() > 128 {
            diag.error(Some("tags"), format!("tag key `{key}` must be between 1 and 128 characters"));
        }
        if key.to_lowercase().starts_with(RESERVED_TAG_PREFIX) {
            diag.error(Some("tags"), format!("tag key `{key}` uses the reserved `{RESERVED_TAG_PREFIX}` prefix"));
        }
        if value.chars().count() > 256 {
            diag.error(Some("tags"), format!("value of tag `{key}` must be at most 256 characters"));
        }
    }

    diag
}

#[cfg(test)]
mod tests {
    use aws_iam_role_connector_core::util::RON;

    use super::*;
    use crate::tags::Tags;

    fn role() -> IamRole {
        RON.from_str(
            r#"IamRole(
                assume_role_policy_document: {"Version": "2012-10-17", "Statement": []},
                inline_policies: {"read-only": {"Statement": []}},
                managed_policy_arns: ["arn:aws:iam::aws:policy/ReadOnlyAccess"],
            )"#,
        )
        .unwrap()
    }

    fn fields(diag: &DiagnosticOutput) -> Vec<String> {
        diag.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .filter_map(|d| d.field.clone())
            .collect()
    }

    #[test]
    fn valid_role_passes() {
        let diag = validate_role("web.tier@prod", &role());
        assert!(!diag.has_errors(), "{:?}", diag);
    }

    #[test]
    fn missing_version_is_only_a_warning() {
        let diag = validate_role("web", &role());
        let warned: Vec<_> = diag
            .diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
            .filter_map(|d| d.field.as_deref())
            .collect();
        assert_eq!(warned, vec!["inline_policies.read-only"]);
    }

    #[test]
    fn bad_names_flagged() {
        assert_eq!(fields(&validate_role("web tier", &role())), vec!["name"]);
        assert_eq!(fields(&validate_role(&"r".repeat(65), &role())), vec!["name"]);

        let mut r = role();
        r.inline_policies
            .get_or_insert_default()
            .insert(String::from("has/slash"), RON.from_str("{}").unwrap());
        assert_eq!(fields(&validate_role("web", &r)), vec!["inline_policies.has/slash"]);
    }

    #[test]
    fn out_of_range_fields_flagged() {
        let mut r = role();
        r.max_session_duration = 60;
        r.path = String::from("service");
        r.description = Some(String::from("the “web” role"));
        r.assume_role_policy_document = RON.from_str(r#""not a document""#).unwrap();
        r.managed_policy_arns.get_or_insert_default().insert(String::from("ReadOnlyAccess"));

        let mut flagged = fields(&validate_role("web", &r));
        flagged.sort();
        assert_eq!(
            flagged,
            vec![
                "assume_role_policy_document",
                "description",
                "managed_policy_arns",
                "max_session_duration",
                "path",
            ]
        );
    }

    #[test]
    fn reserved_tag_keys_rejected() {
        let mut r = role();
        r.tags = Tags::from([("aws:cloudformation:stack-name", "web"), ("team", "web")]);
        assert_eq!(fields(&validate_role("web", &r)), vec!["tags"]);

        r.tags = Tags::from([("AWS:owner", "web")]);
        assert_eq!(fields(&validate_role("web", &r)), vec!["tags"]);
    }

    #[test]
    fn empty_description_warns() {
        let mut r = role();
        r.description = Some(String::new());
        let diag = validate_role("web", &r);
        assert!(!diag.has_errors());
        assert!(
            diag.diagnostics
                .iter()
                .any(|d| d.severity == DiagnosticSeverity::Warning && d.field.as_deref() == Some("description"))
        );
    }
}
