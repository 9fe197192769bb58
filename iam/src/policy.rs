//! Policy documents are stored as RON values and sent to IAM as JSON.

use anyhow::Context;
use aws_iam_role_connector_core::util::RON;
use serde_json::Value;

pub fn ron_from_json(json_s: &str) -> anyhow::Result<ron::Value> {
    let val: Value = serde_json::from_str(json_s).context("Policy document is not valid JSON")?;
    let rval: ron::Value = RON.from_str(&RON.to_string(&val)?)?;
    Ok(rval)
}

/// IAM returns policy documents URL-encoded.
pub fn decode_policy_document(encoded: &str) -> anyhow::Result<ron::Value> {
    let json_s = urlencoding::decode(encoded)?;
    ron_from_json(&json_s)
}

pub fn policy_to_json(document: &ron::Value) -> anyhow::Result<String> {
    serde_json::to_string(document).context("Failed to serialize policy document as JSON")
}

/// Whether two documents grant the same thing as far as IAM is concerned.
///
/// IAM treats `"s3:GetObject"` and `["s3:GetObject"]` alike, and ignores the order
/// of and duplicates within statement lists, actions, resources and principals.
pub fn policies_equivalent(a: &ron::Value, b: &ron::Value) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => normalize(a) == normalize(b),
        _ => a == b,
    }
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.into_iter().map(normalize).collect();
            items.sort_by_cached_key(|v| v.to_string());
            items.dedup();
            match items.len() {
                1 => items.swap_remove(0),
                _ => Value::Array(items),
            }
        }
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect()),
        other => other,
    }
}
