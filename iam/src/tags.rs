use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use aws_sdk_iam::types::Tag;

/// Keys under this prefix are owned by AWS and can never be managed.
pub const RESERVED_TAG_PREFIX: &str = "aws:";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Tags(pub BTreeMap<String, String>);

impl From<Option<Vec<Tag>>> for Tags {
    fn from(value: Option<Vec<Tag>>) -> Self {
        match value {
            Some(tags) => Tags(tags.into_iter().map(|t| (t.key, t.value)).collect()),
            None => Tags(BTreeMap::new()),
        }
    }
}

impl From<Tags> for Option<Vec<Tag>> {
    fn from(val: Tags) -> Self {
        if val.0.is_empty() {
            return None;
        }

        let mut out_vec = Vec::new();
        for (k, v) in val.0 {
            if let Ok(tag) = Tag::builder().key(k).value(v).build() {
                out_vec.push(tag);
            }
        }

        Some(out_vec)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Tags {
    fn from(value: [(&str, &str); N]) -> Self {
        Tags(value.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }
}

impl Tags {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop AWS-reserved tags and any tags the connector is configured to leave alone.
    pub fn without_ignored(self, ignore: &IgnoreTags) -> Tags {
        Tags(
            self.0
                .into_iter()
                .filter(|(k, _)| !k.starts_with(RESERVED_TAG_PREFIX) && !ignore.matches(k))
                .collect(),
        )
    }
}

/// Tags that exist on the role but are managed outside this connector.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct IgnoreTags {
    pub keys:         Vec<String>,
    pub key_prefixes: Vec<String>,
}

impl IgnoreTags {
    pub fn matches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key) || self.key_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

// From a pair of tag maps, determine the keys to pass to untag and the tags to pass to tag respectively
pub fn tag_diff(old_tags: &Tags, new_tags: &Tags) -> anyhow::Result<(Vec<String>, Vec<Tag>)> {
    let mut untag_keys = Vec::new();
    for k in old_tags.0.keys() {
        if !new_tags.0.contains_key(k) {
            untag_keys.push(k.to_string());
        }
    }

    let mut new_tagset = Vec::new();
    for (key, new_value) in &new_tags.0 {
        if old_tags.0.get(key) != Some(new_value) {
            new_tagset.push(Tag::builder().key(key).value(new_value).build()?);
        }
    }

    Ok((untag_keys, new_tagset))
}
