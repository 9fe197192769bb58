//! Set-difference reconciliation of a role's child collections.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::policy::policies_equivalent;

#[derive(Debug, Default, PartialEq)]
pub struct InlinePolicyChanges {
    /// Names present before and absent now.
    pub remove: Vec<String>,
    /// New names, and existing names whose document no longer grants the same thing.
    pub put:    IndexMap<String, ron::Value>,
}

impl InlinePolicyChanges {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.put.is_empty()
    }
}

pub fn diff_inline_policies(
    old: &IndexMap<String, ron::Value>,
    new: &IndexMap<String, ron::Value>,
) -> InlinePolicyChanges {
    let remove = old.keys().filter(|name| !new.contains_key(*name)).cloned().collect();

    let put = new
        .iter()
        .filter(|(name, doc)| match old.get(*name) {
            Some(old_doc) => !policies_equivalent(old_doc, doc),
            None => true,
        })
        .map(|(name, doc)| (name.clone(), doc.clone()))
        .collect();

    InlinePolicyChanges { remove, put }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ManagedPolicyChanges {
    pub detach: Vec<String>,
    pub attach: Vec<String>,
}

impl ManagedPolicyChanges {
    pub fn is_empty(&self) -> bool {
        self.detach.is_empty() && self.attach.is_empty()
    }
}

pub fn diff_managed_policies(old: &BTreeSet<String>, new: &BTreeSet<String>) -> ManagedPolicyChanges {
    ManagedPolicyChanges {
        detach: old.difference(new).cloned().collect(),
        attach: new.difference(old).cloned().collect(),
    }
}
