use std::path::Path;

use lazy_static::lazy_static;
use ron::extensions::Extensions;
use serde::{Serialize, de::DeserializeOwned};
use similar::{ChangeTag, TextDiff};

pub use ron::ser::PrettyConfig;

use crate::connector::DiagnosticOutput;

lazy_static! {
    pub static ref RON: ron::Options = ron::Options::default().with_default_extension(Extensions::IMPLICIT_SOME);
}

pub fn optional_string_from_utf8(s: Option<Vec<u8>>) -> anyhow::Result<Option<String>> {
    match s {
        Some(s) => Ok(Some(String::from_utf8(s)?)),
        None => Ok(None),
    }
}

/// Render a line diff between the pretty-printed RON forms of `a` and `b`.
pub fn diff_ron_values<T: Serialize>(a: &T, b: &T) -> anyhow::Result<String> {
    let pretty_config = PrettyConfig::default();
    let a_s = RON.to_string_pretty(a, pretty_config.clone())?;
    let b_s = RON.to_string_pretty(b, pretty_config)?;

    let diff = TextDiff::from_lines(&a_s, &b_s);

    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        out.push_str(sign);
        out.push_str(change.value());
        if change.missing_newline() {
            out.push('\n');
        }
    }
    Ok(out)
}

pub fn ron_check_syntax<T: DeserializeOwned>(a: &[u8]) -> anyhow::Result<DiagnosticOutput> {
    let mut res = DiagnosticOutput::default();
    let s = std::str::from_utf8(a)?;
    if let Err(e) = RON.from_str::<T>(s) {
        res.error(None, format!("{}", e));
    }
    Ok(res)
}

/// Whether `addr` lies under `subpath`, or `subpath` lies under `addr`.
/// An empty subpath or `.` matches everything.
pub fn addr_matches_filter(addr: &Path, subpath: &Path) -> bool {
    if subpath.as_os_str().is_empty() || subpath == Path::new(".") {
        return true;
    }
    addr.starts_with(subpath) || subpath.starts_with(addr)
}
