//! Helpers for the two KV path shapes.
//!
//! KV v1 addresses a secret as `<mount>/<subpath>`. KV v2 inserts a marker
//! segment after the mount: `data` for reads and writes, `metadata` for
//! listings. Nothing here remembers which engine a mount runs; callers probe
//! on every request.

use std::fmt;

pub const SEPARATOR: char = '/';

const DATA_MARKER: &str = "data";
const METADATA_MARKER: &str = "metadata";

/// Warning Vault attaches when a v1-shaped path hits a KV v2 mount.
const VERSIONED_ENGINE_WARNING: &str = "Invalid path for a versioned K/V secrets engine";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvOperation {
    Read,
    Write,
    List,
}

impl KvOperation {
    fn marker(self) -> &'static str {
        match self {
            KvOperation::Read | KvOperation::Write => DATA_MARKER,
            KvOperation::List => METADATA_MARKER,
        }
    }
}

impl fmt::Display for KvOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KvOperation::Read => "Read",
            KvOperation::Write => "Write",
            KvOperation::List => "List",
        };
        f.write_str(name)
    }
}

/// True when any server diagnostic says the path needs the v2 shape.
///
/// This is the only place that depends on Vault's exact wording.
pub fn signals_versioned_engine<'a, I>(diagnostics: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    diagnostics
        .into_iter()
        .any(|message| message.contains(VERSIONED_ENGINE_WARNING))
}

fn trim_leading(path: &str) -> &str {
    path.trim_start_matches(SEPARATOR)
}

/// Whether the segment right after the mount is a v2 marker.
pub fn is_versioned(path: &str) -> bool {
    let mut segments = trim_leading(path).split(SEPARATOR);
    segments.next();
    matches!(segments.next(), Some(DATA_MARKER) | Some(METADATA_MARKER))
}

/// Inserts the v2 marker for `operation` after the mount name.
///
/// Returns `None` when the path already carries a marker or has no mount
/// segment to anchor the marker to, so a caller can never rewrite twice.
pub fn versioned_path(path: &str, operation: KvOperation) -> Option<String> {
    if is_versioned(path) {
        return None;
    }
    let trimmed = trim_leading(path);
    match trimmed.split_once(SEPARATOR) {
        Some((mount, rest)) if !mount.is_empty() => {
            Some(format!("{mount}/{}/{rest}", operation.marker()))
        }
        None if operation == KvOperation::List && !trimmed.is_empty() => {
            Some(format!("{trimmed}/{}", operation.marker()))
        }
        _ => None,
    }
}

/// Drops the v2 marker, leaving the path callers think in.
pub fn logical_path(path: &str) -> String {
    let trimmed = trim_leading(path);
    if !is_versioned(trimmed) {
        return trimmed.to_string();
    }
    let mut segments = trimmed.splitn(3, SEPARATOR);
    let mount = segments.next().unwrap_or_default();
    segments.next();
    match segments.next() {
        Some(rest) => format!("{mount}/{rest}"),
        None => format!("{mount}/"),
    }
}

/// First path segment, which names the mount.
pub fn namespace(path: &str) -> Option<&str> {
    trim_leading(path)
        .split(SEPARATOR)
        .next()
        .filter(|segment| !segment.is_empty())
}

/// Last non-empty segment of a path.
pub fn leaf_name(path: &str) -> &str {
    path.trim_end_matches(SEPARATOR)
        .rsplit(SEPARATOR)
        .next()
        .unwrap_or_default()
}

pub fn is_subtree(name: &str) -> bool {
    name.ends_with(SEPARATOR)
}

pub fn as_prefix(path: &str) -> String {
    let trimmed = trim_leading(path);
    if is_subtree(trimmed) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{SEPARATOR}")
    }
}
