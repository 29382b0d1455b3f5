use regex::Regex;

use crate::error::VaultError;
use crate::paths;

/// Optional regular expression that removes secret paths from a batch.
///
/// A path is excluded when the pattern matches either the full logical path
/// or its last segment, so anchored patterns like `^tmp-` work on secret names.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    pattern: Option<Regex>,
}

impl ExclusionFilter {
    /// A blank or absent pattern excludes nothing.
    pub fn new(pattern: Option<&str>) -> Result<Self, VaultError> {
        let pattern = match pattern.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => Some(Regex::new(p)?),
            None => None,
        };
        Ok(Self { pattern })
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn excludes(&self, path: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(path) || pattern.is_match(paths::leaf_name(path)),
            None => false,
        }
    }
}
