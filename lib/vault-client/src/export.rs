use std::collections::BTreeMap;

use crate::auth::Session;
use crate::error::{ErrorKind, VaultError};
use crate::filter::ExclusionFilter;
use crate::kv::KvClient;
use crate::models::SecretValue;
use crate::tree::TreeWalker;

/// Result of flattening several secrets into one map.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub values: BTreeMap<String, SecretValue>,
    pub merged: Vec<String>,
    pub missing: Vec<String>,
    pub excluded: Vec<String>,
    /// Paths that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

/// Reads a list of secret paths and merges their fields into one map.
///
/// Missing or unreadable paths are logged and skipped so one broken secret
/// does not block a pipeline. Fields from later paths overwrite earlier ones.
/// Authentication and configuration problems still abort.
pub struct SecretExporter<'a> {
    session: &'a Session,
    filter: ExclusionFilter,
    recursive: bool,
}

impl<'a> SecretExporter<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            filter: ExclusionFilter::none(),
            recursive: false,
        }
    }

    pub fn exclude(mut self, filter: ExclusionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Treat each path as a prefix and export every secret below it.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub async fn export<S: AsRef<str>>(&self, paths: &[S]) -> Result<ExportReport, VaultError> {
        let mut report = ExportReport::default();

        for path in paths.iter().map(AsRef::as_ref) {
            let path = path.trim();
            if path.is_empty() {
                continue;
            }

            if self.recursive {
                match TreeWalker::new(self.session, path).collect().await {
                    Ok(leaves) => {
                        for leaf in leaves {
                            self.export_one(&leaf, &mut report).await?;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Operation => {
                        tracing::error!(path = %path, error = %e, "failed to walk secret tree");
                        report.failed.push((path.to_string(), e.to_string()));
                    }
                    Err(e) => return Err(e),
                }
            } else {
                self.export_one(path, &mut report).await?;
            }
        }

        tracing::info!(
            merged = report.merged.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            fields = report.values.len(),
            "export finished"
        );
        Ok(report)
    }

    async fn export_one(&self, path: &str, report: &mut ExportReport) -> Result<(), VaultError> {
        if self.filter.excludes(path) {
            tracing::info!(path = %path, "excluded by pattern");
            report.excluded.push(path.to_string());
            return Ok(());
        }

        match KvClient::new(self.session).read(path).await {
            Ok(Some(record)) => {
                for (field, value) in record {
                    if report.values.insert(field.clone(), value).is_some() {
                        tracing::debug!(path = %path, field = %field, "field overridden");
                    }
                }
                report.merged.push(path.to_string());
            }
            Ok(None) => {
                tracing::warn!(path = %path, "secret not found, skipping");
                report.missing.push(path.to_string());
            }
            Err(e) if e.kind() == ErrorKind::Operation => {
                tracing::error!(path = %path, error = %e, "failed to read secret, skipping");
                report.failed.push((path.to_string(), e.to_string()));
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}
