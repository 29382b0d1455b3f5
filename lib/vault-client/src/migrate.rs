//! Copy a secret tree from one Vault instance to another.
//!
//! The destination namespace mount is dropped and recreated as KV v2 before
//! any data is written. The first failed read or write aborts the run.

use std::time::Duration;

use chrono::Utc;

use crate::auth::{AuthSelector, Session};
use crate::config::{ClientOptions, CredentialBundle};
use crate::error::VaultError;
use crate::filter::ExclusionFilter;
use crate::kv::KvClient;
use crate::paths::{self, KvOperation};
use crate::sys::SysClient;
use crate::tree::TreeWalker;

const DEFAULT_UNMOUNT_ATTEMPTS: u32 = 3;
const DEFAULT_UNMOUNT_BACKOFF: Duration = Duration::from_secs(2);
const DEFAULT_UNMOUNT_DEADLINE: Duration = Duration::from_secs(300);

/// Retry budget for removing an existing destination mount.
#[derive(Debug, Clone)]
pub struct MountPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    pub deadline: Duration,
}

impl Default for MountPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_UNMOUNT_ATTEMPTS,
            backoff: DEFAULT_UNMOUNT_BACKOFF,
            deadline: DEFAULT_UNMOUNT_DEADLINE,
        }
    }
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub namespace: String,
    pub copied: Vec<String>,
    pub excluded: Vec<String>,
}

pub struct MigrationOrchestrator {
    source: CredentialBundle,
    destination: CredentialBundle,
    prefix: String,
    filter: ExclusionFilter,
    options: ClientOptions,
    mount_policy: MountPolicy,
    max_depth: Option<usize>,
}

impl MigrationOrchestrator {
    pub fn new(
        source: CredentialBundle,
        destination: CredentialBundle,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            destination,
            prefix: prefix.into(),
            filter: ExclusionFilter::none(),
            options: ClientOptions::default(),
            mount_policy: MountPolicy::default(),
            max_depth: None,
        }
    }

    pub fn exclude(mut self, filter: ExclusionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn mount_policy(mut self, policy: MountPolicy) -> Self {
        self.mount_policy = policy;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub async fn run(&self) -> Result<MigrationReport, VaultError> {
        let source_address = self.source.address()?;
        let destination_address = self.destination.address()?;
        if source_address == destination_address {
            return Err(VaultError::ClusterSafety(format!(
                "source and destination address are both {source_address}"
            )));
        }
        let namespace = paths::namespace(&self.prefix).ok_or_else(|| {
            VaultError::Config(format!(
                "cannot derive a namespace from backup path '{}'",
                self.prefix
            ))
        })?;

        let source = AuthSelector::new(self.source.clone(), self.options.clone())
            .login()
            .await?;
        let destination = AuthSelector::new(self.destination.clone(), self.options.clone())
            .login()
            .await?;

        ensure_distinct_clusters(&source, &destination).await?;

        let mut walker = TreeWalker::new(&source, &self.prefix);
        if let Some(depth) = self.max_depth {
            walker = walker.with_max_depth(depth);
        }
        let leaves = walker.collect().await?;
        tracing::info!(prefix = %self.prefix, count = leaves.len(), "discovered secrets");

        self.prepare_destination(&destination, namespace, source_address)
            .await?;

        let mut report = MigrationReport {
            namespace: namespace.to_string(),
            ..MigrationReport::default()
        };
        let reader = KvClient::new(&source);
        let writer = KvClient::new(&destination);

        for leaf in leaves {
            if self.filter.excludes(&leaf) {
                tracing::info!(path = %leaf, "excluded by pattern");
                report.excluded.push(leaf);
                continue;
            }

            let record = reader.read(&leaf).await?.ok_or_else(|| {
                VaultError::operation(KvOperation::Read, &leaf, "secret disappeared from source")
            })?;
            writer.write(&leaf, &record).await?;

            tracing::info!(path = %leaf, fields = record.len(), "copied");
            report.copied.push(leaf);
        }

        Ok(report)
    }

    async fn prepare_destination(
        &self,
        destination: &Session,
        namespace: &str,
        source_address: &str,
    ) -> Result<(), VaultError> {
        let sys = SysClient::new(destination);

        if sys.has_mount(namespace).await? {
            tracing::info!(mount = %namespace, "destination mount exists, removing");
            let policy = &self.mount_policy;
            tokio::time::timeout(policy.deadline, unmount_with_retry(&sys, namespace, policy))
                .await
                .map_err(|_| VaultError::MountRecreate {
                    mount: namespace.to_string(),
                    attempts: policy.attempts,
                    message: format!("gave up after {:?}", policy.deadline),
                })??;
        }

        let description = format!(
            "[{}] Backup Engine from {}",
            Utc::now().format("%d.%m.%Y %H:%M:%S UTC"),
            source_address
        );
        sys.mount_kv2(namespace, &description)
            .await
            .map_err(|e| VaultError::MountRecreate {
                mount: namespace.to_string(),
                attempts: 1,
                message: e.to_string(),
            })?;
        tracing::info!(mount = %namespace, "created kv-v2 mount");
        Ok(())
    }
}

async fn ensure_distinct_clusters(
    source: &Session,
    destination: &Session,
) -> Result<(), VaultError> {
    let destination_id = SysClient::new(destination).cluster_identity().await?;
    let source_id = SysClient::new(source).cluster_identity().await?;
    if source_id == destination_id {
        return Err(VaultError::ClusterSafety(format!(
            "{} and {} report the same cluster id {}",
            source.address(),
            destination.address(),
            source_id
        )));
    }
    Ok(())
}

async fn unmount_with_retry(
    sys: &SysClient<'_>,
    mount: &str,
    policy: &MountPolicy,
) -> Result<(), VaultError> {
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match sys.unmount(mount).await {
            Ok(()) => {
                tracing::info!(mount = %mount, attempt, "mount removed");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(mount = %mount, attempt, error = %e, "unmount failed");
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    Err(VaultError::MountRecreate {
        mount: mount.to_string(),
        attempts,
        message: last_error.map(|e| e.to_string()).unwrap_or_default(),
    })
}
