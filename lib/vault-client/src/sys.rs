use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::auth::Session;
use crate::config::{ClientOptions, CredentialBundle};
use crate::error::VaultError;
use crate::http::{ApiResponse, HttpTransport};
use crate::models::{ClusterIdentity, InitResult, MountInfo, SealStatus};

const HEALTH_PATH: &str = "sys/health?standbyok=true&perfstandbyok=true";
const MOUNTS_PATH: &str = "sys/mounts";
const SEAL_STATUS_PATH: &str = "sys/seal-status";
const UNSEAL_PATH: &str = "sys/unseal";
const INIT_PATH: &str = "sys/init";

/// Administrative endpoints used around migrations.
pub struct SysClient<'a> {
    session: &'a Session,
}

impl<'a> SysClient<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub async fn cluster_identity(&self) -> Result<ClusterIdentity, VaultError> {
        let response = self.session.get(HEALTH_PATH).await?;
        // Standby and sealed nodes answer with non-200 codes but the same body.
        response
            .raw
            .get("cluster_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(|id| ClusterIdentity(id.to_string()))
            .ok_or_else(|| VaultError::ClientError {
                path: "sys/health".to_string(),
                status: response.status,
                message: "cluster_id missing from health response".to_string(),
            })
    }

    /// Mounted secrets engines keyed by path (with trailing `/`).
    pub async fn mounts(&self) -> Result<BTreeMap<String, MountInfo>, VaultError> {
        let response = self
            .session
            .get(MOUNTS_PATH)
            .await?
            .ensure_success(MOUNTS_PATH)?;
        Ok(parse_mounts(&response))
    }

    pub async fn has_mount(&self, mount: &str) -> Result<bool, VaultError> {
        let key = format!("{}/", mount.trim_matches('/'));
        Ok(self.mounts().await?.contains_key(&key))
    }

    pub async fn unmount(&self, mount: &str) -> Result<(), VaultError> {
        let path = format!("{MOUNTS_PATH}/{}", mount.trim_matches('/'));
        self.session.delete(&path).await?.ensure_success(&path)?;
        Ok(())
    }

    pub async fn mount_kv2(&self, mount: &str, description: &str) -> Result<(), VaultError> {
        let path = format!("{MOUNTS_PATH}/{}", mount.trim_matches('/'));
        let body = json!({
            "type": "kv",
            "description": description,
            "options": {"version": "2"},
        });
        self.session.post(&path, &body).await?.ensure_success(&path)?;
        Ok(())
    }

    pub async fn seal_status(&self) -> Result<SealStatus, VaultError> {
        let response = self
            .session
            .get(SEAL_STATUS_PATH)
            .await?
            .ensure_success(SEAL_STATUS_PATH)?;
        Ok(serde_json::from_value(response.raw)?)
    }
}

fn parse_mounts(response: &ApiResponse) -> BTreeMap<String, MountInfo> {
    // Newer servers nest the table under `data` and repeat it at the top level.
    let table = match response.raw.get("data") {
        Some(Value::Object(data)) => data,
        _ => match &response.raw {
            Value::Object(top) => top,
            _ => return BTreeMap::new(),
        },
    };
    table
        .iter()
        .filter_map(|(path, info)| {
            serde_json::from_value::<MountInfo>(info.clone())
                .ok()
                .map(|info| (path.clone(), info))
        })
        .collect()
}

/// Submits unseal key shares until the instance reports unsealed.
///
/// `sys/unseal` is unauthenticated, so this works before any session exists.
pub async fn unseal(
    bundle: &CredentialBundle,
    keys: &[String],
    options: &ClientOptions,
) -> Result<SealStatus, VaultError> {
    let address = bundle.address()?;
    if keys.is_empty() {
        return Err(VaultError::Config("no unseal keys provided".to_string()));
    }
    let transport = HttpTransport::new(address, options)?;

    let status: SealStatus = serde_json::from_value(
        transport
            .get(SEAL_STATUS_PATH, None)
            .await?
            .ensure_success(SEAL_STATUS_PATH)?
            .raw,
    )?;
    if !status.sealed {
        tracing::info!(address = %address, "already unsealed");
        return Ok(status);
    }

    let mut status = status;
    for (index, key) in keys.iter().enumerate() {
        let response = transport
            .put(UNSEAL_PATH, None, &json!({ "key": key }))
            .await?
            .ensure_success(UNSEAL_PATH)?;
        status = serde_json::from_value(response.raw)?;
        tracing::debug!(
            share = index + 1,
            progress = status.progress,
            threshold = status.threshold,
            "unseal key submitted"
        );
        if !status.sealed {
            tracing::info!(address = %address, "unsealed");
            return Ok(status);
        }
    }
    Err(VaultError::StillSealed {
        progress: status.progress,
        threshold: status.threshold,
    })
}

/// Initializes a fresh instance, returning its key shares and root token.
///
/// The result is only ever shown once by Vault; callers must store it.
pub async fn init(
    bundle: &CredentialBundle,
    shares: u32,
    threshold: u32,
    options: &ClientOptions,
) -> Result<InitResult, VaultError> {
    let address = bundle.address()?;
    if shares == 0 || threshold == 0 || threshold > shares {
        return Err(VaultError::Config(format!(
            "invalid key split: threshold {threshold} of {shares} shares"
        )));
    }
    let transport = HttpTransport::new(address, options)?;
    let body = json!({ "secret_shares": shares, "secret_threshold": threshold });
    let response = transport
        .put(INIT_PATH, None, &body)
        .await?
        .ensure_success(INIT_PATH)?;
    let result: InitResult = serde_json::from_value(response.raw)?;
    tracing::info!(address = %address, shares, threshold, "initialized");
    Ok(result)
}
