use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::VaultError;

pub const DEFAULT_K8S_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to authenticate against one Vault instance.
///
/// Only one credential is ever used, by precedence: static token, then
/// Kubernetes JWT, then generic JWT.
#[derive(Clone, Default)]
pub struct CredentialBundle {
    pub address: Option<String>,
    pub token: Option<String>,
    pub kubernetes_jwt: Option<String>,
    pub jwt: Option<String>,
    pub auth_mount: Option<String>,
    pub role: Option<String>,
}

impl CredentialBundle {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_kubernetes_jwt(mut self, jwt: impl Into<String>) -> Self {
        self.kubernetes_jwt = Some(jwt.into());
        self
    }

    pub fn with_jwt(mut self, jwt: impl Into<String>) -> Self {
        self.jwt = Some(jwt.into());
        self
    }

    pub fn with_auth_mount(mut self, mount: impl Into<String>) -> Self {
        self.auth_mount = Some(mount.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// The configured address, with blank values treated as missing.
    pub fn address(&self) -> Result<&str, VaultError> {
        self.address
            .as_deref()
            .map(|address| address.trim().trim_end_matches('/'))
            .filter(|address| !address.is_empty())
            .ok_or(VaultError::MissingAddress)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl CredentialBundle {
    pub(crate) fn static_token(&self) -> Option<&str> {
        present(&self.token)
    }

    pub(crate) fn kubernetes_token(&self) -> Option<&str> {
        present(&self.kubernetes_jwt)
    }

    pub(crate) fn generic_jwt(&self) -> Option<&str> {
        present(&self.jwt)
    }

    pub(crate) fn mount_override(&self) -> Option<&str> {
        present(&self.auth_mount)
    }

    pub(crate) fn role_name(&self) -> Option<&str> {
        present(&self.role)
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redacted(value: &Option<String>) -> &'static str {
            if value.is_some() { "<redacted>" } else { "<none>" }
        }
        f.debug_struct("CredentialBundle")
            .field("address", &self.address)
            .field("token", &redacted(&self.token))
            .field("kubernetes_jwt", &redacted(&self.kubernetes_jwt))
            .field("jwt", &redacted(&self.jwt))
            .field("auth_mount", &self.auth_mount)
            .field("role", &self.role)
            .finish()
    }
}

/// Transport settings shared by every session a command opens.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: None,
        }
    }
}

impl ClientOptions {
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }
}

/// Reads a service account token projected into the pod.
pub fn load_service_account_token(path: impl AsRef<Path>) -> Result<String, VaultError> {
    let path = path.as_ref();
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            VaultError::Config(format!(
                "Failed to read JWT from {}: {}",
                path.display(),
                e
            ))
        })
}
