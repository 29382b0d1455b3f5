use std::fmt;

use thiserror::Error;

use crate::paths::KvOperation;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault address is not configured")]
    MissingAddress,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid exclusion pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("No credential available: set a token, a Kubernetes JWT or a JWT")]
    NoCredential,

    #[error("Authentication failed at {mount}: {message}")]
    AuthError { mount: String, message: String },

    #[error("{operation} failed at {path}: {message}")]
    Operation {
        operation: KvOperation,
        path: String,
        message: String,
    },

    #[error("Unsupported value in {path}: field '{field}' is not a string, number or boolean")]
    UnsupportedValue { path: String, field: String },

    #[error("Vault request failed for {path} ({status}): {message}")]
    ClientError {
        path: String,
        status: u16,
        message: String,
    },

    #[error("Vault request error: {0}")]
    RequestError(String),

    #[error("Vault is still sealed after all keys: {progress}/{threshold} shares accepted")]
    StillSealed { progress: u32, threshold: u32 },

    #[error("Refusing to migrate: {0}")]
    ClusterSafety(String),

    #[error("Could not recreate mount '{mount}' after {attempts} attempt(s): {message}")]
    MountRecreate {
        mount: String,
        attempts: u32,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error classes a caller decides exit behavior on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Auth,
    Operation,
    ClusterSafety,
    MountRecreate,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "configuration error",
            ErrorKind::Auth => "authentication error",
            ErrorKind::Operation => "operation error",
            ErrorKind::ClusterSafety => "cluster safety error",
            ErrorKind::MountRecreate => "mount recreation error",
        };
        f.write_str(name)
    }
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::MissingAddress
            | VaultError::Config(_)
            | VaultError::InvalidPattern(_)
            | VaultError::Io(_) => ErrorKind::Config,
            VaultError::NoCredential | VaultError::AuthError { .. } => ErrorKind::Auth,
            VaultError::ClusterSafety(_) => ErrorKind::ClusterSafety,
            VaultError::MountRecreate { .. } => ErrorKind::MountRecreate,
            VaultError::Operation { .. }
            | VaultError::UnsupportedValue { .. }
            | VaultError::ClientError { .. }
            | VaultError::RequestError(_)
            | VaultError::StillSealed { .. }
            | VaultError::Json(_) => ErrorKind::Operation,
        }
    }

    pub(crate) fn operation(
        operation: KvOperation,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        VaultError::Operation {
            operation,
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn auth(mount: impl Into<String>, cause: impl fmt::Display) -> Self {
        VaultError::AuthError {
            mount: mount.into(),
            message: cause.to_string(),
        }
    }
}
