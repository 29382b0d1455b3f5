use std::fmt;

use serde_json::Value;

use crate::error::VaultError;
use crate::http::{ApiResponse, HttpTransport};

/// An authenticated connection to one Vault instance.
///
/// A session belongs to the command that opened it. It is not cloneable and
/// the token is never renewed.
pub struct Session {
    transport: HttpTransport,
    token: String,
}

impl Session {
    pub(crate) fn new(transport: HttpTransport, token: String) -> Self {
        Self { transport, token }
    }

    pub fn address(&self) -> &str {
        self.transport.address()
    }

    pub(crate) async fn get(&self, path: &str) -> Result<ApiResponse, VaultError> {
        self.transport.get(path, Some(&self.token)).await
    }

    pub(crate) async fn list(&self, path: &str) -> Result<ApiResponse, VaultError> {
        self.transport.list(path, Some(&self.token)).await
    }

    pub(crate) async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, VaultError> {
        self.transport.post(path, Some(&self.token), body).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<ApiResponse, VaultError> {
        self.transport.delete(path, Some(&self.token)).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address())
            .field("token", &"<redacted>")
            .finish()
    }
}
