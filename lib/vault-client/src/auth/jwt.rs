use super::AuthMethod;
use crate::VaultError;
use crate::http::HttpTransport;
use async_trait::async_trait;
use serde::Serialize;

pub(crate) const KUBERNETES_MOUNT: &str = "kubernetes";
pub(crate) const JWT_MOUNT: &str = "jwt";

/// Login with a JWT (Kubernetes service account or CI id token) at an auth mount
pub(crate) struct JwtAuth {
    login_path: String,
    jwt: String,
    role: Option<String>,
}

impl JwtAuth {
    pub fn new(mount: &str, jwt: String, role: Option<String>) -> Self {
        Self {
            login_path: login_path(mount),
            jwt,
            role,
        }
    }
}

/// `kubernetes` → `auth/kubernetes/login`; full login paths pass through.
pub(crate) fn login_path(mount: &str) -> String {
    let mount = mount.trim_matches('/');
    let path = if mount.starts_with("auth/") {
        mount.to_string()
    } else {
        format!("auth/{mount}")
    };
    if path.ends_with("/login") {
        path
    } else {
        format!("{path}/login")
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    jwt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[async_trait]
impl AuthMethod for JwtAuth {
    fn mount(&self) -> &str {
        &self.login_path
    }

    async fn authenticate(&self, transport: &HttpTransport) -> Result<String, VaultError> {
        let body = serde_json::to_value(LoginRequest {
            jwt: &self.jwt,
            role: self.role.as_deref(),
        })?;

        let response = transport
            .post(&self.login_path, None, &body)
            .await
            .map_err(|e| VaultError::auth(&self.login_path, e))?;

        if !response.is_success() {
            return Err(VaultError::auth(
                &self.login_path,
                response.failure_message(),
            ));
        }

        match response.body.auth {
            Some(auth) if !auth.client_token.is_empty() => Ok(auth.client_token),
            _ => Err(VaultError::auth(
                &self.login_path,
                "login response carried no client token",
            )),
        }
    }
}
