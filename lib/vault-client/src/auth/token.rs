use super::AuthMethod;
use crate::VaultError;
use crate::http::HttpTransport;
use async_trait::async_trait;

const LOOKUP_SELF_PATH: &str = "auth/token/lookup-self";
const TOKEN_MOUNT: &str = "token";

/// Static token authentication, validated with a self lookup
pub(crate) struct StaticTokenAuth {
    token: String,
}

impl StaticTokenAuth {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl AuthMethod for StaticTokenAuth {
    fn mount(&self) -> &str {
        TOKEN_MOUNT
    }

    async fn authenticate(&self, transport: &HttpTransport) -> Result<String, VaultError> {
        let response = transport
            .get(LOOKUP_SELF_PATH, Some(&self.token))
            .await
            .map_err(|e| VaultError::auth(TOKEN_MOUNT, e))?;

        if !response.is_success() {
            return Err(VaultError::auth(
                TOKEN_MOUNT,
                format!("token rejected ({})", response.failure_message()),
            ));
        }

        Ok(self.token.clone())
    }
}
