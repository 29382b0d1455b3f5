mod jwt;
mod session;
mod token;

pub use session::Session;

use crate::VaultError;
use crate::config::{ClientOptions, CredentialBundle};
use crate::http::HttpTransport;
use async_trait::async_trait;
use jwt::{JWT_MOUNT, JwtAuth, KUBERNETES_MOUNT};
use token::StaticTokenAuth;

/// Trait for authentication methods
#[async_trait]
pub(crate) trait AuthMethod: Send + Sync {
    /// Auth mount (or login path) the method talks to
    fn mount(&self) -> &str;

    /// Obtain a token accepted by the server
    async fn authenticate(&self, transport: &HttpTransport) -> Result<String, VaultError>;
}

/// Picks the credential to use from a bundle and turns it into a session.
pub struct AuthSelector {
    bundle: CredentialBundle,
    options: ClientOptions,
}

impl AuthSelector {
    pub fn new(bundle: CredentialBundle, options: ClientOptions) -> Self {
        Self { bundle, options }
    }

    pub(crate) fn select(&self) -> Result<Box<dyn AuthMethod>, VaultError> {
        let bundle = &self.bundle;
        if let Some(token) = bundle.static_token() {
            return Ok(Box::new(StaticTokenAuth::new(token.to_string())));
        }

        let (default_mount, jwt) = match (bundle.kubernetes_token(), bundle.generic_jwt()) {
            (Some(jwt), _) => (KUBERNETES_MOUNT, jwt),
            (None, Some(jwt)) => (JWT_MOUNT, jwt),
            (None, None) => return Err(VaultError::NoCredential),
        };
        let mount = bundle.mount_override().unwrap_or(default_mount);

        Ok(Box::new(JwtAuth::new(
            mount,
            jwt.to_string(),
            bundle.role_name().map(str::to_string),
        )))
    }

    /// Authenticates and returns a validated session. Failures are final.
    pub async fn login(&self) -> Result<Session, VaultError> {
        let address = self.bundle.address()?;
        let method = self.select()?;
        let transport = HttpTransport::new(address, &self.options)?;

        tracing::debug!(address = %address, mount = %method.mount(), "authenticating");
        let token = method.authenticate(&transport).await?;
        tracing::info!(address = %address, mount = %method.mount(), "authenticated");

        Ok(Session::new(transport, token))
    }
}
