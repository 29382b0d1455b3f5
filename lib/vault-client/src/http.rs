use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::ClientOptions;
use crate::error::VaultError;
use crate::models::LogicalResponse;

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Thin wrapper over one `reqwest::Client` bound to one Vault address.
pub(crate) struct HttpTransport {
    address: String,
    client: reqwest::Client,
}

/// A Vault reply with its status. Error statuses are returned, not raised,
/// because 404 bodies carry the warnings the path resolver inspects.
#[derive(Debug)]
pub(crate) struct ApiResponse {
    pub status: u16,
    pub body: LogicalResponse,
    pub raw: Value,
}

impl HttpTransport {
    pub fn new(address: &str, options: &ClientOptions) -> Result<Self, VaultError> {
        let mut builder = reqwest::Client::builder().timeout(options.request_timeout);
        if let Some(ref agent) = options.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| VaultError::RequestError(e.to_string()))?;

        Ok(Self {
            address: address.to_string(),
            client,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<ApiResponse, VaultError> {
        self.send(Method::GET, path, token, &[], None).await
    }

    pub async fn list(&self, path: &str, token: Option<&str>) -> Result<ApiResponse, VaultError> {
        self.send(Method::GET, path, token, &[("list", "true")], None)
            .await
    }

    pub async fn post(
        &self,
        path: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Result<ApiResponse, VaultError> {
        self.send(Method::POST, path, token, &[], Some(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Result<ApiResponse, VaultError> {
        self.send(Method::PUT, path, token, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<ApiResponse, VaultError> {
        self.send(Method::DELETE, path, token, &[], None).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<ApiResponse, VaultError> {
        let url = self.url(path);
        tracing::trace!(method = %method, url = %url, "vault request");

        let mut request = self.client.request(method, &url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::RequestError(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| VaultError::RequestError(format!("{url}: {e}")))?;

        ApiResponse::parse(status, &text).map_err(|e| {
            VaultError::RequestError(format!("Invalid response from {url}: {e}"))
        })
    }
}

impl ApiResponse {
    fn parse(status: u16, text: &str) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self {
                status,
                body: LogicalResponse::default(),
                raw: Value::Null,
            });
        }

        let raw: Value = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(e) if (200..300).contains(&status) => return Err(e),
            // Proxies in front of Vault answer errors in plain text.
            Err(_) => {
                return Ok(Self {
                    status,
                    body: LogicalResponse {
                        errors: Some(vec![text.trim().to_string()]),
                        ..LogicalResponse::default()
                    },
                    raw: Value::Null,
                });
            }
        };
        let body = LogicalResponse::deserialize(&raw).unwrap_or_default();
        Ok(Self { status, body, raw })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Warnings and errors the server attached, in that order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &str> {
        self.body
            .warnings
            .iter()
            .flatten()
            .chain(self.body.errors.iter().flatten())
            .map(String::as_str)
    }

    pub fn failure_message(&self) -> String {
        let messages: Vec<&str> = self.diagnostics().filter(|m| !m.is_empty()).collect();
        if messages.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            format!("HTTP {}: {}", self.status, messages.join("; "))
        }
    }

    pub fn into_data(self) -> Option<Map<String, Value>> {
        self.body.data
    }

    /// Non-success statuses become `ClientError`.
    pub fn ensure_success(self, path: &str) -> Result<Self, VaultError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(VaultError::ClientError {
            path: path.to_string(),
            status: self.status,
            message: self.failure_message(),
        })
    }
}
