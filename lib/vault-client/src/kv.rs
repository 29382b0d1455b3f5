//! Read, write and list against KV mounts of either engine version.
//!
//! Every call first goes to the path exactly as given. When Vault answers
//! that the mount is versioned, the path is rewritten to the v2 shape and the
//! call is retried once. Nothing is remembered between calls.

use serde_json::{Map, Value, json};

use crate::auth::Session;
use crate::error::VaultError;
use crate::http::ApiResponse;
use crate::models::SecretRecord;
use crate::paths::{self, KvOperation};

pub struct KvClient<'a> {
    session: &'a Session,
}

impl<'a> KvClient<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Reads a secret. `Ok(None)` means nothing is stored at the path.
    pub async fn read(&self, path: &str) -> Result<Option<SecretRecord>, VaultError> {
        match self.read_data(path).await? {
            Some((resolved, data)) => SecretRecord::from_json(&resolved, data).map(Some),
            None => Ok(None),
        }
    }

    /// Reads the raw payload and the path that finally answered.
    pub(crate) async fn read_data(
        &self,
        path: &str,
    ) -> Result<Option<(String, Map<String, Value>)>, VaultError> {
        let (resolved, response) = self.resolve(KvOperation::Read, path, None).await?;

        if response.is_not_found() && !response_signals_mismatch(&response) {
            tracing::debug!(path = %resolved, "secret not found");
            return Ok(None);
        }
        if !response.is_success() {
            return Err(VaultError::operation(
                KvOperation::Read,
                &resolved,
                response.failure_message(),
            ));
        }

        let versioned = paths::is_versioned(&resolved);
        let data = response.into_data().and_then(|mut data| {
            if versioned {
                match data.remove("data") {
                    Some(Value::Object(inner)) => Some(inner),
                    _ => None,
                }
            } else {
                Some(data)
            }
        });

        tracing::debug!(path = %resolved, found = data.is_some(), "read secret");
        Ok(data.map(|data| (resolved, data)))
    }

    /// Writes a secret, wrapping the fields for v2 mounts.
    pub async fn write(&self, path: &str, record: &SecretRecord) -> Result<(), VaultError> {
        let (resolved, response) = self.resolve(KvOperation::Write, path, Some(record)).await?;

        if !response.is_success() {
            return Err(VaultError::operation(
                KvOperation::Write,
                &resolved,
                response.failure_message(),
            ));
        }

        tracing::debug!(path = %resolved, fields = record.len(), "wrote secret");
        Ok(())
    }

    /// Lists child names under a path. Subtrees end with `/`.
    /// `Ok(None)` means the path holds no children.
    pub async fn list(&self, path: &str) -> Result<Option<Vec<String>>, VaultError> {
        let (resolved, response) = self.resolve(KvOperation::List, path, None).await?;

        if response.is_not_found() && !response_signals_mismatch(&response) {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(VaultError::operation(
                KvOperation::List,
                &resolved,
                response.failure_message(),
            ));
        }

        let keys: Vec<String> = response
            .into_data()
            .and_then(|mut data| data.remove("keys"))
            .and_then(|keys| match keys {
                Value::Array(keys) => Some(keys),
                _ => None,
            })
            .unwrap_or_default()
            .into_iter()
            .filter_map(|key| match key {
                Value::String(key) => Some(key),
                _ => None,
            })
            .collect();

        tracing::debug!(path = %resolved, children = keys.len(), "listed path");
        if keys.is_empty() {
            Ok(None)
        } else {
            Ok(Some(keys))
        }
    }

    /// Issues the call as given, then at most once more with the v2 shape.
    async fn resolve(
        &self,
        operation: KvOperation,
        path: &str,
        record: Option<&SecretRecord>,
    ) -> Result<(String, ApiResponse), VaultError> {
        let response = self.dispatch(operation, path, record).await?;

        let retry_path = if response_signals_mismatch(&response) {
            paths::versioned_path(path, operation)
        } else {
            None
        };
        let Some(retry_path) = retry_path else {
            return Ok((path.to_string(), response));
        };

        tracing::debug!(
            operation = %operation,
            path = %path,
            retry = %retry_path,
            "versioned engine detected, retrying"
        );
        let response = self.dispatch(operation, &retry_path, record).await?;
        Ok((retry_path, response))
    }

    async fn dispatch(
        &self,
        operation: KvOperation,
        path: &str,
        record: Option<&SecretRecord>,
    ) -> Result<ApiResponse, VaultError> {
        let result = match operation {
            KvOperation::Read => self.session.get(path).await,
            KvOperation::List => self.session.list(path).await,
            KvOperation::Write => {
                let body = write_body(path, record);
                self.session.post(path, &body).await
            }
        };
        result.map_err(|e| VaultError::operation(operation, path, e.to_string()))
    }
}

fn response_signals_mismatch(response: &ApiResponse) -> bool {
    paths::signals_versioned_engine(response.diagnostics())
}

fn write_body(path: &str, record: Option<&SecretRecord>) -> Value {
    let fields = record
        .map(SecretRecord::to_json)
        .unwrap_or_else(|| Value::Object(Map::new()));
    if paths::is_versioned(path) {
        json!({ "data": fields })
    } else {
        fields
    }
}
