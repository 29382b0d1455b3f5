use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::VaultError;

/// A single secret field value. Vault accepts arbitrary JSON, but secrets
/// handled here are flat: anything else is rejected on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretValue {
    Bool(bool),
    Number(Number),
    String(String),
}

impl SecretValue {
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(SecretValue::String(s)),
            Value::Number(n) => Some(SecretValue::Number(n)),
            Value::Bool(b) => Some(SecretValue::Bool(b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretValue::String(s) => f.write_str(s),
            SecretValue::Number(n) => write!(f, "{n}"),
            SecretValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        SecretValue::String(value.to_string())
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        SecretValue::String(value)
    }
}

impl From<bool> for SecretValue {
    fn from(value: bool) -> Self {
        SecretValue::Bool(value)
    }
}

impl From<i64> for SecretValue {
    fn from(value: i64) -> Self {
        SecretValue::Number(value.into())
    }
}

/// Field name to scalar value mapping for one secret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRecord(BTreeMap<String, SecretValue>);

impl SecretRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a raw payload, naming the first field that is not a scalar.
    pub fn from_json(path: &str, data: Map<String, Value>) -> Result<Self, VaultError> {
        let mut fields = BTreeMap::new();
        for (field, value) in data {
            let scalar =
                SecretValue::from_json(value).ok_or_else(|| VaultError::UnsupportedValue {
                    path: path.to_string(),
                    field: field.clone(),
                })?;
            fields.insert(field, scalar);
        }
        Ok(Self(fields))
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<SecretValue>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&SecretValue> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SecretValue)> {
        self.0.iter()
    }

    pub(crate) fn to_json(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Object(Map::new()))
    }
}

impl<K: Into<String>, V: Into<SecretValue>> FromIterator<(K, V)> for SecretRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for SecretRecord {
    type Item = (String, SecretValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, SecretValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Cluster id reported by `sys/health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIdentity(pub String);

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SealStatus {
    pub sealed: bool,
    #[serde(rename = "t", default)]
    pub threshold: u32,
    #[serde(rename = "n", default)]
    pub shares: u32,
    #[serde(default)]
    pub progress: u32,
}

/// Key shares and root token returned once by `sys/init`.
#[derive(Clone, Deserialize)]
pub struct InitResult {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub keys_base64: Vec<String>,
    pub root_token: String,
}

impl InitResult {
    /// Field layout used when the shares are stored on another instance:
    /// `SEC_VAULT_UNSEAL_KEY1..N` plus `SEC_VAULT_TOKEN`.
    pub fn credential_record(&self) -> SecretRecord {
        let mut record: SecretRecord = self
            .keys_base64
            .iter()
            .enumerate()
            .map(|(i, key)| (format!("SEC_VAULT_UNSEAL_KEY{}", i + 1), key.clone()))
            .collect();
        record.insert("SEC_VAULT_TOKEN", self.root_token.clone());
        record
    }
}

impl fmt::Debug for InitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitResult")
            .field("shares", &self.keys_base64.len())
            .finish_non_exhaustive()
    }
}

/// Secrets engine mounted at some path, as listed by `sys/mounts`.
#[derive(Debug, Clone, Deserialize)]
pub struct MountInfo {
    #[serde(rename = "type")]
    pub engine: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Option<BTreeMap<String, Value>>,
}

impl MountInfo {
    pub fn kv_version(&self) -> Option<&str> {
        self.options
            .as_ref()
            .and_then(|options| options.get("version"))
            .and_then(Value::as_str)
    }
}

/// Envelope shared by every logical response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct LogicalResponse {
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
    #[serde(default)]
    pub auth: Option<AuthData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthData {
    #[serde(default)]
    pub client_token: String,
}
