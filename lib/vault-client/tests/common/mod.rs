// lib/vault-client/tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value, json};
use vault_client::CredentialBundle;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const VERSIONED_WARNING: &str = concat!(
    "Invalid path for a versioned K/V secrets engine. ",
    "See the API docs for the appropriate API endpoints to use. ",
    "If using the Vault CLI, use 'vault kv get' for this operation."
);

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: String,
    pub path: String,
    pub list: bool,
}

struct Mount {
    version: u8,
    description: String,
    secrets: BTreeMap<String, Map<String, Value>>,
}

struct JwtRole {
    jwt: String,
    role: Option<String>,
    client_token: String,
}

#[derive(Default)]
struct State {
    cluster_id: String,
    tokens: BTreeSet<String>,
    logins: BTreeMap<String, JwtRole>,
    mounts: BTreeMap<String, Mount>,
    unmount_failures: u32,
    unmount_delay: Option<Duration>,
    calls: Vec<Call>,
}

/// In-memory Vault answering the subset of the HTTP API the client uses.
/// KV v2 mounts reject v1-shaped paths with the versioned-engine warning.
#[derive(Clone)]
pub struct FakeVault {
    state: Arc<Mutex<State>>,
}

impl FakeVault {
    pub fn new(cluster_id: &str) -> Self {
        let state = State {
            cluster_id: cluster_id.to_string(),
            ..State::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_token(self, token: &str) -> Self {
        self.state.lock().unwrap().tokens.insert(token.to_string());
        self
    }

    /// Accepts `jwt` (and `role` when set) at `auth/<mount>/login`.
    pub fn with_jwt_login(
        self,
        mount: &str,
        jwt: &str,
        role: Option<&str>,
        client_token: &str,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.tokens.insert(client_token.to_string());
            state.logins.insert(
                format!("auth/{mount}/login"),
                JwtRole {
                    jwt: jwt.to_string(),
                    role: role.map(str::to_string),
                    client_token: client_token.to_string(),
                },
            );
        }
        self
    }

    pub fn with_mount(self, name: &str, version: u8) -> Self {
        self.state.lock().unwrap().mounts.insert(
            name.to_string(),
            Mount {
                version,
                description: String::new(),
                secrets: BTreeMap::new(),
            },
        );
        self
    }

    pub fn with_secret(self, mount: &str, subpath: &str, data: Value) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let mount = state.mounts.get_mut(mount).expect("mount must exist");
            let data = data.as_object().cloned().expect("secret must be an object");
            mount.secrets.insert(subpath.to_string(), data);
        }
        self
    }

    /// The next `count` unmount requests fail with a 500.
    pub fn failing_unmounts(self, count: u32) -> Self {
        self.state.lock().unwrap().unmount_failures = count;
        self
    }

    /// Every unmount request stalls for `delay` and then reports the mount busy.
    pub fn stalled_unmounts(self, delay: Duration) -> Self {
        self.state.lock().unwrap().unmount_delay = Some(delay);
        self
    }

    pub async fn start(&self) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(self.clone())
            .mount(&server)
            .await;
        server
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Calls other than authentication and cluster identity checks.
    pub fn data_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !c.path.starts_with("auth/") && c.path != "sys/health")
            .collect()
    }

    pub fn secret(&self, mount: &str, subpath: &str) -> Option<Map<String, Value>> {
        let state = self.state.lock().unwrap();
        state.mounts.get(mount)?.secrets.get(subpath).cloned()
    }

    pub fn secret_paths(&self, mount: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .mounts
            .get(mount)
            .map(|m| m.secrets.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn mount_version(&self, name: &str) -> Option<u8> {
        self.state.lock().unwrap().mounts.get(name).map(|m| m.version)
    }

    pub fn mount_description(&self, name: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.mounts.get(name).map(|m| m.description.clone())
    }

    pub fn mount_names(&self) -> Vec<String> {
        self.state.lock().unwrap().mounts.keys().cloned().collect()
    }
}

pub fn bundle(server: &MockServer, token: &str) -> CredentialBundle {
    CredentialBundle::new(server.uri()).with_token(token)
}

fn json_response(status: u16, body: Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(body)
}

fn errors(status: u16, messages: &[&str]) -> ResponseTemplate {
    json_response(status, json!({ "errors": messages }))
}

fn versioned_mismatch() -> ResponseTemplate {
    json_response(404, json!({ "errors": [], "warnings": [VERSIONED_WARNING] }))
}

fn list_children(secrets: &BTreeMap<String, Map<String, Value>>, prefix: &str) -> Vec<String> {
    let prefix = if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    };
    let mut keys = BTreeSet::new();
    for key in secrets.keys() {
        let Some(rest) = key.strip_prefix(&prefix) else {
            continue;
        };
        match rest.split_once('/') {
            Some((dir, _)) => keys.insert(format!("{dir}/")),
            None if !rest.is_empty() => keys.insert(rest.to_string()),
            None => false,
        };
    }
    keys.into_iter().collect()
}

fn list_response(keys: Vec<String>) -> ResponseTemplate {
    if keys.is_empty() {
        errors(404, &[])
    } else {
        json_response(200, json!({ "data": { "keys": keys } }))
    }
}

impl Respond for FakeVault {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let method = request.method.as_str().to_string();
        let path = request
            .url
            .path()
            .trim_start_matches("/v1/")
            .to_string();
        let list = request
            .url
            .query_pairs()
            .any(|(k, v)| k == "list" && v == "true");
        let token = request
            .headers
            .get("X-Vault-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body: Option<Value> = serde_json::from_slice(&request.body).ok();

        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            method: method.clone(),
            path: path.clone(),
            list,
        });

        if path.starts_with("auth/") && path.ends_with("/login") && method == "POST" {
            let Some(login) = state.logins.get(&path) else {
                return errors(404, &["no handler for route"]);
            };
            let jwt = body.as_ref().and_then(|b| b.get("jwt")).and_then(Value::as_str);
            let role = body.as_ref().and_then(|b| b.get("role")).and_then(Value::as_str);
            let role_ok = login.role.is_none() || login.role.as_deref() == role;
            if jwt == Some(login.jwt.as_str()) && role_ok {
                return json_response(
                    200,
                    json!({ "auth": { "client_token": login.client_token, "renewable": true } }),
                );
            }
            return errors(400, &["invalid role or jwt"]);
        }

        let authorized = token
            .as_deref()
            .is_some_and(|t| state.tokens.contains(t));
        if !authorized {
            return errors(403, &["permission denied"]);
        }

        if path == "auth/token/lookup-self" {
            return json_response(200, json!({ "data": { "id": token } }));
        }

        if path == "sys/health" {
            return json_response(
                200,
                json!({ "initialized": true, "sealed": false, "cluster_id": state.cluster_id }),
            );
        }

        if path == "sys/mounts" {
            let mut table = Map::new();
            for (name, mount) in &state.mounts {
                table.insert(
                    format!("{name}/"),
                    json!({
                        "type": "kv",
                        "description": mount.description,
                        "options": { "version": mount.version.to_string() },
                    }),
                );
            }
            table.insert(
                "sys/".to_string(),
                json!({ "type": "system", "description": "system endpoints", "options": null }),
            );
            return json_response(200, json!({ "data": table }));
        }

        if let Some(name) = path.strip_prefix("sys/mounts/") {
            let name = name.trim_matches('/').to_string();
            match method.as_str() {
                "DELETE" => {
                    if let Some(delay) = state.unmount_delay {
                        let busy = errors(500, &["failed to unmount: mount is busy"]);
                        return busy.set_delay(delay);
                    }
                    if state.unmount_failures > 0 {
                        state.unmount_failures -= 1;
                        return errors(500, &["failed to unmount: mount is busy"]);
                    }
                    state.mounts.remove(&name);
                    return ResponseTemplate::new(204);
                }
                "POST" => {
                    if state.mounts.contains_key(&name) {
                        return errors(400, &["path is already in use"]);
                    }
                    let version = body
                        .as_ref()
                        .and_then(|b| b.pointer("/options/version"))
                        .and_then(Value::as_str)
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(1);
                    let description = body
                        .as_ref()
                        .and_then(|b| b.get("description"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    state.mounts.insert(
                        name,
                        Mount {
                            version,
                            description,
                            secrets: BTreeMap::new(),
                        },
                    );
                    return ResponseTemplate::new(204);
                }
                _ => return errors(405, &["unsupported operation"]),
            }
        }

        let (mount_name, rest) = path.split_once('/').unwrap_or((path.as_str(), ""));
        let Some(mount) = state.mounts.get_mut(mount_name) else {
            return errors(404, &["no handler for route"]);
        };

        if mount.version == 1 {
            return match method.as_str() {
                "GET" if list => list_response(list_children(&mount.secrets, rest)),
                "GET" => match mount.secrets.get(rest) {
                    Some(data) => json_response(200, json!({ "data": data })),
                    None => errors(404, &[]),
                },
                "POST" | "PUT" => match body {
                    Some(Value::Object(data)) => {
                        mount.secrets.insert(rest.to_string(), data);
                        ResponseTemplate::new(204)
                    }
                    _ => errors(400, &["invalid request body"]),
                },
                _ => errors(405, &["unsupported operation"]),
            };
        }

        let (marker, subpath) = rest.split_once('/').unwrap_or((rest, ""));
        match (marker, method.as_str(), list) {
            ("metadata", "GET", true) => list_response(list_children(&mount.secrets, subpath)),
            ("data", "GET", false) => match mount.secrets.get(subpath) {
                Some(data) => json_response(
                    200,
                    json!({
                        "data": {
                            "data": data,
                            "metadata": { "version": 1, "destroyed": false, "deletion_time": "" }
                        }
                    }),
                ),
                None => errors(404, &[]),
            },
            ("data", "POST" | "PUT", _) => match body.and_then(|b| b.get("data").cloned()) {
                Some(Value::Object(data)) => {
                    mount.secrets.insert(subpath.to_string(), data);
                    json_response(200, json!({ "data": { "version": 1 } }))
                }
                _ => errors(400, &["no data provided"]),
            },
            ("data" | "metadata", _, _) => errors(405, &["unsupported operation"]),
            _ => versioned_mismatch(),
        }
    }
}
