//! vault-client - Vault access layer for CI/CD secret operations
//!
//! Picks a credential in fixed order:
//! 1. static token
//! 2. Kubernetes service-account JWT → `auth/kubernetes/login`
//! 3. generic JWT (CI id token) → `auth/jwt/login`
//!
//! KV calls work against v1 and v2 mounts alike: a path is tried as given and
//! rewritten to the v2 shape once if Vault reports a versioned engine.

mod auth;
mod config;
mod error;
mod export;
mod filter;
mod http;
mod kv;
mod migrate;
mod models;
pub mod paths;
mod sys;
mod tree;

pub use auth::{AuthSelector, Session};
pub use config::{ClientOptions, CredentialBundle, DEFAULT_K8S_JWT_PATH, load_service_account_token};
pub use error::{ErrorKind, VaultError};
pub use export::{ExportReport, SecretExporter};
pub use filter::ExclusionFilter;
pub use kv::KvClient;
pub use migrate::{MigrationOrchestrator, MigrationReport, MountPolicy};
pub use models::{
    ClusterIdentity, InitResult, MountInfo, SealStatus, SecretRecord, SecretValue,
};
pub use paths::KvOperation;
pub use sys::{SysClient, init, unseal};
pub use tree::{TreeWalker, list_leaves};
