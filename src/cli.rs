use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use vault_client::{
    ClientOptions, CredentialBundle, DEFAULT_K8S_JWT_PATH, ErrorKind, ExclusionFilter,
    SecretRecord, VaultError, load_service_account_token,
};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_VERBOSITY: u8 = 2;
const DEFAULT_INIT_SHARES: u32 = 5;
const DEFAULT_INIT_THRESHOLD: u32 = 3;
const CLI_AFTER_HELP: &str = r#"Examples:
  VAULT_ADDR=https://vault:8200 VAULT_TOKEN=... hydra read secret/app/db
  hydra write kv/app/db '{"user": "admin", "port": 5432}'
  hydra list team/
  VAULT_SECRET_PATH="ci/common ci/app" hydra inject
  SEC_VAULT_ADDR=https://backup:8200 hydra backup team/
  SEC_VAULT_ADDR=https://backup:8200 hydra init --write-path ops/backup-vault
"#;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid secret record: {0}")]
    InvalidRecord(#[source] serde_json::Error),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Cannot render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CliError::InvalidRecord(_) => ErrorKind::Config,
            CliError::Vault(e) => e.kind(),
            CliError::Output(_) => ErrorKind::Operation,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Operation => 1,
            ErrorKind::Config => 2,
            ErrorKind::ClusterSafety => 3,
            ErrorKind::MountRecreate => 4,
            ErrorKind::Auth => 10,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "hydra",
    version,
    about = "Read, write, list and back up Vault secrets from CI/CD pipelines",
    after_help = CLI_AFTER_HELP
)]
pub struct Cli {
    #[command(flatten)]
    pub primary: PrimaryArgs,

    #[command(flatten)]
    pub secondary: SecondaryArgs,

    /// Per-request timeout in seconds.
    #[arg(long, env = "VAULT_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout: u64,

    /// 1 = errors only, 2 = info, 3 = debug. `RUST_LOG` takes precedence.
    #[arg(long, env = "VAULT_VERBOSE", default_value_t = DEFAULT_VERBOSITY)]
    pub verbose: u8,

    /// Skip secrets whose path or name matches this regex.
    #[arg(long, env = "VAULT_EXCLUDE_REGEX")]
    pub exclude: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Args)]
pub struct PrimaryArgs {
    #[arg(long = "addr", env = "VAULT_ADDR")]
    pub address: Option<String>,

    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Log in with the pod's service-account token.
    #[arg(long, env = "VAULT_K8S_AUTH")]
    pub k8s_auth: bool,

    #[arg(long, env = "VAULT_K8S_TOKEN_PATH", default_value = DEFAULT_K8S_JWT_PATH)]
    pub k8s_token_path: PathBuf,

    /// CI-issued id token.
    #[arg(long, env = "VAULT_ID_TOKEN", hide_env_values = true)]
    pub id_token: Option<String>,

    /// Auth mount name or full login path.
    #[arg(long = "auth-mount", env = "VAULT_AUTH_URL")]
    pub auth_mount: Option<String>,

    #[arg(long, env = "VAULT_AUTH_ROLE")]
    pub role: Option<String>,
}

/// The backup target. Shares the JWT inputs of the primary instance.
#[derive(Debug, clap::Args)]
pub struct SecondaryArgs {
    #[arg(long = "sec-addr", env = "SEC_VAULT_ADDR")]
    pub sec_address: Option<String>,

    #[arg(long = "sec-token", env = "SEC_VAULT_TOKEN", hide_env_values = true)]
    pub sec_token: Option<String>,

    #[arg(long = "sec-auth-mount", env = "SEC_VAULT_AUTH_URL")]
    pub sec_auth_mount: Option<String>,

    #[arg(long = "sec-role", env = "SEC_VAULT_AUTH_ROLE")]
    pub sec_role: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print one secret as JSON.
    Read { path: String },

    /// Store a JSON object of scalar fields at a path.
    Write { path: String, record: String },

    /// Print every secret path under a prefix.
    List { prefix: String },

    /// Merge several secrets into one JSON object.
    Inject {
        #[arg(env = "VAULT_SECRET_PATH", value_delimiter = ' ', required = true)]
        paths: Vec<String>,

        /// Treat each path as a prefix.
        #[arg(long, env = "VAULT_RECURSIVE")]
        recursive: bool,
    },

    /// Copy a namespace to the secondary instance, recreating its mount.
    Backup {
        #[arg(env = "VAULT_BACKUP_PATH")]
        path: String,
    },

    /// Unseal the secondary instance, then check its token.
    Unseal {
        #[arg(
            long,
            env = "VAULT_UNSEAL_KEYS",
            value_delimiter = ',',
            hide_env_values = true
        )]
        keys: Vec<String>,
    },

    /// Initialize and unseal the secondary instance, storing its key shares
    /// and root token on the primary.
    Init {
        #[arg(long, env = "VAULT_INIT_SHARES", default_value_t = DEFAULT_INIT_SHARES)]
        shares: u32,

        #[arg(long, env = "VAULT_INIT_THRESHOLD", default_value_t = DEFAULT_INIT_THRESHOLD)]
        threshold: u32,

        /// Primary path receiving `SEC_VAULT_UNSEAL_KEY1..N` and `SEC_VAULT_TOKEN`.
        #[arg(long = "write-path", env = "VAULT_WRITE_PATH")]
        write_path: String,
    },
}

impl Cli {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::default()
            .request_timeout(Duration::from_secs(self.timeout))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
    }

    pub fn exclusion(&self) -> Result<ExclusionFilter, VaultError> {
        ExclusionFilter::new(self.exclude.as_deref())
    }

    fn kubernetes_jwt(&self) -> Result<Option<String>, VaultError> {
        if !self.primary.k8s_auth {
            return Ok(None);
        }
        load_service_account_token(&self.primary.k8s_token_path).map(Some)
    }

    pub fn primary_bundle(&self) -> Result<CredentialBundle, VaultError> {
        Ok(CredentialBundle {
            address: self.primary.address.clone(),
            token: self.primary.token.clone(),
            kubernetes_jwt: self.kubernetes_jwt()?,
            jwt: self.primary.id_token.clone(),
            auth_mount: self.primary.auth_mount.clone(),
            role: self.primary.role.clone(),
        })
    }

    pub fn secondary_bundle(&self) -> Result<CredentialBundle, VaultError> {
        Ok(CredentialBundle {
            address: self.secondary.sec_address.clone(),
            token: self.secondary.sec_token.clone(),
            kubernetes_jwt: self.kubernetes_jwt()?,
            jwt: self.primary.id_token.clone(),
            auth_mount: self.secondary.sec_auth_mount.clone(),
            role: self.secondary.sec_role.clone(),
        })
    }
}

pub fn parse_record(raw: &str) -> Result<SecretRecord, CliError> {
    serde_json::from_str(raw).map_err(CliError::InvalidRecord)
}
