use std::io::Write;

use clap::Parser;
use serde_json::{Value, json};
use vault_client::{
    AuthSelector, KvClient, KvOperation, MigrationOrchestrator, SecretExporter, SysClient,
    VaultError, init, list_leaves, unseal,
};

mod cli;
mod logging;

use cli::{Cli, CliError, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let guard = logging::init_logger(cli.verbose);

    let code = match run(cli).await {
        Ok(output) => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            let _ = writeln!(handle, "{output}");
            let _ = handle.flush();
            0
        }
        Err(error) => {
            tracing::error!(kind = %error.kind(), error = %error, "command failed");
            eprintln!("{}: {error}", error.kind());
            error.exit_code()
        }
    };

    // `process::exit` skips destructors; flush buffered log lines first.
    drop(guard);
    if code != 0 {
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<String, CliError> {
    let options = cli.client_options();

    let output = match &cli.command {
        Command::Read { path } => {
            let session = AuthSelector::new(cli.primary_bundle()?, options).login().await?;
            let record = KvClient::new(&session).read(path).await?.ok_or_else(|| {
                VaultError::Operation {
                    operation: KvOperation::Read,
                    path: path.clone(),
                    message: "secret not found".to_string(),
                }
            })?;
            serde_json::to_value(record)?
        }
        Command::Write { path, record } => {
            let record = cli::parse_record(record)?;
            let session = AuthSelector::new(cli.primary_bundle()?, options).login().await?;
            KvClient::new(&session).write(path, &record).await?;
            tracing::info!(path = %path, fields = record.len(), "secret written");
            json!({ "path": path, "fields": record.len() })
        }
        Command::List { prefix } => {
            let session = AuthSelector::new(cli.primary_bundle()?, options).login().await?;
            let leaves = list_leaves(&session, prefix).await?;
            tracing::info!(prefix = %prefix, count = leaves.len(), "listed secrets");
            json!(leaves)
        }
        Command::Inject { paths, recursive } => {
            let filter = cli.exclusion()?;
            let session = AuthSelector::new(cli.primary_bundle()?, options).login().await?;
            let report = SecretExporter::new(&session)
                .recursive(*recursive)
                .exclude(filter)
                .export(paths.as_slice())
                .await?;
            serde_json::to_value(report.values)?
        }
        Command::Backup { path } => {
            let (source, destination) = (cli.primary_bundle()?, cli.secondary_bundle()?);
            let report = MigrationOrchestrator::new(source, destination, path)
                .exclude(cli.exclusion()?)
                .options(options)
                .run()
                .await?;
            json!({
                "namespace": report.namespace,
                "copied": report.copied,
                "excluded": report.excluded,
            })
        }
        Command::Unseal { keys } => {
            let bundle = cli.secondary_bundle()?;
            let mut status = unseal(&bundle, keys, &options).await?;
            if bundle.token.is_some() {
                let session = AuthSelector::new(bundle, options).login().await?;
                status = SysClient::new(&session).seal_status().await?;
            }
            json!({
                "sealed": status.sealed,
                "progress": status.progress,
                "threshold": status.threshold,
                "shares": status.shares,
            })
        }
        Command::Init {
            shares,
            threshold,
            write_path,
        } => {
            // Log in first: the shares are only returned once and must land somewhere.
            let session = AuthSelector::new(cli.primary_bundle()?, options.clone())
                .login()
                .await?;
            let target = cli.secondary_bundle()?;
            let result = init(&target, *shares, *threshold, &options).await?;
            let record = result.credential_record();
            KvClient::new(&session).write(write_path, &record).await?;
            tracing::info!(
                path = %write_path,
                shares = result.keys_base64.len(),
                "key shares stored"
            );

            let status = unseal(&target, &result.keys_base64, &options).await?;
            json!({
                "initialized": true,
                "sealed": status.sealed,
                "write_path": write_path,
                "shares": result.keys_base64.len(),
            })
        }
    };

    render(&output)
}

fn render(value: &Value) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}
