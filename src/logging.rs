use std::env;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Maps `VAULT_VERBOSE` levels onto a filter directive.
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 | 1 => "error",
        2 => "info",
        _ => "debug",
    }
}

fn env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Installs the global subscriber. Everything goes to stderr; stdout carries
/// command output only. Keep the returned guard alive until exit.
pub fn init_logger(verbosity: u8) -> Option<WorkerGuard> {
    use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
    use tracing_log::LogTracer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    if !env::var("JSON_LOG").is_ok_and(|s| s.parse().unwrap_or_default()) {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter(verbosity))
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    // Redirect the logs from log library to tracing's subscribers.
    if let Err(e) = LogTracer::init() {
        eprintln!("Unable to setup log tracer: {e}");
    }

    let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")).to_string();

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);
    let subscriber = Registry::default()
        .with(env_filter(verbosity))
        .with(JsonStorageLayer)
        .with(bunyan_formatting_layer);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to install log subscriber: {e}");
    }
    Some(guard)
}
