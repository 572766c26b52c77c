use clap::Parser;
use sentry::integrations::tracing::EventFilter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use webhook_relay::capture::SentryCapture;
use webhook_relay::config::{self, Settings};

/// Assigns new Sentry issues to a default user per project.
#[derive(Parser, Debug)]
#[command(name = "assigner", version)]
struct Cli {
    /// Sentry API token with the `event:write` scope
    #[arg(long, env = "SENTRY_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// JSON mapping of project slug to default assignee
    #[arg(long, env = "ASSIGNER_MAPPING_PATH", default_value = config::DEFAULT_ASSIGNMENTS_PATH)]
    assign_loc: PathBuf,

    /// Address to bind the web server to
    #[arg(long, env = "ASSIGNER_BIND_ADDR", default_value = config::DEFAULT_BIND_ADDR)]
    bind_addr: String,

    /// DSN test events are sent to
    #[arg(long, env = "SENTRY_DSN", hide_env_values = true)]
    sentry_dsn: Option<String>,

    /// Base URL of the Sentry web API
    #[arg(long, env = "SENTRY_API_BASE", default_value = config::DEFAULT_API_BASE)]
    api_base: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_settings(self) -> Settings {
        Settings {
            sentry_dsn: self.sentry_dsn,
            api_token: self.api_token,
            assignments_path: self.assign_loc,
            bind_addr: self.bind_addr,
            api_base: self.api_base,
        }
    }
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Log lines only ever become breadcrumbs; the relay reports nothing to
    // Sentry on its own besides test events.
    let sentry_layer =
        sentry::integrations::tracing::layer().event_filter(|metadata| match *metadata.level() {
            tracing::Level::ERROR | tracing::Level::WARN | tracing::Level::INFO => {
                EventFilter::Breadcrumb
            }
            _ => EventFilter::Ignore,
        });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .with(sentry_layer)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = match cli.into_settings().load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if config.assignments.is_empty() {
        tracing::warn!("assignment mapping is empty, no issue will be assigned");
    } else {
        tracing::info!(projects = config.assignments.len(), "loaded assignment mapping");
    }

    // Keep the guard alive until exit so queued events are flushed.
    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: Some(config.sentry_dsn.clone()),
        release: sentry::release_name!(),
        ..Default::default()
    });

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start the tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(webhook_relay::run(config, Arc::new(SentryCapture))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server exited");
            ExitCode::FAILURE
        }
    }
}
