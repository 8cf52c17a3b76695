//! Service observability binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request ──▶ request id ──▶ observe_request ──▶ /healthz
//!                        layers         (span, access log)  HealthAggregator
//!                                             │
//!                                             ▼
//!                                   tracing subscriber ──▶ stdout (pretty / JSON)
//!                                   OTel tracer provider ──▶ collector (optional)
//!
//!     SIGTERM/SIGINT ──▶ Shutdown ──▶ drain ──▶ release tracer ──▶ exit
//! ```

use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;

use service_observability::config::{resolve_from_env, ObservabilityConfig, ServiceConfig};
use service_observability::lifecycle::{wait_for_signal, Shutdown};
use service_observability::observability::{
    init_logging, init_tracer, TracerGuard, TracerSettings,
};
use service_observability::{HttpServer, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_COMMIT_SHA: Option<&str> = option_env!("GIT_COMMIT_SHA");

#[derive(Debug, Parser)]
#[command(version, about = "HTTP service with health checks, access logs and tracing")]
struct Cli {
    /// Path to a TOML config file (default: /config/config.toml, then ./config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_from_env(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let _ = init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Service failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServiceConfig) -> Result<()> {
    tracing::info!(
        config = %serde_json::to_string(&config)?,
        GitCommitSha = GIT_COMMIT_SHA.unwrap_or_default(),
        "{} version {}",
        config.app_name(),
        VERSION
    );

    let tracer = match init_tracer(&TracerSettings::from_env(), &app_info(&config)) {
        Ok(guard) => guard,
        Err(e) => {
            tracing::error!(error = %e, "Trace export pipeline");
            TracerGuard::disabled()
        }
    };

    let listener = TcpListener::bind(config.bind_address()).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                tracing::info!(signal = ?signal, "Signal received");
                shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
        }
    });

    HttpServer::new(config).run(listener, server_shutdown).await?;

    // Shutdown blocks on the exporter; keep it off the async workers.
    if let Err(e) = tokio::task::spawn_blocking(move || tracer.release()).await {
        tracing::error!(error = %e, "Trace export pipeline release panicked");
    }
    Ok(())
}

fn app_info(config: &ServiceConfig) -> BTreeMap<String, String> {
    let mut info = BTreeMap::from([
        ("app".to_string(), config.app_name()),
        ("namespace".to_string(), config.namespace()),
        ("version".to_string(), VERSION.to_string()),
    ]);
    if let Some(sha) = GIT_COMMIT_SHA {
        info.insert("git_commit_sha".to_string(), sha.to_string());
    }
    info
}
