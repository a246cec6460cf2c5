// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Gantry: keeps gateway routing in sync with labelled containers
//
//  Discovery:  Docker Engine API (TCP)
//  Gateway:    Kong-compatible admin API
//  Loop:       one scan cycle per interval, sequential per key
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use anyhow::Context;
use clap::{Parser, ValueEnum};
use gantry_core::{GantryConfig, SpecBuilder};
use gantry_discovery::{ContainerDiscovery, DockerClient, LabelFilter, locate_gateway};
use gantry_gateway::{GatewayAdmin, KongAdminClient};
use gantry_reconciler::{Reconciler, Scheduler};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "gantry", version, about = "Gantry — gateway config watcher for labelled containers")]
struct Cli {
    /// Path to configuration file (missing file = defaults + environment)
    #[arg(short, long, default_value = "/etc/gantry/gantry.yaml")]
    config: PathBuf,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_tracing(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match cli.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "Gantry starting");

    match run(cli).await {
        Ok(()) => {
            info!("Gantry stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // ── Config ──
    let config = GantryConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    config.validate().context("invalid configuration")?;

    // ── Container runtime ──
    let docker = DockerClient::new(&config.runtime.endpoint, config.runtime.timeout())
        .context("creating container runtime client")?;
    let runtime = docker
        .ping()
        .await
        .with_context(|| format!("container runtime unreachable at {}", config.runtime.endpoint))?;
    info!(
        endpoint = %config.runtime.endpoint,
        api_version = %runtime.api_version,
        os = %runtime.os,
        "Connected to container runtime"
    );
    let discovery: Arc<dyn ContainerDiscovery> = Arc::new(docker);

    // ── Gateway admin API ──
    let admin_url = match &config.gateway.admin_url {
        Some(url) => url.clone(),
        None => locate_gateway(
            discovery.as_ref(),
            &config.gateway.locator_label,
            &config.gateway.network,
            config.gateway.admin_port,
        )
        .await
        .context("locating gateway container")?,
    };
    let kong = KongAdminClient::new(&admin_url, config.gateway.timeout())
        .context("creating gateway admin client")?;
    let gateway = kong
        .info()
        .await
        .with_context(|| format!("gateway admin API unreachable at {admin_url}"))?;
    info!(admin_url = %admin_url, gateway_version = %gateway.version, "Connected to gateway");
    let admin: Arc<dyn GatewayAdmin> = Arc::new(kong);

    // ── Scheduler ──
    let scheduler = Scheduler::new(
        discovery,
        Reconciler::new(admin, config.auth.clone()),
        SpecBuilder::new(config.labels.clone()),
        LabelFilter::parse(&config.labels.service_filter),
        config.scan.interval(),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping...");
        let _ = stop_tx.send(true);
    });

    info!(
        interval_secs = config.scan.interval_secs,
        filter = %config.labels.service_filter,
        "Gantry is ready — watching containers"
    );
    scheduler.run(stop_rx).await;

    // Dropping the scheduler releases both HTTP clients.
    drop(scheduler);
    Ok(())
}

/// SIGTERM (docker stop) or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
