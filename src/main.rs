// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use keights::{
    config::ControllerSettings,
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    http,
    reconcilers::schedule_reconcile_after,
    watchers::{run_configmap_watcher, run_service_watcher},
};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    // Parse before the runtime starts so --help and bad flags exit immediately
    let settings = ControllerSettings::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("keights-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(settings))
}

async fn async_main(settings: ControllerSettings) -> Result<()> {
    // Initialize logging
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=keights=debug keights
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json keights
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        configmap = %settings.configmap_name,
        namespace = %settings.configmap_namespace,
        key = %settings.configmap_key,
        annotation = %settings.annotation,
        rewrite_task_delay = ?settings.rewrite_task_delay,
        "Starting keights CoreDNS rewrite controller"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let metrics_address = settings.metrics_address();
    let init_delay = settings.rewrite_task_init_delay;
    let ctx = Arc::new(Context::with_client(client.clone(), settings));

    // Picks up requests collected during the initial listing even if no
    // ConfigMap event schedules a pass on its own
    schedule_reconcile_after(&ctx, init_delay);

    info!("Starting watchers");

    // Watchers and the metrics server should never exit; if one does, the
    // process exits so the pod is restarted
    tokio::select! {
        result = run_configmap_watcher(client.clone(), Arc::clone(&ctx)) => {
            error!("CRITICAL: ConfigMap watcher exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ConfigMap watcher exited unexpectedly without error")
        }
        result = run_service_watcher(client, Arc::clone(&ctx)) => {
            error!("CRITICAL: Service watcher exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Service watcher exited unexpectedly without error")
        }
        result = http::serve(&metrics_address, Arc::clone(&ctx.engine)) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        result = shutdown_signal() => {
            result?;
            info!("Shutdown complete");
            Ok(())
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM (pod termination), shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received SIGINT, shutting down");
    }

    Ok(())
}
