use futures::StreamExt;
use halla::controller::{error_policy, reconcile, scheduler, watch, Context};
use halla::crd::freezer::DeploymentFreezer;
use halla::server::{run_health_server, shutdown_channel, wait_for_signal, ReadinessState};
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::controller::Config;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default port for health endpoints
const HEALTH_PORT: u16 = 8080;

/// Reconciles running in parallel; each freezer key is still serialized
const MAX_CONCURRENT_RECONCILES: u16 = 2;

/// Health port, overridable via env var
fn health_port() -> u16 {
    std::env::var("HALLA_HEALTH_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(HEALTH_PORT)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting halla deployment-freeze controller");

    // Create shutdown channel for coordinated shutdown
    let (shutdown_controller, shutdown_signal) = shutdown_channel();

    // Create readiness state (initially not ready)
    let readiness = ReadinessState::new();

    // Start health server in background
    let port = health_port();
    let health_readiness = readiness.clone();
    let health_shutdown = shutdown_signal.clone();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = run_health_server(port, health_readiness, health_shutdown).await {
            warn!(error = %e, "Health server failed");
        }
    });
    info!(port = port, "Health server task spawned");

    // Create Kubernetes client
    let client = match Client::try_default().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            // Abort health server to avoid leaving it running orphaned
            health_handle.abort();
            return Err(e.into());
        }
    };

    info!("Connected to Kubernetes cluster");

    let freezers = Api::<DeploymentFreezer>::all(client.clone());
    let deployments = Api::<Deployment>::all(client.clone());

    // Create controller context
    let ctx = Arc::new(Context::new(client.clone()));

    // Trigger channel for the startup deadline scan
    let (startup_tx, startup_rx) = futures::channel::mpsc::unbounded();

    let controller = Controller::new(freezers, watcher::Config::default())
        .with_config(Config::default().concurrency(MAX_CONCURRENT_RECONCILES));

    // The controller's reflector store doubles as the targetRef index for the
    // Deployment watch and as the input of the startup deadline scan
    let store = controller.store();
    tokio::spawn(scheduler::run_startup_scan(store.clone(), startup_tx));

    let gate = Arc::new(watch::GenerationGate::new());
    let controller = controller
        .watches(
            deployments,
            watcher::Config::default(),
            watch::map_deployment(store, gate),
        )
        .reconcile_all_on(startup_rx)
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Ok(o) = res {
                info!("Reconciled: {:?}", o);
            }
            // Errors are logged in error_policy, no duplicate logging
        });

    // Mark as ready - controller is initialized and about to start
    readiness.set_ready();
    info!("Controller ready, starting reconciliation loop");

    // Run controller until shutdown signal received
    tokio::select! {
        _ = controller => {
            info!("Controller stream ended");
        }
        signal = wait_for_signal() => {
            info!(signal = signal, "Initiating graceful shutdown");
            // Mark not ready so K8s stops sending traffic during shutdown
            readiness.set_not_ready();
        }
    }

    // Trigger shutdown for all components
    shutdown_controller.shutdown();
    info!("Stopping components...");

    // Give the health server a moment to finish in-flight probes
    if tokio::time::timeout(Duration::from_secs(5), health_handle)
        .await
        .is_err()
    {
        warn!("Health server did not stop in time");
    }

    info!("halla controller shut down gracefully");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
