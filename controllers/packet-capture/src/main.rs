//! Packet Capture Controller
//!
//! Runs tcpdump against Pods on this node on request.
//!
//! Annotating a Pod with `tcpdump.antrea.io=<N>` starts a capture of the
//! Pod's traffic into `<CAPTURE_DIR>/capture-<pod>.pcap*`, rotated across
//! `N` files. Changing the value restarts the capture; removing the
//! annotation or deleting the Pod stops it and removes its files.

mod config;
mod controller;
mod error;
mod events;
mod reconciler;
mod registry;
mod supervisor;
mod watcher;

#[cfg(test)]
mod test_utils;


use anyhow::{Context, Result};
use config::ControllerConfig;
use controller::Controller;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting Packet Capture Controller");

    // Load configuration from environment variables
    let config = ControllerConfig::from_env().context("failed to load configuration")?;

    info!("Configuration:");
    info!("  Node: {}", config.node_name);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Capture directory: {}", config.capture_dir.display());
    info!("  tcpdump binary: {}", config.tcpdump_binary.display());
    info!("  Annotation: {}", config.annotation_key);

    let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    };

    // Initialize and run controller
    let controller = Controller::new(&config)
        .await
        .context("failed to initialize controller")?;
    controller.run(shutdown).await?;

    Ok(())
}
