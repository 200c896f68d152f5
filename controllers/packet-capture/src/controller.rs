//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the Pod watcher,
//! reconciler, and tcpdump supervisor together for the Packet Capture
//! Controller.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::registry::SessionRegistry;
use crate::supervisor::ProcessSupervisor;
use crate::watcher::Watcher;
use capture_runtime::{ArtifactJanitor, CaptureError, TcpdumpRunner};
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Main controller for Pod packet captures on one node.
pub struct Controller {
    reconciler: Arc<Reconciler>,
    pod_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching Pods.
    pub async fn new(config: &ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Packet Capture Controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        std::fs::create_dir_all(&config.capture_dir).map_err(CaptureError::Io)?;

        let pod_api: Api<Pod> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client, ns),
            None => Api::all(kube_client),
        };

        let supervisor = ProcessSupervisor::new(
            Arc::new(TcpdumpRunner::new()),
            ArtifactJanitor::new(&config.capture_dir),
            &config.tcpdump_binary,
        );
        let reconciler = Arc::new(Reconciler::new(
            config.node_name.clone(),
            config.annotation_key.clone(),
            SessionRegistry::new(),
            supervisor,
        ));

        let watcher_instance = Watcher::new(Arc::clone(&reconciler), pod_api, config.node_name.clone());
        let pod_watcher = tokio::spawn(async move { watcher_instance.watch_pods().await });

        Ok(Self {
            reconciler,
            pod_watcher,
        })
    }

    /// Runs the controller until the watcher exits or `shutdown` resolves.
    ///
    /// Running captures are left alone on shutdown.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), ControllerError>
    where
        F: Future<Output = ()>,
    {
        info!("Packet Capture Controller running");

        tokio::select! {
            result = &mut self.pod_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Pod watcher panicked: {}", e)))??;
            }
            () = shutdown => {
                info!("Shutting down...");
                self.pod_watcher.abort();
            }
        }

        let registry = self.reconciler.registry();
        if !registry.is_empty() {
            warn!("Exiting with {} capture session(s) still running", registry.len());
            for session in registry.summaries() {
                info!(
                    "  pod {} (uid {}): pid {}, N={}, started {}{}",
                    session.workload_name,
                    session.workload_uid,
                    session.pid,
                    session.packet_limit,
                    session.started_at.to_rfc3339(),
                    if session.exited { ", exited" } else { "" }
                );
            }
        }

        Ok(())
    }
}
