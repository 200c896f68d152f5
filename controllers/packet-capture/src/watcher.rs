//! Kubernetes Pod watcher.
//!
//! Watches Pods scheduled to this node and feeds every change through the
//! `EventTranslator` into the reconciler. The watch reconnects with
//! kube-runtime's default backoff; stream errors are logged and the watch
//! carries on.

use crate::error::ControllerError;
use crate::events::{EventTranslator, WorkloadEvent};
use crate::reconciler::{Action, Reconciler};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube_runtime::{WatchStreamExt, watcher};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Watches Pods on one node.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    pod_api: Api<Pod>,
    node_name: String,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, pod_api: Api<Pod>, node_name: impl Into<String>) -> Self {
        Self {
            reconciler,
            pod_api,
            node_name: node_name.into(),
        }
    }

    /// Starts watching Pods. Only returns if the watch stream ends.
    pub async fn watch_pods(&self) -> Result<(), ControllerError> {
        info!("Starting Pod watcher for node {}", self.node_name);

        let config = watcher::Config::default().fields(&format!("spec.nodeName={}", self.node_name));
        let mut stream = Box::pin(watcher(self.pod_api.clone(), config).default_backoff());
        let mut translator = EventTranslator::new();

        while let Some(result) = stream.next().await {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!("Pod watch error (will retry): {}", e);
                    continue;
                }
            };

            let init_done = matches!(event, watcher::Event::InitDone);
            match &event {
                watcher::Event::Init => debug!("Pod watcher (re)listing"),
                watcher::Event::Apply(pod) | watcher::Event::InitApply(pod) => {
                    debug!("Pod applied: {}", pod.metadata.name.as_deref().unwrap_or("<unknown>"));
                }
                watcher::Event::Delete(pod) => {
                    debug!("Pod deleted: {}", pod.metadata.name.as_deref().unwrap_or("<unknown>"));
                }
                watcher::Event::InitDone => {}
            }

            for workload_event in translator.translate(event) {
                // Blocks this task while the decision holds the registry lock (spawn, file removal)
                let action = self.reconciler.dispatch(&workload_event);
                log_action(&workload_event, action);
            }

            if init_done {
                info!(
                    "Pod watcher initialization complete: {} pod(s) on node, {} capture(s) active",
                    translator.known_count(),
                    self.reconciler.registry().len()
                );
            }
        }

        Err(ControllerError::Watch("Pod watch stream ended".to_string()))
    }
}

fn log_action(event: &WorkloadEvent, action: Action) {
    let pod = match event {
        WorkloadEvent::Added(s) | WorkloadEvent::Deleted(s) | WorkloadEvent::Updated { new: s, .. } => {
            s.qualified_name()
        }
    };

    match action {
        Action::Ignored | Action::NoOp => debug!("Pod {}: nothing to do", pod),
        Action::Started(limit) => debug!("Pod {}: capture started (N={})", pod, limit),
        Action::Restarted(limit) => debug!("Pod {}: capture restarted (N={})", pod, limit),
        Action::Stopped => debug!("Pod {}: capture stopped", pod),
        Action::StartFailed { stopped: true } => {
            warn!("Pod {}: previous capture stopped but the new one did not start", pod);
        }
        Action::StartFailed { stopped: false } => debug!("Pod {}: capture not started", pod),
    }
}
