//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test Pods, snapshots, and a
//! reconciler wired to `MockCaptureRunner`.

use crate::config::DEFAULT_ANNOTATION_KEY;
use crate::events::WorkloadSnapshot;
use crate::reconciler::Reconciler;
use crate::registry::SessionRegistry;
use crate::supervisor::ProcessSupervisor;
use capture_runtime::{ArtifactJanitor, MockCaptureRunner};
use k8s_openapi::api::core::v1::{Pod, PodSpec, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Node the test reconciler owns
pub const TEST_NODE: &str = "worker-1";

/// Helper to create a test Pod in the `default` namespace
pub fn create_test_pod(
    uid: &str,
    name: &str,
    node_name: &str,
    pod_ip: Option<&str>,
    resource_version: &str,
    annotations: &[(&str, &str)],
) -> Pod {
    let annotations: BTreeMap<String, String> = annotations
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();

    Pod {
        metadata: ObjectMeta {
            uid: Some(uid.to_string()),
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            resource_version: Some(resource_version.to_string()),
            annotations: (!annotations.is_empty()).then_some(annotations),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node_name.to_string()),
            ..Default::default()
        }),
        status: Some(PodStatus {
            pod_ip: pod_ip.map(str::to_string),
            ..Default::default()
        }),
    }
}

/// Helper to create a snapshot of a Pod on `TEST_NODE`.
///
/// `capture` is the value of the capture annotation, `None` for no annotation.
pub fn create_test_snapshot(
    uid: &str,
    name: &str,
    pod_ip: Option<&str>,
    capture: Option<&str>,
) -> WorkloadSnapshot {
    let mut annotations = BTreeMap::new();
    annotations.insert("app".to_string(), name.to_string());
    if let Some(value) = capture {
        annotations.insert(DEFAULT_ANNOTATION_KEY.to_string(), value.to_string());
    }

    WorkloadSnapshot {
        uid: uid.to_string(),
        name: name.to_string(),
        namespace: Some("default".to_string()),
        node_name: Some(TEST_NODE.to_string()),
        pod_ip: pod_ip.map(str::to_string),
        resource_version: Some("1".to_string()),
        annotations,
    }
}

/// Helper to create a reconciler for `TEST_NODE` writing captures to `capture_dir`
pub fn create_test_reconciler(capture_dir: &Path) -> (Reconciler, MockCaptureRunner) {
    let runner = MockCaptureRunner::new();
    let supervisor = ProcessSupervisor::new(
        Arc::new(runner.clone()),
        ArtifactJanitor::new(capture_dir),
        "tcpdump",
    );
    let reconciler = Reconciler::new(TEST_NODE, DEFAULT_ANNOTATION_KEY, SessionRegistry::new(), supervisor);
    (reconciler, runner)
}

/// Helper to create capture files in `dir`
pub fn create_artifacts(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), b"pcap").unwrap();
    }
}

/// Sorted file names in `dir`
pub fn list_artifacts(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
