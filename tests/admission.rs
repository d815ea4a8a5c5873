//! End-to-end admission flow through the public router
//!
//! Uses an in-memory [`ClusterClient`] standing in for the OpenShift API so
//! the full AdmissionReview round trip can be exercised without a cluster.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use podimagespec_webhook::cluster::ClusterClient;
use podimagespec_webhook::mutator::PodImageMutator;
use podimagespec_webhook::webhook::{webhook_router, WebhookState};
use podimagespec_webhook::{Error, Result};

const TOOLS: &str = "image-registry.openshift-image-registry.svc:5000/openshift/tools:latest";
const CLI: &str = "image-registry.openshift-image-registry.svc:5000/openshift/cli:latest";
const WIDGET: &str = "image-registry.openshift-image-registry.svc:5000/myapp/widget:v1";
const NGINX: &str = "docker.io/library/nginx:latest";

/// In-memory registry config and ImageStreamTags
struct FakeCluster {
    management_state: &'static str,
    tags: HashMap<(String, String), String>,
    status_reads: AtomicUsize,
    tag_reads: AtomicUsize,
}

impl FakeCluster {
    fn new(management_state: &'static str) -> Self {
        Self {
            management_state,
            tags: HashMap::new(),
            status_reads: AtomicUsize::new(0),
            tag_reads: AtomicUsize::new(0),
        }
    }

    fn with_tag(mut self, namespace: &str, name: &str, source: &str) -> Self {
        self.tags
            .insert((namespace.to_string(), name.to_string()), source.to_string());
        self
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn registry_management_state(&self) -> Result<String> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.management_state.to_string())
    }

    async fn image_stream_tag_source(&self, namespace: &str, name: &str) -> Result<String> {
        self.tag_reads.fetch_add(1, Ordering::SeqCst);
        self.tags
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::ImageStreamTagNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

fn pod_review(containers: &[&str], init_containers: &[&str]) -> Value {
    let to_json = |prefix: &str, images: &[&str]| -> Vec<Value> {
        images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                json!({
                    "name": format!("{prefix}-{i}"),
                    "image": image,
                    "imagePullPolicy": "IfNotPresent",
                    "command": ["sleep", "3600"]
                })
            })
            .collect()
    };

    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "c0ffee00-0000-4000-8000-000000000001",
            "kind": {"group": "", "version": "v1", "kind": "Pod"},
            "resource": {"group": "", "version": "v1", "resource": "pods"},
            "name": "node-debug",
            "namespace": "openshift-debug",
            "operation": "CREATE",
            "userInfo": {"username": "system:serviceaccount:openshift-debug:default"},
            "object": {
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {
                    "name": "node-debug",
                    "namespace": "openshift-debug",
                    "labels": {"debug.openshift.io/managed-by": "oc-debug"}
                },
                "spec": {
                    "hostNetwork": true,
                    "containers": to_json("container", containers),
                    "initContainers": to_json("init", init_containers)
                }
            },
            "oldObject": null,
            "dryRun": false,
            "options": null
        }
    })
}

async fn admit(cluster: Arc<FakeCluster>, review: Value) -> Value {
    let state = Arc::new(WebhookState::new(PodImageMutator::new(cluster)));
    let request = Request::builder()
        .method("POST")
        .uri("/podimagespec-mutation")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&review).unwrap()))
        .unwrap();

    let response = webhook_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    body["response"].clone()
}

fn patch_of(response: &Value) -> Option<Value> {
    if response["patch"].is_null() {
        return None;
    }
    let bytes: Vec<u8> = serde_json::from_value(response["patch"].clone()).unwrap();
    Some(serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_tools_image_is_redirected_when_registry_removed() {
    let cluster = Arc::new(FakeCluster::new("Removed").with_tag(
        "openshift",
        "tools:latest",
        "quay.io/openshift/tools:latest",
    ));

    let response = admit(cluster.clone(), pod_review(&[TOOLS], &[])).await;

    assert_eq!(response["allowed"], true);
    assert_eq!(response["uid"], "c0ffee00-0000-4000-8000-000000000001");
    assert_eq!(
        patch_of(&response),
        Some(json!([
            {"op": "replace", "path": "/spec/containers/0/image", "value": "quay.io/openshift/tools:latest"}
        ]))
    );
    assert_eq!(cluster.status_reads.load(Ordering::SeqCst), 1);
    assert_eq!(cluster.tag_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_init_containers_are_redirected_too() {
    let cluster = Arc::new(
        FakeCluster::new("Unmanaged")
            .with_tag("openshift", "tools:latest", "quay.io/openshift/tools:latest")
            .with_tag("openshift", "cli:latest", "quay.io/openshift/origin-cli:latest"),
    );

    let response = admit(cluster, pod_review(&[NGINX, TOOLS], &[CLI])).await;

    assert_eq!(response["allowed"], true);
    assert_eq!(
        patch_of(&response),
        Some(json!([
            {"op": "replace", "path": "/spec/containers/1/image", "value": "quay.io/openshift/tools:latest"},
            {"op": "replace", "path": "/spec/initContainers/0/image", "value": "quay.io/openshift/origin-cli:latest"}
        ]))
    );
}

#[tokio::test]
async fn test_managed_registry_admits_without_patch() {
    let cluster = Arc::new(FakeCluster::new("Managed"));

    let response = admit(cluster.clone(), pod_review(&[TOOLS, CLI], &[TOOLS])).await;

    assert_eq!(response["allowed"], true);
    assert_eq!(patch_of(&response), None);
    assert_eq!(cluster.status_reads.load(Ordering::SeqCst), 1);
    assert_eq!(cluster.tag_reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_other_namespace_never_consults_cluster() {
    let cluster = Arc::new(FakeCluster::new("Removed"));

    let response = admit(cluster.clone(), pod_review(&[WIDGET], &[])).await;

    assert_eq!(response["allowed"], true);
    assert_eq!(patch_of(&response), None);
    assert_eq!(cluster.status_reads.load(Ordering::SeqCst), 0);
    assert_eq!(cluster.tag_reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_external_images_never_consult_cluster() {
    let cluster = Arc::new(FakeCluster::new("Removed"));

    let response = admit(cluster.clone(), pod_review(&[NGINX], &[])).await;

    assert_eq!(response["allowed"], true);
    assert_eq!(patch_of(&response), None);
    assert_eq!(cluster.status_reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_other_namespace_images_resolve_once_mutation_is_triggered() {
    let cluster = Arc::new(
        FakeCluster::new("Removed")
            .with_tag("openshift", "tools:latest", "quay.io/openshift/tools:latest")
            .with_tag("myapp", "widget:v1", "quay.io/myorg/widget:v1"),
    );

    let response = admit(cluster, pod_review(&[TOOLS, WIDGET], &[])).await;

    let patch = patch_of(&response).unwrap();
    assert_eq!(patch.as_array().unwrap().len(), 2);
    assert_eq!(patch[1]["value"], "quay.io/myorg/widget:v1");
}

#[tokio::test]
async fn test_missing_image_stream_tag_fails_the_request() {
    let cluster = Arc::new(FakeCluster::new("Removed").with_tag(
        "openshift",
        "tools:latest",
        "quay.io/openshift/tools:latest",
    ));

    let response = admit(cluster, pod_review(&[TOOLS], &[CLI])).await;

    assert_eq!(response["allowed"], false);
    assert_eq!(response["status"]["code"], 500);
    assert_eq!(patch_of(&response), None);
    assert!(response["status"]["message"]
        .as_str()
        .unwrap()
        .contains("cli:latest"));
}

#[tokio::test]
async fn test_mutated_pod_is_admitted_unchanged_on_readmission() {
    let cluster = Arc::new(FakeCluster::new("Removed"));

    let review = pod_review(&["quay.io/openshift/tools:latest"], &[]);
    let response = admit(cluster.clone(), review).await;

    assert_eq!(response["allowed"], true);
    assert_eq!(patch_of(&response), None);
    assert_eq!(cluster.status_reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_client() {
    let cluster = Arc::new(FakeCluster::new("Removed").with_tag(
        "openshift",
        "tools:latest",
        "quay.io/openshift/tools:latest",
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| tokio::spawn(admit(cluster.clone(), pod_review(&[TOOLS], &[]))))
        .collect();
    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response["allowed"], true);
        assert!(patch_of(&response).is_some());
    }

    assert_eq!(cluster.status_reads.load(Ordering::SeqCst), 8);
    assert_eq!(cluster.tag_reads.load(Ordering::SeqCst), 8);
}
