//! Pod image mutation
//!
//! Decides whether a pod needs its images redirected and, if so, produces a
//! mutated copy. The flow per request is:
//!
//! 1. Scan containers and init containers for internal registry images in
//!    the reserved `openshift` namespace. None found: pass through.
//! 2. Ask whether the registry is managed. Managed: pass through.
//! 3. Resolve every container image through its ImageStreamTag. Any failure
//!    aborts the whole request; a pod is never partially rewritten.

use std::sync::Arc;

use json_patch::{PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::{Container, Pod};
use tracing::{debug, info};

use crate::cluster::ClusterClient;
use crate::image_ref::match_internal_image;
use crate::registry::is_registry_available;
use crate::resolver::{lookup_image_stream_tag_spec, ResolveError};
use crate::Result;

/// Reason reported when no container references a reserved internal image
pub const REASON_NO_INTERNAL_IMAGES: &str = "Pod image spec is valid";

/// Reason reported when the registry is up and images can stay as they are
pub const REASON_REGISTRY_AVAILABLE: &str = "Image registry is available, no mutation required";

/// Outcome of processing a pod
#[derive(Clone, Debug, PartialEq)]
pub enum MutationDecision {
    /// Admit the pod unchanged
    PassThrough(&'static str),
    /// Admit the pod with its images replaced by this copy
    Mutate(Pod),
}

/// Rewrites pod images when the internal registry is unavailable
#[derive(Clone)]
pub struct PodImageMutator {
    client: Arc<dyn ClusterClient>,
}

impl PodImageMutator {
    /// Create a mutator that consults the cluster through `client`
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Decide what to do with an incoming pod
    pub async fn process(&self, pod: &Pod) -> Result<MutationDecision> {
        if !pod_references_reserved_registry_image(pod) {
            debug!(pod = ?pod.metadata.name, "No reserved internal registry images");
            return Ok(MutationDecision::PassThrough(REASON_NO_INTERNAL_IMAGES));
        }

        // Only now is the cluster consulted
        if is_registry_available(self.client.as_ref()).await? {
            debug!(pod = ?pod.metadata.name, "Image registry available");
            return Ok(MutationDecision::PassThrough(REASON_REGISTRY_AVAILABLE));
        }

        info!(
            pod = ?pod.metadata.name,
            namespace = ?pod.metadata.namespace,
            "Image registry unavailable, resolving internal images"
        );
        let mutated = self.mutate_pod(pod).await?;
        Ok(MutationDecision::Mutate(mutated))
    }

    async fn mutate_pod(&self, pod: &Pod) -> Result<Pod> {
        let mut mutated = pod.clone();
        let Some(spec) = mutated.spec.as_mut() else {
            return Ok(mutated);
        };

        // Containers first, then init containers
        let containers = spec
            .containers
            .iter_mut()
            .chain(spec.init_containers.iter_mut().flatten());

        for container in containers {
            let Some(image) = container.image.as_deref() else {
                continue;
            };
            // A single failed lookup discards the whole copy
            let resolved = lookup_image_stream_tag_spec(self.client.as_ref(), image)
                .await
                .map_err(ResolveError::into_inner)?;
            container.image = Some(resolved);
        }

        Ok(mutated)
    }
}

fn all_containers(pod: &Pod) -> impl Iterator<Item = &Container> {
    pod.spec.iter().flat_map(|spec| {
        spec.containers
            .iter()
            .chain(spec.init_containers.iter().flatten())
    })
}

/// Whether any container or init container uses an internal registry image
/// from the reserved namespace
///
/// Internal images from other namespaces do not count.
pub fn pod_references_reserved_registry_image(pod: &Pod) -> bool {
    all_containers(pod)
        .filter_map(|c| c.image.as_deref())
        .filter_map(match_internal_image)
        .any(|matched| matched.is_reserved_namespace())
}

/// Build JSON patch operations replacing every image that changed
///
/// Only `image` fields are touched; containers whose image is unchanged
/// get no operation.
pub fn build_image_patch(original: &Pod, mutated: &Pod) -> Vec<PatchOperation> {
    let (Some(before), Some(after)) = (original.spec.as_ref(), mutated.spec.as_ref()) else {
        return Vec::new();
    };

    let mut ops = image_replacements("containers", &before.containers, &after.containers);
    if let (Some(before), Some(after)) = (&before.init_containers, &after.init_containers) {
        ops.extend(image_replacements("initContainers", before, after));
    }
    ops
}

fn image_replacements(
    field: &str,
    before: &[Container],
    after: &[Container],
) -> Vec<PatchOperation> {
    before
        .iter()
        .zip(after)
        .enumerate()
        .filter(|(_, (b, a))| b.image != a.image)
        .filter_map(|(index, (_, a))| {
            let image = a.image.clone()?;
            Some(PatchOperation::Replace(ReplaceOperation {
                path: PointerBuf::from_tokens([
                    "spec".to_string(),
                    field.to_string(),
                    index.to_string(),
                    "image".to_string(),
                ]),
                value: serde_json::Value::String(image),
            }))
        })
        .collect()
}
