//! Pod Image Spec Mutation Webhook
//!
//! Handles AdmissionReview requests for Pod creation, redirecting internal
//! registry images when the registry is not managed.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
};
use tracing::{debug, error, info, warn};

use crate::mutator::{build_image_patch, MutationDecision};
use crate::{Error, Result};

use super::WebhookState;

/// Handle mutating admission review for Pods
///
/// This handler:
/// 1. Extracts the admission request from the review
/// 2. Validates the requester and the object kind
/// 3. Decodes the Pod and runs the mutation pipeline
/// 4. Returns an allow, allow-with-patch, or error response
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    // Convert review to request
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = mutate_pod(&state, &req).await;
    Json(response.into_review())
}

/// Process a single pod admission request
async fn mutate_pod(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let uid = request.uid.clone();

    // Only named users creating Pods get this far
    if !is_valid_request(request) {
        warn!(uid = %uid, kind = %request.kind.kind, "Rejecting malformed admission request");
        return errored(
            request,
            &Error::invalid_request("request must come from a named user and carry a Pod"),
        );
    }

    if !matches!(request.operation, Operation::Create) {
        debug!(uid = %uid, operation = ?request.operation, "Not a create, allowing unchanged");
        return allowed(request, "Only pod creation is mutated");
    }

    // Get the pod object
    let pod = match render_pod(request) {
        Ok(pod) => pod,
        Err(e) => {
            error!(uid = %uid, error = %e, "Couldn't render a Pod from the incoming request");
            return errored(request, &e);
        }
    };

    // Decide and build the mutated copy
    let mutated = match state.mutator.process(&pod).await {
        Ok(MutationDecision::PassThrough(reason)) => {
            debug!(uid = %uid, pod = ?pod.metadata.name, reason, "Allowing pod unchanged");
            return allowed(request, reason);
        }
        Ok(MutationDecision::Mutate(mutated)) => mutated,
        Err(e) => {
            error!(uid = %uid, pod = ?pod.metadata.name, error = %e, "Unable to mutate pod");
            return errored(request, &e);
        }
    };

    // Diff image fields into patch operations
    let patch_ops = build_image_patch(&pod, &mutated);
    if patch_ops.is_empty() {
        return allowed(request, "No image changes required");
    }

    info!(
        uid = %uid,
        pod = ?pod.metadata.name,
        patch_ops = patch_ops.len(),
        "Applying image patch to pod"
    );

    match AdmissionResponse::from(request).with_patch(json_patch::Patch(patch_ops)) {
        Ok(response) => response,
        Err(e) => {
            error!(uid = %uid, error = %e, "Failed to serialize patch");
            errored(
                request,
                &Error::internal(format!("patch serialization error: {e}")),
            )
        }
    }
}

/// Requests must come from an authenticated user and target a Pod
fn is_valid_request(request: &AdmissionRequest<DynamicObject>) -> bool {
    let has_user = request
        .user_info
        .username
        .as_deref()
        .is_some_and(|name| !name.is_empty());
    has_user && request.kind.kind == "Pod"
}

/// Decode the Pod carried in the admission request
fn render_pod(request: &AdmissionRequest<DynamicObject>) -> Result<Pod> {
    let object = request
        .object
        .as_ref()
        .ok_or_else(|| Error::invalid_request("admission request has no object"))?;
    let value = serde_json::to_value(object)?;
    Ok(serde_json::from_value(value)?)
}

fn allowed(request: &AdmissionRequest<DynamicObject>, reason: &str) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request);
    response.result.code = StatusCode::OK.as_u16();
    response.result.message = reason.to_string();
    response
}

/// Error response; the API server falls back to the failure policy
fn errored(request: &AdmissionRequest<DynamicObject>, err: &Error) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request).deny(err.to_string());
    response.result.code = err.status_code().as_u16();
    response
}
