//! Mutating admission webhook for pod image specs
//!
//! Intercepts pod creation and, when the internal image registry has been
//! removed, rewrites `image-registry.openshift-image-registry.svc:5000/openshift/*`
//! images to the upstream references their ImageStreamTags point at.
//!
//! The HTTP layer here only unwraps the AdmissionReview envelope and turns the
//! [`PodImageMutator`] decision back into an admission response.

pub mod pod;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::mutator::PodImageMutator;
use crate::registration::{Webhook, POD_IMAGE_SPEC_WEBHOOK};

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// Decision pipeline, holding the shared cluster client
    pub mutator: PodImageMutator,
}

impl WebhookState {
    /// Create a new webhook state around the given mutator
    pub fn new(mutator: PodImageMutator) -> Self {
        Self { mutator }
    }
}

/// Create the webhook router
///
/// - POST /podimagespec-mutation - Mutate pod image specs
/// - GET /healthz - Health check
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(&POD_IMAGE_SPEC_WEBHOOK.uri(), post(pod::mutate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}
