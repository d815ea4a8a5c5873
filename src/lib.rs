//! Pod image spec webhook - keeps OpenShift tooling images pullable when the
//! internal image registry is removed
//!
//! Pods referencing `image-registry.openshift-image-registry.svc:5000/openshift/*`
//! cannot start once the registry operator stops managing the registry. This
//! webhook intercepts pod creation and, only in that situation, rewrites those
//! images to the upstream references their ImageStreamTags point at.
//!
//! # Modules
//!
//! - [`image_ref`] - Internal registry image reference matching
//! - [`cluster`] - Read-only access to registry config and ImageStreamTags
//! - [`registry`] - Registry availability check
//! - [`resolver`] - ImageStreamTag source resolution
//! - [`mutator`] - Per-pod decision and mutation pipeline
//! - [`registration`] - Static webhook registration metadata
//! - [`webhook`] - AdmissionReview HTTP handlers
//! - [`server`] - HTTP(S) server
//! - [`telemetry`] - Logging setup
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod cluster;
pub mod error;
pub mod image_ref;
pub mod mutator;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod server;
pub mod telemetry;
pub mod webhook;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default address the webhook server listens on
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";
