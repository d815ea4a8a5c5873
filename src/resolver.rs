//! Resolve internal registry images to their upstream source

use tracing::{debug, warn};

use crate::cluster::ClusterClient;
use crate::image_ref::{match_internal_image, InternalImageRef};
use crate::Error;

/// A failed resolution, carrying the unmodified image reference
///
/// `fallback` is always safe to keep using as the container image.
#[derive(Debug, thiserror::Error)]
#[error("failed to resolve image {fallback}: {source}")]
pub struct ResolveError {
    /// The original image reference
    pub fallback: String,
    /// Why the lookup failed
    #[source]
    pub source: Error,
}

impl ResolveError {
    /// Unwrap into the underlying webhook error
    pub fn into_inner(self) -> Error {
        self.source
    }
}

/// Look up the source reference an internal tag currently points at
///
/// The value stored in the ImageStreamTag is returned as-is.
pub async fn resolve_image_source(
    client: &dyn ClusterClient,
    image: &InternalImageRef,
) -> Result<String, ResolveError> {
    let tag_name = image.image_stream_tag_name();
    match client
        .image_stream_tag_source(&image.namespace, &tag_name)
        .await
    {
        Ok(source) => {
            if source.is_empty() {
                warn!(
                    namespace = %image.namespace,
                    tag = %tag_name,
                    "ImageStreamTag has no source reference"
                );
            }
            debug!(image = %image, source = %source, "Resolved internal image");
            Ok(source)
        }
        Err(source) => Err(ResolveError {
            fallback: image.to_string(),
            source,
        }),
    }
}

/// Resolve a container image if it points at the internal registry
///
/// Images that do not match the internal registry shape come back unchanged
/// without touching the cluster.
pub async fn lookup_image_stream_tag_spec(
    client: &dyn ClusterClient,
    image: &str,
) -> Result<String, ResolveError> {
    let Some(matched) = match_internal_image(image) else {
        return Ok(image.to_string());
    };

    resolve_image_source(client, &matched)
        .await
        .map_err(|e| ResolveError {
            fallback: image.to_string(),
            source: e.source,
        })
}
