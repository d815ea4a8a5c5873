//! Internal registry image reference matching
//!
//! Only one shape of image reference is understood here: images served by the
//! cluster-local OpenShift registry service. Everything else is opaque and
//! passed through untouched by the rest of the webhook.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Host and port of the in-cluster OpenShift image registry service
pub const INTERNAL_REGISTRY_HOST: &str = "image-registry.openshift-image-registry.svc:5000";

/// Namespace holding the internally maintained tooling images
///
/// Only internal registry images under this namespace trigger mutation.
pub const RESERVED_NAMESPACE: &str = "openshift";

static INTERNAL_IMAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^image-registry\.openshift-image-registry\.svc:5000/(?P<namespace>\S+)/(?P<image>[A-Za-z0-9_]+):(?P<tag>\S+)",
    )
    .expect("internal registry pattern is valid")
});

/// An image reference that points at the internal registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalImageRef {
    /// Namespace the image stream lives in
    pub namespace: String,
    /// Image stream name
    pub image: String,
    /// Tag within the image stream
    pub tag: String,
}

impl InternalImageRef {
    /// Name of the backing ImageStreamTag (`image:tag`)
    pub fn image_stream_tag_name(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// Whether this image lives in the reserved tooling namespace
    pub fn is_reserved_namespace(&self) -> bool {
        self.namespace == RESERVED_NAMESPACE
    }
}

impl fmt::Display for InternalImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}:{}",
            INTERNAL_REGISTRY_HOST, self.namespace, self.image, self.tag
        )
    }
}

/// Match an image reference against the internal registry shape
///
/// Returns `None` for anything that is not
/// `image-registry.openshift-image-registry.svc:5000/<namespace>/<image>:<tag>`.
/// An empty tag is not a match.
pub fn match_internal_image(reference: &str) -> Option<InternalImageRef> {
    let caps = INTERNAL_IMAGE_REGEX.captures(reference)?;
    Some(InternalImageRef {
        namespace: caps["namespace"].to_string(),
        image: caps["image"].to_string(),
        tag: caps["tag"].to_string(),
    })
}
