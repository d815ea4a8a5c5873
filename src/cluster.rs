//! Read-only access to the OpenShift resources the webhook consults
//!
//! The webhook needs exactly two lookups: the image registry operator config
//! (to learn whether the registry is managed) and ImageStreamTags (to learn
//! where an internal tag really points). Both go through [`ClusterClient`] so
//! the decision logic can be tested without a cluster.

use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject};
use kube::Client;
use tokio::sync::OnceCell;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::{Error, Result};

/// Name of the singleton image registry operator config
pub const REGISTRY_CONFIG_NAME: &str = "cluster";

/// `configs.imageregistry.operator.openshift.io/v1`
pub fn registry_config_resource() -> ApiResource {
    ApiResource {
        group: "imageregistry.operator.openshift.io".to_string(),
        version: "v1".to_string(),
        api_version: "imageregistry.operator.openshift.io/v1".to_string(),
        kind: "Config".to_string(),
        plural: "configs".to_string(),
    }
}

/// `imagestreamtags.image.openshift.io/v1`
pub fn image_stream_tag_resource() -> ApiResource {
    ApiResource {
        group: "image.openshift.io".to_string(),
        version: "v1".to_string(),
        api_version: "image.openshift.io/v1".to_string(),
        kind: "ImageStreamTag".to_string(),
        plural: "imagestreamtags".to_string(),
    }
}

/// Trait abstracting the cluster reads made by the webhook
///
/// Implementations must be safe to share across concurrently served
/// admission requests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Get `spec.managementState` of the image registry operator config
    ///
    /// Returns an empty string when the field is not set.
    async fn registry_management_state(&self) -> Result<String>;

    /// Get `tag.from.name` of an ImageStreamTag
    ///
    /// # Arguments
    ///
    /// * `namespace` - Namespace of the image stream
    /// * `name` - Tag name in `image:tag` form
    async fn image_stream_tag_source(&self, namespace: &str, name: &str) -> Result<String>;
}

/// Real Kubernetes client implementation, constructed on first use
///
/// The underlying [`Client`] is created once and reused for every request.
/// Concurrent first calls wait on the same initialization.
#[derive(Default)]
pub struct LazyKubeClient {
    client: OnceCell<Client>,
}

impl LazyKubeClient {
    /// Create a client that connects using the ambient kubeconfig or
    /// in-cluster service account the first time it is needed
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already constructed kube Client
    pub fn with_client(client: Client) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client
            .get_or_try_init(|| async {
                info!("Creating Kubernetes client");
                Client::try_default()
                    .await
                    .map_err(|e| Error::ClientInit(e.to_string()))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl ClusterClient for LazyKubeClient {
    async fn registry_management_state(&self) -> Result<String> {
        let api: Api<DynamicObject> =
            Api::all_with(self.client().await?, &registry_config_resource());
        let config = api.get(REGISTRY_CONFIG_NAME).await?;

        let state = json_str(&config.data, &["spec", "managementState"]);
        debug!(management_state = %state, "Read image registry config");
        Ok(state)
    }

    async fn image_stream_tag_source(&self, namespace: &str, name: &str) -> Result<String> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client().await?, namespace, &image_stream_tag_resource());

        let tag = match api.get(name).await {
            Ok(tag) => tag,
            Err(kube::Error::Api(e)) if e.code == 404 => {
                return Err(Error::ImageStreamTagNotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(json_str(&tag.data, &["tag", "from", "name"]))
    }
}

/// Walk `path` through nested JSON objects, returning "" if anything is missing
fn json_str(value: &serde_json::Value, path: &[&str]) -> String {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
