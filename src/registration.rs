//! Webhook registration metadata
//!
//! Everything the API server needs to route pod admission requests to this
//! webhook. The values are fixed; [`POD_IMAGE_SPEC_WEBHOOK`] is the only
//! registration this binary serves.

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    WebhookClientConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::ByteString;

/// Suffix making webhook names fully qualified
pub const WEBHOOK_DOMAIN: &str = "managed.openshift.io";

/// What the API server does when the webhook call fails
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Admit the object as if the webhook had allowed it
    Ignore,
    /// Reject the object
    Fail,
}

impl FailurePolicy {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Ignore => "Ignore",
            FailurePolicy::Fail => "Fail",
        }
    }
}

/// How rules match requests made through other API versions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Only the exact group/version/resource
    Exact,
    /// Equivalent resources served under other versions as well
    Equivalent,
}

impl MatchPolicy {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPolicy::Exact => "Exact",
            MatchPolicy::Equivalent => "Equivalent",
        }
    }
}

/// Side effect class declared to the API server
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideEffects {
    /// Calling the webhook changes nothing outside the admission response
    None,
    /// Side effects happen, but are skipped on dry runs
    NoneOnDryRun,
}

impl SideEffects {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            SideEffects::None => "None",
            SideEffects::NoneOnDryRun => "NoneOnDryRun",
        }
    }
}

/// Capabilities a hosting dispatcher reads to register a webhook
pub trait Webhook: Send + Sync {
    /// Short webhook name
    fn name(&self) -> &str;

    /// HTTP path the webhook is served under
    fn uri(&self) -> String {
        format!("/{}", self.name())
    }

    /// Human readable description
    fn doc(&self) -> &str;

    /// Admission rules this webhook subscribes to
    fn rules(&self) -> Vec<RuleWithOperations>;

    /// Failure policy
    fn failure_policy(&self) -> FailurePolicy;

    /// Match policy
    fn match_policy(&self) -> MatchPolicy;

    /// Declared side effects
    fn side_effects(&self) -> SideEffects;

    /// Seconds the API server waits for a response
    fn timeout_seconds(&self) -> i32;

    /// Restricts which objects are sent, `None` for all
    fn object_selector(&self) -> Option<LabelSelector>;

    /// Compatible with classic (self-managed control plane) clusters
    fn classic_enabled(&self) -> bool;

    /// Compatible with hosted control plane clusters
    fn hypershift_enabled(&self) -> bool;
}

/// Fixed registration record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookRegistration {
    /// Short webhook name, also used for the URI
    pub name: &'static str,
    /// Description
    pub doc: &'static str,
    /// Admission operations intercepted
    pub operations: &'static [&'static str],
    /// API groups of the intercepted resources
    pub api_groups: &'static [&'static str],
    /// API versions of the intercepted resources
    pub api_versions: &'static [&'static str],
    /// Intercepted resources
    pub resources: &'static [&'static str],
    /// Resource scope
    pub scope: &'static str,
    /// Failure policy
    pub failure_policy: FailurePolicy,
    /// Match policy
    pub match_policy: MatchPolicy,
    /// Side effects
    pub side_effects: SideEffects,
    /// Timeout in seconds
    pub timeout_seconds: i32,
    /// Classic cluster compatibility
    pub classic_enabled: bool,
    /// Hosted control plane compatibility
    pub hypershift_enabled: bool,
}

/// Registration of the pod image spec mutation webhook
pub const POD_IMAGE_SPEC_WEBHOOK: WebhookRegistration = WebhookRegistration {
    name: "podimagespec-mutation",
    doc: "OpenShift debugging tools on Managed OpenShift clusters must be available \
          even if internal image registry is removed.",
    operations: &["CREATE"],
    api_groups: &[""],
    api_versions: &["v1"],
    resources: &["pods"],
    scope: "Namespaced",
    failure_policy: FailurePolicy::Ignore,
    match_policy: MatchPolicy::Equivalent,
    side_effects: SideEffects::None,
    timeout_seconds: 2,
    classic_enabled: false,
    hypershift_enabled: true,
};

fn strings(values: &[&str]) -> Option<Vec<String>> {
    Some(values.iter().map(|v| v.to_string()).collect())
}

impl Webhook for WebhookRegistration {
    fn name(&self) -> &str {
        self.name
    }

    fn doc(&self) -> &str {
        self.doc
    }

    fn rules(&self) -> Vec<RuleWithOperations> {
        vec![RuleWithOperations {
            operations: strings(self.operations),
            api_groups: strings(self.api_groups),
            api_versions: strings(self.api_versions),
            resources: strings(self.resources),
            scope: Some(self.scope.to_string()),
        }]
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    fn match_policy(&self) -> MatchPolicy {
        self.match_policy
    }

    fn side_effects(&self) -> SideEffects {
        self.side_effects
    }

    fn timeout_seconds(&self) -> i32 {
        self.timeout_seconds
    }

    fn object_selector(&self) -> Option<LabelSelector> {
        None
    }

    fn classic_enabled(&self) -> bool {
        self.classic_enabled
    }

    fn hypershift_enabled(&self) -> bool {
        self.hypershift_enabled
    }
}

/// In-cluster Service fronting the webhook server
#[derive(Clone, Debug)]
pub struct ServiceTarget {
    /// Service name
    pub name: String,
    /// Service namespace
    pub namespace: String,
    /// Service port
    pub port: i32,
}

/// Render a MutatingWebhookConfiguration for `webhook`
///
/// `ca_bundle` is the PEM CA that signed the serving certificate; leave it
/// out when something else (e.g. the service CA operator) injects it.
pub fn mutating_webhook_configuration(
    webhook: &dyn Webhook,
    service: &ServiceTarget,
    ca_bundle: Option<Vec<u8>>,
) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(webhook.name().to_string()),
            ..Default::default()
        },
        webhooks: Some(vec![MutatingWebhook {
            name: format!("{}.{}", webhook.name(), WEBHOOK_DOMAIN),
            admission_review_versions: vec!["v1".to_string()],
            side_effects: webhook.side_effects().as_str().to_string(),
            failure_policy: Some(webhook.failure_policy().as_str().to_string()),
            match_policy: Some(webhook.match_policy().as_str().to_string()),
            timeout_seconds: Some(webhook.timeout_seconds()),
            rules: Some(webhook.rules()),
            object_selector: webhook.object_selector(),
            client_config: WebhookClientConfig {
                service: Some(ServiceReference {
                    name: service.name.clone(),
                    namespace: service.namespace.clone(),
                    path: Some(webhook.uri()),
                    port: Some(service.port),
                }),
                ca_bundle: ca_bundle.map(ByteString),
                ..Default::default()
            },
            ..Default::default()
        }]),
    }
}
